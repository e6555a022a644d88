//! Single shared browser session with bounded concurrent page acquisition.
//!
//! The renderer is the scarce, failure-prone resource: one session (local
//! launch or a remote CDP WebSocket) is held for the lifetime of the pool,
//! and callers acquire/release pages against it. Pages are never recycled
//! across acquisitions — each acquire gets a fresh page, each release closes
//! it — so a faulty page can never leak state into the next job.

use anyhow::Context;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::BrowserPoolError;

/// Which request-blocking profile a page should be configured with.
///
/// Detail-extraction pages block images/stylesheets/fonts/media outright;
/// the email harvester's render-driven crawler needs stylesheets to keep
/// layout-dependent content visible, so it admits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVariant {
    Detail,
    EmailHarvest,
}

impl PageVariant {
    fn blocked_resource_types(self) -> &'static [ResourceType] {
        match self {
            PageVariant::Detail => &[
                ResourceType::Image,
                ResourceType::Stylesheet,
                ResourceType::Font,
                ResourceType::Media,
            ],
            PageVariant::EmailHarvest => {
                &[ResourceType::Image, ResourceType::Font, ResourceType::Media]
            }
        }
    }
}

/// Session lifecycle, mirrors §4.8: `disconnected -> connecting -> connected
/// -> degraded -> connected | disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Degraded = 3,
}

impl From<u8> for SessionState {
    fn from(v: u8) -> Self {
        match v {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Degraded,
            _ => SessionState::Disconnected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    pub headless: bool,
    pub browser_ws_endpoint: Option<String>,
    pub default_navigation_timeout: Duration,
    pub max_concurrent_pages: usize,
    pub reconnect_attempts: usize,
    pub reconnect_backoff: Duration,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            headless: true,
            browser_ws_endpoint: None,
            default_navigation_timeout: Duration::from_secs(10),
            max_concurrent_pages: 5,
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_secs(2),
        }
    }
}

struct Session {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    local_profile_dir: Option<PathBuf>,
}

/// Holds the single shared session plus the capacity semaphore standing in
/// for the "bounded free-list of pages".
pub struct BrowserPool {
    config: BrowserPoolConfig,
    session: Mutex<Option<Session>>,
    capacity: Semaphore,
    state: AtomicU8,
}

impl BrowserPool {
    #[must_use]
    pub fn new(config: BrowserPoolConfig) -> Arc<Self> {
        let capacity = Semaphore::new(config.max_concurrent_pages);
        Arc::new(Self {
            config,
            session: Mutex::new(None),
            capacity,
            state: AtomicU8::new(SessionState::Disconnected as u8),
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Acquire a fresh page configured with `variant`'s interception policy.
    ///
    /// On a connection-class CDP error, reconstructs the underlying session
    /// up to `reconnect_attempts` times with a fixed backoff before failing.
    pub async fn acquire_page(
        self: &Arc<Self>,
        variant: PageVariant,
    ) -> Result<PooledPageGuard, BrowserPoolError> {
        let permit = self
            .capacity
            .acquire()
            .await
            .map_err(|_| BrowserPoolError::ShuttingDown)?;

        let mut last_err = None;
        for attempt in 0..=self.config.reconnect_attempts {
            match self.try_new_page(variant).await {
                Ok(page) => {
                    self.set_state(SessionState::Connected);
                    return Ok(PooledPageGuard {
                        page: Some(page),
                        _permit: permit,
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "page acquisition failed, will retry session");
                    self.set_state(SessionState::Degraded);
                    self.teardown_session().await;
                    last_err = Some(e);
                    if attempt < self.config.reconnect_attempts {
                        tokio::time::sleep(self.config.reconnect_backoff).await;
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        Err(BrowserPoolError::Unavailable {
            attempts: self.config.reconnect_attempts as u32,
            source: last_err.unwrap_or_else(|| anyhow::anyhow!("unknown browser pool failure")),
        })
    }

    async fn try_new_page(&self, variant: PageVariant) -> anyhow::Result<Page> {
        let browser = self.ensure_session().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open new page on shared session")?;

        page.execute(
            chromiumoxide::cdp::browser_protocol::page::SetLifecycleEventsEnabledParams::new(true),
        )
        .await
        .ok();

        configure_request_interception(&page, variant).await?;
        Ok(page)
    }

    async fn ensure_session(&self) -> anyhow::Result<Arc<Browser>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.browser.version().await.is_ok() {
                return Ok(Arc::clone(&session.browser));
            }
            debug!("existing session failed health check, relaunching");
        }

        self.set_state(SessionState::Connecting);
        let session = self.launch_session().await?;
        let browser = Arc::clone(&session.browser);
        *guard = Some(session);
        Ok(browser)
    }

    async fn launch_session(&self) -> anyhow::Result<Session> {
        if let Some(endpoint) = self.config.browser_ws_endpoint.as_deref() {
            let (browser, handler) = crate::browser_setup::connect_browser(endpoint).await?;
            return Ok(Session {
                browser: Arc::new(browser),
                handler,
                local_profile_dir: None,
            });
        }

        let profile = crate::browser_profile::create_unique_profile_with_prefix("mapleads_pool")
            .context("failed to create unique pool browser profile")?;
        let user_data_dir = profile.into_path();
        let (browser, handler, dir) =
            crate::browser_setup::launch_browser(self.config.headless, Some(user_data_dir))
                .await
                .context("failed to launch local browser for pool")?;

        Ok(Session {
            browser: Arc::new(browser),
            handler,
            local_profile_dir: Some(dir),
        })
    }

    async fn teardown_session(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            session.handler.abort();
            if let Some(dir) = session.local_profile_dir {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!("failed to clean up pool profile dir {}: {}", dir.display(), e);
                }
            }
        }
    }

    /// Idempotent shutdown. Safe to call more than once.
    pub async fn shutdown(&self) {
        info!("shutting down browser pool");
        self.set_state(SessionState::Disconnected);
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            if let Some(browser) = Arc::get_mut(&mut session.browser) {
                if let Err(e) = browser.close().await {
                    warn!("failed to close browser cleanly: {}", e);
                }
                let _ = browser.wait().await;
            } else {
                warn!("browser has outstanding page references at shutdown, aborting handler only");
            }
            session.handler.abort();
            if let Some(dir) = session.local_profile_dir {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!("failed to clean up pool profile dir {}: {}", dir.display(), e);
                }
            }
        }
    }
}

/// Set up the Fetch-domain request interception policy for a page: blocked
/// resource types fail immediately, everything else continues unmodified.
async fn configure_request_interception(page: &Page, variant: PageVariant) -> anyhow::Result<()> {
    page.execute(EnableParams {
        patterns: Some(vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: None,
        }]),
        handle_auth_requests: None,
    })
    .await
    .context("failed to enable Fetch domain interception")?;

    let blocked = variant.blocked_resource_types();
    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("failed to subscribe to RequestPaused events")?;
    let client = page.clone();

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let should_block = event
                .resource_type
                .clone()
                .map(|rt| blocked.contains(&rt))
                .unwrap_or(false);

            let result = if should_block {
                client
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
            } else {
                client
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
            };

            if let Err(e) = result {
                debug!("request interception response failed (page likely closed): {}", e);
                break;
            }
        }
    });

    Ok(())
}

/// RAII guard returned by [`BrowserPool::acquire_page`]. Always closes the
/// page on drop — pages are never recycled between acquisitions.
pub struct PooledPageGuard<'a> {
    page: Option<Page>,
    _permit: SemaphorePermit<'a>,
}

impl PooledPageGuard<'_> {
    #[must_use]
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page present for guard lifetime")
    }

    /// Mark the page as known-faulty; it is closed identically to the
    /// non-faulty path, but callers use this to signal their own retry loop
    /// that the page (not just the URL) needs to be recreated.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("error closing page on release: {}", e);
            }
        }
    }
}

impl Drop for PooledPageGuard<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            tokio::spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("error closing page on drop: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_variant_blocks_stylesheets_email_variant_does_not() {
        assert!(PageVariant::Detail
            .blocked_resource_types()
            .contains(&ResourceType::Stylesheet));
        assert!(!PageVariant::EmailHarvest
            .blocked_resource_types()
            .contains(&ResourceType::Stylesheet));
    }

    #[test]
    fn session_state_roundtrips_through_u8() {
        assert_eq!(SessionState::from(SessionState::Degraded as u8), SessionState::Degraded);
        assert_eq!(SessionState::from(99), SessionState::Disconnected);
    }
}
