//! Auto-Scroller: advances a rendered search feed until it stops growing.
//!
//! Mirrors the teacher's `with_page_timeout` wrapping discipline but never
//! propagates an error up — every failure path collapses into a `ScrollOutcome`
//! so callers can proceed with whatever listings are already visible.

use chromiumoxide::Page;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SCROLL_DELTA_PX: i64 = 1200;
const SCROLL_CADENCE: Duration = Duration::from_millis(700);
const MAX_ATTEMPTS: u32 = 40;
const STAGNATION_LIMIT: u32 = 3;
const WALL_CLOCK_TIMEOUT: Duration = Duration::from_secs(30);

const SCROLL_FEED_SCRIPT: &str = r#"
((delta) => {
    const feed = document.querySelector('div[role="feed"]');
    if (!feed) return { found: false, height: 0 };
    feed.scrollBy(0, delta);
    return { found: true, height: feed.scrollHeight };
})"#;

#[derive(Debug, Deserialize)]
struct ScrollProbe {
    found: bool,
    height: i64,
}

/// Why the scroller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ContentLoaded,
    MaxAttempts,
    Timeout,
    WrapperNotFound,
    Error,
}

#[derive(Debug, Clone)]
pub struct ScrollOutcome {
    pub success: bool,
    pub reason: StopReason,
    pub scroll_attempts: Option<u32>,
}

/// Repeatedly scroll the page's result feed until growth stalls for
/// `STAGNATION_LIMIT` consecutive probes, `MAX_ATTEMPTS` is reached, or
/// `WALL_CLOCK_TIMEOUT` elapses. Never returns `Err` — every failure path is
/// folded into a non-success `ScrollOutcome`.
pub async fn scroll_results_feed(page: &Page) -> ScrollOutcome {
    let start = Instant::now();
    let mut last_height = -1i64;
    let mut stagnant_probes = 0u32;
    let mut attempts = 0u32;

    loop {
        if start.elapsed() >= WALL_CLOCK_TIMEOUT {
            return ScrollOutcome {
                success: false,
                reason: StopReason::Timeout,
                scroll_attempts: Some(attempts),
            };
        }
        if attempts >= MAX_ATTEMPTS {
            return ScrollOutcome {
                success: true,
                reason: StopReason::MaxAttempts,
                scroll_attempts: Some(attempts),
            };
        }

        let probe = match probe_once(page).await {
            Ok(p) => p,
            Err(e) => {
                warn!("scroll probe failed: {}", e);
                return ScrollOutcome {
                    success: false,
                    reason: StopReason::Error,
                    scroll_attempts: Some(attempts),
                };
            }
        };

        attempts += 1;

        if !probe.found {
            return ScrollOutcome {
                success: false,
                reason: StopReason::WrapperNotFound,
                scroll_attempts: Some(attempts),
            };
        }

        if probe.height <= last_height {
            stagnant_probes += 1;
            if stagnant_probes >= STAGNATION_LIMIT {
                return ScrollOutcome {
                    success: true,
                    reason: StopReason::ContentLoaded,
                    scroll_attempts: Some(attempts),
                };
            }
        } else {
            stagnant_probes = 0;
        }
        last_height = probe.height;

        tokio::time::sleep(SCROLL_CADENCE).await;
    }
}

async fn probe_once(page: &Page) -> anyhow::Result<ScrollProbe> {
    let script = format!("({SCROLL_FEED_SCRIPT})({SCROLL_DELTA_PX})");
    let result = tokio::time::timeout(Duration::from_secs(5), page.evaluate(script.as_str()))
        .await
        .map_err(|_| anyhow::anyhow!("scroll probe timed out"))??;

    let value: ScrollProbe = result
        .into_value()
        .map_err(|e| anyhow::anyhow!("failed to parse scroll probe result: {e}"))?;
    debug!(height = value.height, found = value.found, "scroll probe");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_is_copy_and_comparable() {
        assert_eq!(StopReason::ContentLoaded, StopReason::ContentLoaded);
        assert_ne!(StopReason::ContentLoaded, StopReason::Timeout);
    }

    #[test]
    fn scroll_outcome_carries_attempt_count() {
        let outcome = ScrollOutcome {
            success: true,
            reason: StopReason::MaxAttempts,
            scroll_attempts: Some(MAX_ATTEMPTS),
        };
        assert_eq!(outcome.scroll_attempts, Some(MAX_ATTEMPTS));
    }
}
