//! Render-driven email crawler: drives a dedicated headless page through a
//! business's site, for sites whose contact details only materialize after
//! JS executes.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::links::discover_in_domain_links;
use super::priority::rank_links;
use super::sanitize::sanitize_and_order;
use super::{extract, HarvestResult};
use crate::browser_pool::{BrowserPool, PageVariant};
use crate::errors::is_connection_class_error;

const DEFAULT_BUDGET: Duration = Duration::from_secs(60);
const DEFAULT_PER_PAGE_TIMEOUT: Duration = Duration::from_secs(35);
const POST_NAV_SETTLE: Duration = Duration::from_secs(1);
const PRIORITY_PAGE_LIMIT: usize = 5;
const POOL_READY_WAIT: Duration = Duration::from_secs(15);

/// Render-driven harvest for a single homepage, acquiring its own dedicated
/// page from `pool`. Retries the whole site once when the first attempt
/// collected zero emails and hit a browser-closure error, whether that error
/// aborted the whole attempt or just one priority page within it.
pub async fn harvest_site(pool: &Arc<BrowserPool>, homepage: &str) -> HarvestResult {
    match harvest_site_once(pool, homepage).await {
        Ok(result) if needs_closure_retry(&result) => {
            warn!(homepage, "zero emails after browser-closure error, retrying whole site once");
            tokio::time::sleep(POOL_READY_WAIT).await;
            harvest_site_once(pool, homepage)
                .await
                .unwrap_or_else(|e| HarvestResult::failed(vec![e.to_string()]))
        }
        Ok(result) => result,
        Err(e) if is_connection_class_error(&e.to_string()) => {
            warn!(homepage, "browser-closure error, retrying whole site once: {}", e);
            tokio::time::sleep(POOL_READY_WAIT).await;
            harvest_site_once(pool, homepage)
                .await
                .unwrap_or_else(|e| HarvestResult::failed(vec![e.to_string()]))
        }
        Err(e) => HarvestResult::failed(vec![e.to_string()]),
    }
}

/// Whether a completed (non-`Err`) attempt still warrants the whole-site
/// retry: it collected no emails at all and at least one of its per-page
/// errors looks like a browser-closure rather than a content-shape miss.
fn needs_closure_retry(result: &HarvestResult) -> bool {
    result.emails.is_empty() && result.errors.iter().any(|e| is_connection_class_error(e))
}

async fn harvest_site_once(pool: &Arc<BrowserPool>, homepage: &str) -> anyhow::Result<HarvestResult> {
    let base_url = Url::parse(homepage)?;
    let guard = pool.acquire_page(PageVariant::EmailHarvest).await?;
    let page = guard.page();

    let start = Instant::now();
    let mut visited = Vec::new();
    let mut raw_candidates = Vec::new();
    let mut errors = Vec::new();

    let homepage_html = visit_page(page, homepage, DEFAULT_PER_PAGE_TIMEOUT).await?;
    visited.push(homepage.to_string());
    raw_candidates.extend(extract::extract_candidates(&homepage_html));

    if raw_candidates.is_empty() {
        let links = discover_in_domain_links(&homepage_html, &base_url);
        let ranked = rank_links(links);

        for url in ranked.into_iter().take(PRIORITY_PAGE_LIMIT) {
            if start.elapsed() >= DEFAULT_BUDGET {
                debug!(homepage, "email harvest budget exceeded, stopping early");
                break;
            }
            match visit_page(page, &url, DEFAULT_PER_PAGE_TIMEOUT).await {
                Ok(html) => {
                    visited.push(url);
                    raw_candidates.extend(extract::extract_candidates(&html));
                }
                Err(e) => {
                    errors.push(format!("{url}: {e}"));
                }
            }
        }
    } else {
        debug!(homepage, "homepage yielded emails, skipping priority-page fetch");
    }

    let site_domain = base_url.host_str().unwrap_or_default();
    let emails = sanitize_and_order(&raw_candidates, site_domain);

    Ok(HarvestResult {
        emails,
        pages_visited: visited.len(),
        visited,
        errors,
    })
}

async fn visit_page(
    page: &chromiumoxide::Page,
    url: &str,
    timeout: Duration,
) -> anyhow::Result<String> {
    let navigate = async {
        page.goto(url).await.map_err(|e| anyhow::anyhow!("navigation failed: {e}"))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow::anyhow!("wait_for_navigation failed: {e}"))
    };

    tokio::time::timeout(timeout, navigate)
        .await
        .map_err(|_| anyhow::anyhow!("navigation timeout"))??;

    tokio::time::sleep(POST_NAV_SETTLE).await;

    page.content()
        .await
        .map_err(|e| anyhow::anyhow!("failed to read page content: {e}"))
}
