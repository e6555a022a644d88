//! Fetch-driven email crawler: delegates rendering to a plain HTTP GET
//! (no headless browser) via `reqwest` + `scraper`, for sites that don't
//! need JS execution to expose their contact details.

use futures::future::join_all;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use super::links::discover_in_domain_links;
use super::priority::rank_links;
use super::sanitize::sanitize_and_order;
use super::{extract, HarvestResult};
use crate::errors::EmailHarvestError;

const PRIORITY_PAGE_LIMIT: usize = 5;
const MAX_CONCURRENT_FETCHES: usize = 3;
const RETRY_BACKOFFS_MS: [u64; 3] = [2_000, 4_000, 8_000];

#[must_use]
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .user_agent(crate::utils::constants::CHROME_USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Fetch-driven email harvest for a single homepage URL.
pub async fn harvest_site(client: &reqwest::Client, homepage: &str) -> HarvestResult {
    let base_url = match Url::parse(homepage) {
        Ok(u) => u,
        Err(e) => {
            return HarvestResult::failed(vec![format!("invalid homepage url: {e}")]);
        }
    };

    let homepage_html = match fetch_with_retry(client, homepage).await {
        Ok(html) => html,
        Err(e) => {
            warn!(homepage, "homepage unreachable: {}", e);
            return HarvestResult::failed(vec![e.to_string()]);
        }
    };

    let mut visited = vec![homepage.to_string()];
    let mut raw_candidates = extract::extract_candidates(&homepage_html);
    let mut errors = Vec::new();

    if raw_candidates.is_empty() {
        let links = discover_in_domain_links(&homepage_html, &base_url);
        let ranked = rank_links(links);
        let priority_pages: Vec<String> = ranked.into_iter().take(PRIORITY_PAGE_LIMIT).collect();

        let semaphore = std::sync::Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));

        let futures = priority_pages.into_iter().map(|url| {
            let client = client.clone();
            let semaphore = std::sync::Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match fetch_with_retry(&client, &url).await {
                    Ok(html) => Some((url, extract::extract_candidates(&html), None)),
                    Err(e) => Some((url, Vec::new(), Some(e.to_string()))),
                }
            }
        });

        for result in join_all(futures).await.into_iter().flatten() {
            let (url, candidates, error) = result;
            visited.push(url);
            raw_candidates.extend(candidates);
            if let Some(e) = error {
                errors.push(e);
            }
        }
    } else {
        debug!(homepage, "homepage yielded emails, skipping priority-page fetch");
    }

    let site_domain = base_url.host_str().unwrap_or_default();
    let emails = sanitize_and_order(&raw_candidates, site_domain);

    HarvestResult {
        emails,
        pages_visited: visited.len(),
        visited,
        errors,
    }
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Result<String, EmailHarvestError> {
    let mut last_status = None;
    for (attempt, backoff_ms) in RETRY_BACKOFFS_MS.iter().enumerate() {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                last_status = Some(resp.status().as_u16());
                debug!(url, attempt, status = ?last_status, "retrying after server error");
            }
            Ok(resp) if !resp.status().is_success() => {
                return Err(EmailHarvestError::FetchStatus(resp.status().as_u16()));
            }
            Ok(resp) => {
                return resp
                    .text()
                    .await
                    .map_err(|e| EmailHarvestError::HomepageUnreachable(e.into()));
            }
            Err(e) if e.is_timeout() => {
                debug!(url, attempt, "retrying after timeout");
            }
            Err(e) => {
                return Err(EmailHarvestError::HomepageUnreachable(e.into()));
            }
        }
        tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
    }
    Err(EmailHarvestError::FetchStatus(last_status.unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_never_panics() {
        let _ = build_client();
    }
}
