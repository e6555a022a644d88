//! Detail Extractor: navigates to a listing's detail URL and pulls out the
//! fields that make up a `Business` record, minus the job-level context
//! (search term/location) that only the job runner knows.

mod js;

use chromiumoxide::Page;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const EXTRACTION_RACE_TIMEOUT: Duration = Duration::from_secs(10);

static COORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?\d+\.\d+)!4d(-?\d+\.\d+)").expect("valid regex"));

#[derive(Debug, Clone, Deserialize)]
struct DetailFieldsRaw {
    name: Option<String>,
    category: Option<String>,
    rating: Option<f64>,
    review_count: Option<f64>,
    phone: Option<String>,
    address: Option<String>,
    website: Option<String>,
}

/// The fields this layer is responsible for extracting. The job runner
/// fills in `search_term`/`search_type`/`search_location`/`detail_url` and
/// the email/review fields to build a full `Business`.
#[derive(Debug, Clone)]
pub struct DetailRecord {
    pub name: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: String,
    pub category: Option<String>,
}

/// Navigate to `detail_url` and extract its fields.
///
/// `Ok(None)` means the page loaded but had no usable content (missing
/// name) — a content-shape drop, not retried at any layer. `Err` surfaces
/// navigation/timeout failures so the job runner can classify them (its
/// worker pool retries connection-class errors by recreating the page; a
/// navigation timeout message deliberately matches that classifier).
pub async fn extract_detail(page: &Page, detail_url: &str) -> anyhow::Result<Option<DetailRecord>> {
    let navigate = async {
        page.goto(detail_url)
            .await
            .map_err(|e| anyhow::anyhow!("navigation failed: {e}"))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow::anyhow!("wait_for_navigation failed: {e}"))
    };

    tokio::time::timeout(NAVIGATION_TIMEOUT, navigate)
        .await
        .map_err(|_| anyhow::anyhow!("navigation timeout"))??;

    let fields = match tokio::time::timeout(EXTRACTION_RACE_TIMEOUT, extract_fields(page)).await {
        Ok(Ok(f)) => f,
        Ok(Err(e)) => {
            debug!(detail_url, "detail field extraction failed: {}", e);
            return Ok(None);
        }
        Err(_) => {
            debug!(detail_url, "detail field extraction timed out");
            return Ok(None);
        }
    };

    let current_url = page.url().await.ok().flatten().unwrap_or_default();
    let (latitude, longitude) = parse_coordinates_from_url(&current_url);

    let Some(name) = fields.name else {
        return Ok(None);
    };

    Ok(Some(DetailRecord {
        name,
        phone: fields.phone,
        website: fields.website,
        address: fields.address,
        latitude,
        longitude,
        rating: fields.rating,
        rating_count: fields
            .review_count
            .map(|c| (c as i64).to_string())
            .unwrap_or_else(|| "0".to_string()),
        category: fields.category,
    }))
}

async fn extract_fields(page: &Page) -> anyhow::Result<DetailFieldsRaw> {
    let result = page
        .evaluate(js::DETAIL_FIELDS_SCRIPT)
        .await
        .map_err(|e| anyhow::anyhow!("detail extraction script failed: {e}"))?;

    result
        .into_value()
        .map_err(|e| anyhow::anyhow!("failed to parse detail fields: {e}"))
}

/// The detail page's own URL is authoritative over any DOM-derived
/// coordinate: the mapping service embeds the place's coordinate tuple in
/// the path fragment `!3d<lat>!4d<lng>`.
fn parse_coordinates_from_url(url: &str) -> (Option<f64>, Option<f64>) {
    match COORD_PATTERN.captures(url) {
        Some(caps) => {
            let lat = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            let lng = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
            (lat, lng)
        }
        None => (None, None),
    }
}

/// Policy filters applied after extraction. Both are silent drops.
#[must_use]
pub fn passes_policy_filters(
    website: Option<&str>,
    only_without_website: bool,
    is_extract_email: bool,
) -> bool {
    if only_without_website && website.is_some() {
        return false;
    }
    if is_extract_email && website.is_none() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates_from_place_url() {
        let url = "https://www.google.com/maps/place/Acme/@37.7,-122.4,17z/data=!3d37.774930!4d-122.419420";
        let (lat, lng) = parse_coordinates_from_url(url);
        assert_eq!(lat, Some(37.774930));
        assert_eq!(lng, Some(-122.419420));
    }

    #[test]
    fn missing_coordinates_yields_none() {
        let (lat, lng) = parse_coordinates_from_url("https://www.google.com/maps/place/Acme/");
        assert_eq!(lat, None);
        assert_eq!(lng, None);
    }

    #[test]
    fn only_without_website_drops_records_with_website() {
        assert!(!passes_policy_filters(Some("https://acme.test"), true, false));
        assert!(passes_policy_filters(None, true, false));
    }

    #[test]
    fn extract_email_drops_records_without_website() {
        assert!(!passes_policy_filters(None, false, true));
        assert!(passes_policy_filters(Some("https://acme.test"), false, true));
    }
}
