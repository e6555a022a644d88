//! Review Filter: extracts reviews from an already-open detail page and
//! keeps only those whose (relative-date-resolved) timestamp falls within a
//! requested time range.

mod js;

use std::time::Duration;

use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::model::{FilteredReview, ReviewTimeRange};

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(10);

static RELATIVE_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(a|an|\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct RawReview {
    text: String,
    rating: Option<f64>,
    relative_date: String,
}

/// Evaluate the in-page review script, racing a 10 s timeout. Returns an
/// empty vec on timeout or any evaluation error rather than failing the
/// whole detail extraction.
pub async fn extract_reviews(page: &Page) -> Vec<FilteredReview> {
    let raw = match extract_raw(page).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("review extraction failed: {}", e);
            Vec::new()
        }
    };

    let now = Utc::now();
    raw.into_iter()
        .filter_map(|r| {
            let date = resolve_relative_date(&r.relative_date, now)?;
            Some(FilteredReview {
                text: r.text,
                rating: r.rating,
                date,
            })
        })
        .collect()
}

async fn extract_raw(page: &Page) -> anyhow::Result<Vec<RawReview>> {
    let eval = page.evaluate(js::REVIEWS_SCRIPT);
    let value = tokio::time::timeout(EXTRACTION_TIMEOUT, eval)
        .await
        .map_err(|_| anyhow::anyhow!("review extraction timed out"))??;
    let reviews: Vec<RawReview> = value.into_value()?;
    debug!(count = reviews.len(), "extracted raw reviews");
    Ok(reviews)
}

/// Keep only reviews within `range`, returning the survivors and the
/// pre-filter count.
#[must_use]
pub fn apply_time_range(reviews: Vec<FilteredReview>, range: &ReviewTimeRange) -> (Vec<FilteredReview>, usize) {
    let pre_filter_count = reviews.len();
    let kept = reviews.into_iter().filter(|r| range.contains(r.date)).collect();
    (kept, pre_filter_count)
}

/// Resolve a map-service relative timestamp ("a month ago", "3 years ago")
/// to an absolute UTC instant, anchored at `now`. Unparseable strings (e.g.
/// "Google user has not written a review") yield `None` and are dropped.
fn resolve_relative_date(relative: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let captures = RELATIVE_UNIT_RE.captures(relative)?;
    let count: i64 = match &captures[1] {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };
    let unit_seconds: i64 = match captures[2].to_lowercase().as_str() {
        "second" => 1,
        "minute" => 60,
        "hour" => 3_600,
        "day" => 86_400,
        "week" => 86_400 * 7,
        "month" => 86_400 * 30,
        "year" => 86_400 * 365,
        _ => return None,
    };
    now.checked_sub_signed(chrono::Duration::seconds(count * unit_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn resolves_singular_article_forms() {
        let resolved = resolve_relative_date("a month ago", anchor()).unwrap();
        assert!(resolved < anchor());
        assert!(resolved > anchor() - chrono::Duration::days(32));
    }

    #[test]
    fn resolves_plural_numeric_forms() {
        let resolved = resolve_relative_date("3 years ago", anchor()).unwrap();
        let expected = anchor() - chrono::Duration::days(365 * 3);
        assert_eq!(resolved, expected);
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert!(resolve_relative_date("visited with family", anchor()).is_none());
    }

    #[test]
    fn apply_time_range_drops_reviews_outside_window() {
        let range = ReviewTimeRange {
            from: anchor() - chrono::Duration::days(10),
            to: anchor(),
        };
        let reviews = vec![
            FilteredReview {
                text: "recent".to_string(),
                rating: Some(5.0),
                date: anchor() - chrono::Duration::days(2),
            },
            FilteredReview {
                text: "old".to_string(),
                rating: Some(3.0),
                date: anchor() - chrono::Duration::days(400),
            },
        ];
        let (kept, pre_count) = apply_time_range(reviews, &range);
        assert_eq!(pre_count, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "recent");
    }
}
