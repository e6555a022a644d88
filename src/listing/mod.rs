//! Listing Harvester: extracts listing cards from a rendered, scrolled
//! search page and applies the rating/review-count filters inline.

mod js;

use crate::model::{JobParams, NumericFilter};
use chromiumoxide::Page;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct ListingCardRaw {
    detail_url: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    review_count: Option<f64>,
}

/// Surviving URLs plus the pre-filter count, so callers can report filter
/// efficiency without re-deriving it.
#[derive(Debug, Clone)]
pub struct HarvestedListings {
    pub urls: Vec<String>,
    pub pre_filter_count: usize,
}

/// Extract listing cards and apply rating/review-count filters. An item with
/// a filterable attribute missing is kept only when the corresponding filter
/// itself is absent (a missing rating never silently fails a present filter
/// the other way).
pub async fn harvest_listings(
    page: &Page,
    params: &JobParams,
) -> anyhow::Result<HarvestedListings> {
    let result = page
        .evaluate(js::LISTING_CARDS_SCRIPT)
        .await
        .map_err(|e| anyhow::anyhow!("listing-card extraction script failed: {e}"))?;

    let cards: Vec<ListingCardRaw> = result
        .into_value()
        .map_err(|e| anyhow::anyhow!("failed to parse listing cards: {e}"))?;

    let pre_filter_count = cards.len();
    debug!(pre_filter_count, "extracted raw listing cards");

    let urls = cards
        .into_iter()
        .filter(|card| passes_filter(card.rating, &params.rating_filter))
        .filter(|card| passes_filter(card.review_count, &params.review_count_filter))
        .map(|card| card.detail_url)
        .collect();

    Ok(HarvestedListings { urls, pre_filter_count })
}

fn passes_filter(value: Option<f64>, filter: &Option<NumericFilter>) -> bool {
    match (value, filter) {
        (_, None) => true,
        (None, Some(_)) => true,
        (Some(v), Some(f)) => f.accepts(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterOp;

    #[test]
    fn missing_attribute_passes_when_filter_present() {
        let filter = Some(NumericFilter { op: FilterOp::Gte, value: 4.0 });
        assert!(passes_filter(None, &filter));
    }

    #[test]
    fn present_attribute_respects_filter() {
        let filter = Some(NumericFilter { op: FilterOp::Gte, value: 4.0 });
        assert!(passes_filter(Some(4.5), &filter));
        assert!(!passes_filter(Some(3.9), &filter));
    }

    #[test]
    fn absent_filter_always_passes() {
        assert!(passes_filter(Some(1.0), &None));
        assert!(passes_filter(None, &None));
    }
}
