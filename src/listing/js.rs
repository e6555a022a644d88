//! JS eval script for the Listing Harvester, evaluated via `page.evaluate`.

/// Extracts `{detail_url, name, rating, review_count}` for every listing
/// card in the results feed, parsing rating/review count out of the stars
/// control's accessible label (e.g. `"4.5 stars 213 Reviews"`).
pub const LISTING_CARDS_SCRIPT: &str = r#"
(() => {
    const cards = Array.from(document.querySelectorAll('div[role="feed"] a[href*="/maps/place/"]'));
    const seen = new Set();
    const out = [];

    for (const anchor of cards) {
        const detail_url = anchor.href;
        if (!detail_url || seen.has(detail_url)) continue;
        seen.add(detail_url);

        const card = anchor.closest('div[role="article"]') || anchor.parentElement;
        const name = anchor.getAttribute('aria-label') || (card && card.querySelector('[class*="name"]')?.textContent) || null;

        let rating = null;
        let review_count = null;
        const starsLabel = card && card.querySelector('span[role="img"]')?.getAttribute('aria-label');
        if (starsLabel) {
            const ratingMatch = starsLabel.match(/(\d+(?:\.\d+)?)\s*stars?/i);
            if (ratingMatch) rating = parseFloat(ratingMatch[1]);
            const reviewMatch = starsLabel.match(/([\d,]+)\s*review/i);
            if (reviewMatch) review_count = parseFloat(reviewMatch[1].replace(/,/g, ''));
        }

        out.push({ detail_url, name, rating, review_count });
    }

    return out;
})()
"#;
