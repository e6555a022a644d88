//! In-page extraction script for the review filter, following the same
//! DOM-query-plus-JSON-return shape as `detail::js`.

pub const REVIEWS_SCRIPT: &str = r#"
(() => {
    const out = [];
    const nodes = document.querySelectorAll('div[data-review-id], div[jsaction*="review"]');
    nodes.forEach((node) => {
        const textEl = node.querySelector('span[class*="review-full-text"], span.wiI7pd, div.MyEned');
        const text = textEl ? textEl.textContent.trim() : '';

        const starEl = node.querySelector('span[role="img"][aria-label*="star"]');
        let rating = null;
        if (starEl) {
            const m = starEl.getAttribute('aria-label').match(/([\d.]+)/);
            if (m) rating = parseFloat(m[1]);
        }

        const dateEl = node.querySelector('span.rsqaWe, span[class*="date"]');
        const relativeDate = dateEl ? dateEl.textContent.trim() : '';

        if (text || relativeDate) {
            out.push({ text, rating, relative_date: relativeDate });
        }
    });
    return out;
})()
"#;
