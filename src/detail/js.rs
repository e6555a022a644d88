//! JS eval script for the Detail Extractor, evaluated via `page.evaluate`.

/// Extracts name/category/rating/review-count/phone/address/website from a
/// detail page's DOM. Coordinates are deliberately left to the Rust side,
/// which parses them out of the page URL rather than the DOM (see
/// `detail::parse_coordinates_from_url`).
pub const DETAIL_FIELDS_SCRIPT: &str = r#"
(() => {
    const name = document.querySelector('h1')?.textContent?.trim() || null;

    const category = document.querySelector('button[jsaction*="category"]')?.textContent?.trim()
        || document.querySelector('[class*="category"]')?.textContent?.trim()
        || null;

    let rating = null;
    let review_count = null;
    const ratingLabel = document.querySelector('div[role="img"][aria-label*="star"]')?.getAttribute('aria-label');
    if (ratingLabel) {
        const ratingMatch = ratingLabel.match(/(\d+(?:\.\d+)?)\s*stars?/i);
        if (ratingMatch) rating = parseFloat(ratingMatch[1]);
    }
    const reviewButton = document.querySelector('button[aria-label*="review"]')?.getAttribute('aria-label');
    if (reviewButton) {
        const reviewMatch = reviewButton.match(/([\d,]+)\s*review/i);
        if (reviewMatch) review_count = parseFloat(reviewMatch[1].replace(/,/g, ''));
    }

    const phoneLink = document.querySelector('a[href^="tel:"]');
    const phone = phoneLink ? phoneLink.getAttribute('href').replace('tel:', '') : null;

    const addressButton = document.querySelector('button[data-item-id*="address"]');
    const address = addressButton ? addressButton.getAttribute('aria-label')?.replace(/^Address:\s*/i, '') : null;

    function unwrapRedirect(href) {
        try {
            const url = new URL(href);
            if (url.hostname.includes('google.') && url.pathname.includes('/url')) {
                const q = url.searchParams.get('q');
                if (q) return q;
            }
        } catch (e) { /* not a valid URL, fall through */ }
        return href;
    }

    function looksLikeDomain(text) {
        return !!text && /[a-z0-9-]+\.[a-z]{2,}/i.test(text);
    }

    let website = null;

    const explicitAuthority = document.querySelector('a[data-item-id="authority"]');
    if (explicitAuthority && explicitAuthority.href) {
        website = unwrapRedirect(explicitAuthority.href);
    }

    if (!website) {
        const labeled = Array.from(document.querySelectorAll('a[aria-label]'))
            .find(a => /website/i.test(a.getAttribute('aria-label') || ''));
        if (labeled && labeled.href) website = unwrapRedirect(labeled.href);
    }

    if (!website) {
        const mapsHost = location.hostname;
        const candidate = Array.from(document.querySelectorAll('a[href^="http"]'))
            .find(a => {
                const href = a.href;
                if (!href || href.includes(mapsHost)) return false;
                const label = a.getAttribute('aria-label') || a.textContent || '';
                return looksLikeDomain(label) || looksLikeDomain(href);
            });
        if (candidate) website = unwrapRedirect(candidate.href);
    }

    if (!website) {
        const ownerPosted = document.querySelector('a[data-item-id*="owner"][href^="http"]');
        if (ownerPosted) website = unwrapRedirect(ownerPosted.href);
    }

    return { name, category, rating, review_count, phone, address, website };
})()
"#;
