//! In-domain link discovery used to build the email harvester's visit queue.

use scraper::{Html, Selector};
use url::Url;

/// Collect absolute, in-domain (same registrable-domain-ignorant host)
/// anchor hrefs from `html`, resolved against `base_url`.
#[must_use]
pub fn discover_in_domain_links(html: &str, base_url: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse("a[href]") else { return Vec::new() };

    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else { continue };
        let Ok(resolved) = base_url.join(href) else { continue };
        if resolved.host_str() == base_url.host_str() && matches!(resolved.scheme(), "http" | "https") {
            out.push(resolved.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_same_host_links() {
        let base = Url::parse("https://acme.test/").unwrap();
        let html = r#"
            <a href="/contact">Contact</a>
            <a href="https://other.test/page">Other</a>
            <a href="mailto:hi@acme.test">Mail</a>
        "#;
        let links = discover_in_domain_links(html, &base);
        assert_eq!(links, vec!["https://acme.test/contact".to_string()]);
    }
}
