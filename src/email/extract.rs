//! Pure HTML -> email-candidate extraction, shared by the render-driven and
//! fetch-driven crawlers. Operates on raw HTML text so it never touches a
//! live page or network connection directly.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static STRICT_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

// A relaxed pass that tolerates a leading punctuation/emoji glyph immediately
// before the local part, used only when the strict pass under-collects.
static RELAXED_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

const RELAXED_FALLBACK_THRESHOLD: usize = 5;

/// Extract every email candidate from an HTML document via every
/// documented source: `mailto:` links, anchor text/non-mailto hrefs, visible
/// body text, Cloudflare `data-cfemail` obfuscation, meta tags, footer text,
/// `data-email`/`data-contact`/`aria-label`, and JSON-LD.
#[must_use]
pub fn extract_candidates(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    extract_mailto_links(&doc, &mut out);
    extract_anchor_text(&doc, &mut out);
    extract_cf_emails(&doc, &mut out);
    extract_meta_tags(&doc, &mut out);
    extract_footer_text(&doc, &mut out);
    extract_data_attributes(&doc, &mut out);
    extract_json_ld(&doc, &mut out);

    let strict_matches: Vec<String> = STRICT_EMAIL_RE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .collect();
    let use_relaxed = strict_matches.len() < RELAXED_FALLBACK_THRESHOLD;
    out.extend(strict_matches);

    if use_relaxed {
        out.extend(
            RELAXED_EMAIL_RE
                .find_iter(html)
                .map(|m| m.as_str().to_string()),
        );
    }

    out
}

fn extract_mailto_links(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse(r#"a[href^="mailto:"]"#) else { return };
    for el in doc.select(&sel) {
        if let Some(href) = el.value().attr("href") {
            let addr = href.trim_start_matches("mailto:").split('?').next().unwrap_or("");
            if !addr.is_empty() {
                out.push(addr.to_string());
            }
        }
    }
}

fn extract_anchor_text(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("a") else { return };
    for el in doc.select(&sel) {
        let text = el.text().collect::<String>();
        out.extend(STRICT_EMAIL_RE.find_iter(&text).map(|m| m.as_str().to_string()));
        if let Some(href) = el.value().attr("href")
            && !href.starts_with("mailto:")
        {
            out.extend(STRICT_EMAIL_RE.find_iter(href).map(|m| m.as_str().to_string()));
        }
    }
}

fn extract_meta_tags(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("meta") else { return };
    for el in doc.select(&sel) {
        let name = el.value().attr("name").or_else(|| el.value().attr("property")).unwrap_or("");
        let is_relevant = name.to_lowercase().contains("email") || name.to_lowercase().contains("contact");
        if is_relevant
            && let Some(content) = el.value().attr("content")
        {
            out.extend(STRICT_EMAIL_RE.find_iter(content).map(|m| m.as_str().to_string()));
        }
    }
}

fn extract_footer_text(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("footer") else { return };
    for el in doc.select(&sel) {
        let text = el.text().collect::<String>();
        out.extend(STRICT_EMAIL_RE.find_iter(&text).map(|m| m.as_str().to_string()));
    }
}

fn extract_data_attributes(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("[data-email], [data-contact], [aria-label]") else { return };
    for el in doc.select(&sel) {
        for attr_name in ["data-email", "data-contact", "aria-label"] {
            if let Some(v) = el.value().attr(attr_name) {
                let relevant = attr_name != "aria-label"
                    || v.to_lowercase().contains("email")
                    || v.to_lowercase().contains("contact");
                if relevant {
                    out.extend(STRICT_EMAIL_RE.find_iter(v).map(|m| m.as_str().to_string()));
                }
            }
        }
    }
}

fn extract_cf_emails(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse("[data-cfemail]") else { return };
    for el in doc.select(&sel) {
        if let Some(encoded) = el.value().attr("data-cfemail")
            && let Some(decoded) = decode_cf_email(encoded)
        {
            out.push(decoded);
        }
    }
}

fn extract_json_ld(doc: &Html, out: &mut Vec<String>) {
    let Ok(sel) = Selector::parse(r#"script[type="application/ld+json"]"#) else { return };
    for el in doc.select(&sel) {
        let text = el.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            collect_json_ld_emails(&value, out);
        }
    }
}

fn collect_json_ld_emails(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(email)) = map.get("email") {
                out.push(email.clone());
            }
            if let Some(contact_point) = map.get("contactPoint") {
                collect_json_ld_emails(contact_point, out);
            }
            for v in map.values() {
                collect_json_ld_emails(v, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json_ld_emails(item, out);
            }
        }
        _ => {}
    }
}

/// Decode a Cloudflare `data-cfemail` obfuscated value: byte `r = hex[0:2]`,
/// then for each subsequent byte pair, `char = byte XOR r`.
#[must_use]
pub fn decode_cf_email(encoded: &str) -> Option<String> {
    let bytes = hex::decode(encoded).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let r = bytes[0];
    let decoded: Vec<u8> = bytes[1..].iter().map(|b| b ^ r).collect();
    String::from_utf8(decoded).ok()
}

/// Inverse of [`decode_cf_email`], used only by the round-trip test — the
/// pipeline never needs to encode.
#[cfg(test)]
#[must_use]
pub fn encode_cf_email(email: &str, r: u8) -> String {
    let mut bytes = vec![r];
    bytes.extend(email.bytes().map(|b| b ^ r));
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_encode_cf_email_roundtrips() {
        for r in [0u8, 1, 42, 255] {
            let email = "owner@example.com";
            let encoded = encode_cf_email(email, r);
            assert_eq!(decode_cf_email(&encoded).as_deref(), Some(email));
        }
    }

    #[test]
    fn extracts_mailto_link() {
        let html = r#"<a href="mailto:hello@acme.test">Email us</a>"#;
        let out = extract_candidates(html);
        assert!(out.iter().any(|e| e == "hello@acme.test"));
    }

    #[test]
    fn extracts_json_ld_contact_point_email() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Organization","contactPoint":{"@type":"ContactPoint","email":"info@acme.test"}}
        </script>"#;
        let out = extract_candidates(html);
        assert!(out.iter().any(|e| e == "info@acme.test"));
    }

    #[test]
    fn extracts_cf_obfuscated_email() {
        let encoded = encode_cf_email("sales@acme.test", 0x2a);
        let html = format!(r#"<a class="__cf_email__" data-cfemail="{encoded}">[email protected]</a>"#);
        let out = extract_candidates(&html);
        assert!(out.iter().any(|e| e == "sales@acme.test"));
    }

    #[test]
    fn relaxed_pass_only_fires_when_strict_undercounts() {
        let html = "plain text with no addresses at all";
        assert!(extract_candidates(html).is_empty());
    }
}
