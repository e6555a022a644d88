//! Candidate validation, sanitization, deduplication, and registrable-domain
//! biased ordering (§4.5 "Output ordering").

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static PHONE_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3,4}-?\d{4}").expect("valid regex"));
static ZIP_LIKE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}").expect("valid regex"));
static DOMAIN_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,6}$").expect("valid regex"));

const RESOURCE_TLDS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "css", "js", "pdf", "woff", "woff2", "ttf", "eot", "mp4",
    "webp", "ico",
];

const MAX_REASONABLE_TLD_LEN: usize = 24;
const TLD_WHITELIST: &[&str] = &["photography", "construction", "international"];

/// Validate and lowercase-normalize a raw candidate string. Returns `None`
/// for anything that fails the documented shape/heuristic checks.
#[must_use]
pub fn sanitize_candidate(raw: &str) -> Option<String> {
    let candidate = raw.trim().trim_end_matches(['.', ',', ';']).to_lowercase();
    let (local, domain) = candidate.split_once('@')?;

    if local.is_empty() || domain.is_empty() {
        return None;
    }

    let alpha_count = local.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if alpha_count < 2 {
        return None;
    }

    let digit_count = local.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count * 2 > local.len() {
        return None;
    }

    if PHONE_LIKE_RE.is_match(local) {
        return None;
    }

    if ZIP_LIKE_PREFIX_RE.is_match(local) {
        return None;
    }

    if !DOMAIN_SHAPE_RE.is_match(domain) {
        return None;
    }

    let tld = domain.rsplit('.').next().unwrap_or("");
    if RESOURCE_TLDS.contains(&tld) {
        return None;
    }
    if tld.len() > MAX_REASONABLE_TLD_LEN && !TLD_WHITELIST.contains(&tld) {
        return None;
    }

    Some(candidate)
}

/// Sanitize, validate, and deduplicate (case-insensitively) a batch of raw
/// candidates, then order so addresses whose domain is a suffix of the
/// site's registrable domain sort first.
#[must_use]
pub fn sanitize_and_order(raw_candidates: &[String], site_domain: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut valid: Vec<String> = raw_candidates
        .iter()
        .filter_map(|c| sanitize_candidate(c))
        .filter(|c| seen.insert(c.clone()))
        .collect();

    let site_registrable = registrable_domain_approx(site_domain);
    valid.sort_by_key(|email| {
        let email_domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("");
        let owner_match = registrable_domain_approx(email_domain) == site_registrable;
        std::cmp::Reverse(owner_match)
    });

    valid
}

/// Approximates a registrable domain as "the last two dot-separated
/// labels" rather than a full public-suffix-list lookup (documented
/// simplification, see DESIGN.md Open Question decisions).
#[must_use]
pub fn registrable_domain_approx(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        domain.to_lowercase()
    } else {
        labels[labels.len() - 2..].join(".").to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_phone_like_local_part() {
        assert_eq!(sanitize_candidate("555-1234@example.com"), None);
    }

    #[test]
    fn rejects_resource_tld() {
        assert_eq!(sanitize_candidate("owner@cdn.example.png"), None);
    }

    #[test]
    fn rejects_zip_like_local_part_prefix() {
        assert_eq!(sanitize_candidate("12345contact@acme.com"), None);
    }

    #[test]
    fn rejects_majority_numeric_local_part() {
        assert_eq!(sanitize_candidate("ab1234@example.com"), None);
    }

    #[test]
    fn accepts_well_formed_address() {
        assert_eq!(
            sanitize_candidate(" Owner@Example.COM. "),
            Some("owner@example.com".to_string())
        );
    }

    #[test]
    fn orders_owner_domain_first() {
        let candidates = vec![
            "info@thirdparty.io".to_string(),
            "owner@acme.com".to_string(),
        ];
        let ordered = sanitize_and_order(&candidates, "www.acme.com");
        assert_eq!(ordered[0], "owner@acme.com");
    }

    #[test]
    fn registrable_domain_takes_last_two_labels() {
        assert_eq!(registrable_domain_approx("mail.acme.co.uk"), "co.uk");
        assert_eq!(registrable_domain_approx("acme.com"), "acme.com");
    }
}
