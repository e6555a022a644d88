//! Priority scoring for in-domain links discovered on a business homepage.

const PRIORITY_TABLE: &[(&str, i32)] = &[
    ("contact", 150),
    ("reach", 140),
    ("get-in-touch", 140),
    ("getintouch", 140),
    ("connect", 130),
    ("impressum", 120),
    ("support", 70),
    ("help", 65),
    ("team", 40),
    ("about", 35),
    ("privacy", 20),
    ("legal", 20),
];

/// Score a link's priority for the email harvester's visit order, based on
/// keyword hits in its path/label. Zero for links matching nothing in the
/// table (they are still visited if budget allows, just last).
#[must_use]
pub fn score_link(path_or_label: &str) -> i32 {
    let haystack = path_or_label.to_lowercase();
    PRIORITY_TABLE
        .iter()
        .filter(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, score)| *score)
        .max()
        .unwrap_or(0)
}

/// Sort candidate links by descending priority score, stable on ties so the
/// original discovery order is preserved within a score bucket.
#[must_use]
pub fn rank_links(links: Vec<String>) -> Vec<String> {
    let mut scored: Vec<(i32, String)> = links.into_iter().map(|l| (score_link(&l), l)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, l)| l).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_outranks_about() {
        assert!(score_link("/contact-us") > score_link("/about"));
    }

    #[test]
    fn unmatched_link_scores_zero() {
        assert_eq!(score_link("/products/widget"), 0);
    }

    #[test]
    fn rank_links_puts_contact_first() {
        let ranked = rank_links(vec!["/about".into(), "/contact".into(), "/privacy".into()]);
        assert_eq!(ranked[0], "/contact");
    }
}
