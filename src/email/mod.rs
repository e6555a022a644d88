//! Email Harvester: two interchangeable implementations (render-driven,
//! fetch-driven) sharing extraction, sanitization, and priority-ranking
//! logic.

mod extract;
mod fetch;
mod links;
mod priority;
mod render;
mod sanitize;

pub use fetch::{build_client, harvest_site as harvest_site_fetch};
pub use render::harvest_site as harvest_site_render;
pub use sanitize::registrable_domain_approx;

/// Outcome of a single site's email harvest, common to both crawler
/// variants.
#[derive(Debug, Clone, Default)]
pub struct HarvestResult {
    pub emails: Vec<String>,
    pub pages_visited: usize,
    pub visited: Vec<String>,
    pub errors: Vec<String>,
}

impl HarvestResult {
    #[must_use]
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            emails: Vec::new(),
            pages_visited: 0,
            visited: Vec::new(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_no_emails() {
        let result = HarvestResult::failed(vec!["boom".to_string()]);
        assert!(result.emails.is_empty());
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }
}
