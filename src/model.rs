//! Core data types shared across the pipeline: the persisted `Job` document,
//! the `Business` record it accumulates, and small value types derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator for a numeric filter on rating or review count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// Evaluate `value <op> threshold`.
    #[must_use]
    pub fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
        }
    }
}

/// A numeric filter applied to rating or review count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericFilter {
    pub op: FilterOp,
    pub value: f64,
}

impl NumericFilter {
    #[must_use]
    pub fn accepts(&self, value: f64) -> bool {
        self.op.matches(value, self.value)
    }
}

/// Inclusive UTC date range used by the review filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewTimeRange {
    pub from: chrono::DateTime<chrono::Utc>,
    pub to: chrono::DateTime<chrono::Utc>,
}

impl ReviewTimeRange {
    #[must_use]
    pub fn contains(&self, at: chrono::DateTime<chrono::Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Geographic scope requested for a job: a country, a country+state, or a
/// fully pinned country+state+city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobScope {
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
}

/// Input parameters for a job, as accepted from the (out-of-scope) HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    pub keyword: String,
    pub scope: JobScope,
    pub max_records: usize,
    pub rating_filter: Option<NumericFilter>,
    pub review_count_filter: Option<NumericFilter>,
    pub review_time_range: Option<ReviewTimeRange>,
    pub is_extract_email: bool,
    pub is_validate: bool,
    pub only_without_website: bool,
}

/// Job lifecycle status. Terminal states are immutable once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Progress snapshot for a running job. `percentage` and `records_collected`
/// must never decrease across successive writes for the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub percentage: u8,
    pub processed_listings: usize,
    pub total_listings: usize,
    pub records_collected: usize,
    pub max_records: usize,
}

impl JobProgress {
    #[must_use]
    pub fn starting(max_records: usize) -> Self {
        Self {
            percentage: 0,
            processed_listings: 0,
            total_listings: 0,
            records_collected: 0,
            max_records,
        }
    }

    /// Merge a later snapshot in with last-writer-wins semantics that refuse
    /// to roll back `percentage` or `records_collected`.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        Self {
            percentage: self.percentage.max(next.percentage),
            records_collected: self.records_collected.max(next.records_collected),
            ..next
        }
    }
}

/// Terminal error recorded on a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Aggregate metrics recorded alongside a job's result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub data_points_collected: usize,
}

/// One of the five deliverability outcomes an email address can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Deliverable,
    Risky,
    Undeliverable,
    Error,
    Unverified,
    Unknown,
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deliverable => "deliverable",
            Self::Risky => "risky",
            Self::Undeliverable => "undeliverable",
            Self::Error => "error",
            Self::Unverified => "unverified",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Whether email verification actually ran, and with what outcome mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailVerificationMode {
    Verified,
    Unverified,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationDetail {
    pub email: String,
    pub status: EmailStatus,
    pub catch_all: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerification {
    pub mode: EmailVerificationMode,
    pub details: Vec<EmailVerificationDetail>,
}

/// A single review extracted from a detail page and kept by the review filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredReview {
    pub text: String,
    pub rating: Option<f64>,
    pub date: chrono::DateTime<chrono::Utc>,
}

/// The fixed literal recorded as `search_type` on every record produced by
/// this pipeline (as opposed to some other ingestion path the data model
/// may one day support).
pub const SEARCH_TYPE: &str = "maps_keyword_search";

/// A canonical business record, immutable once appended to a job's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub name: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: String,
    pub category: Option<String>,
    pub search_term: String,
    pub search_type: String,
    pub search_location: String,
    pub detail_url: String,
    pub emails: Vec<String>,
    pub email_status: Vec<EmailStatus>,
    pub email_verification: Option<EmailVerification>,
    pub filtered_reviews: Option<Vec<FilteredReview>>,
    pub filtered_review_count: Option<usize>,
}

impl Business {
    /// Invariant check: `emails` and `email_status` are parallel arrays.
    #[must_use]
    pub fn emails_aligned(&self) -> bool {
        self.emails.len() == self.email_status.len()
    }

    /// Invariant check: coordinates, when present, are in valid ranges.
    #[must_use]
    pub fn coordinates_valid(&self) -> bool {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng),
            (None, None) => true,
            _ => false,
        }
    }
}

/// The unique identifier for a job.
pub type JobId = uuid::Uuid;

/// The persisted job document. Mutated only by the worker that owns it; the
/// HTTP layer (out of scope) writes only the initial `waiting` record and
/// the cancellation intent via a separate side channel (see `job::queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: String,
    pub params: JobParams,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result: Vec<Business>,
    pub error: Option<JobError>,
    pub metrics: JobMetrics,
}

impl Job {
    #[must_use]
    pub fn new(user_id: String, params: JobParams) -> Self {
        let max_records = params.max_records;
        Self {
            id: uuid::Uuid::new_v4(),
            user_id,
            params,
            status: JobStatus::Waiting,
            progress: JobProgress::starting(max_records),
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            result: Vec::new(),
            error: None,
            metrics: JobMetrics::default(),
        }
    }
}

/// Derived key used to deduplicate already-processed cities within a single
/// job: case-insensitive, whitespace-collapsed `(country, state, city)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey(String);

impl LocationKey {
    #[must_use]
    pub fn new(country: &str, state: &str, city: &str) -> Self {
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Self(format!("{}|{}|{}", normalize(country), normalize(state), normalize(city)))
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_op_boundary_gt_vs_gte() {
        let gt = NumericFilter { op: FilterOp::Gt, value: 4.0 };
        let gte = NumericFilter { op: FilterOp::Gte, value: 4.0 };
        assert!(!gt.accepts(4.0));
        assert!(gte.accepts(4.0));
    }

    #[test]
    fn location_key_case_and_whitespace_insensitive() {
        let a = LocationKey::new("US", "CA", "San   Francisco");
        let b = LocationKey::new("us", "ca", "san francisco");
        assert_eq!(a, b);
    }

    #[test]
    fn business_email_alignment_invariant() {
        let mut b = Business {
            name: "Acme".into(),
            phone: None,
            website: None,
            address: None,
            latitude: None,
            longitude: None,
            rating: None,
            rating_count: "0".into(),
            category: None,
            search_term: "acme".into(),
            search_type: SEARCH_TYPE.into(),
            search_location: "X".into(),
            detail_url: "https://maps.example/a".into(),
            emails: vec!["a@acme.test".into()],
            email_status: vec![EmailStatus::Deliverable],
            email_verification: None,
            filtered_reviews: None,
            filtered_review_count: None,
        };
        assert!(b.emails_aligned());
        b.emails.push("b@acme.test".into());
        assert!(!b.emails_aligned());
    }

    #[test]
    fn coordinates_range_invariant() {
        let mut b = Business {
            name: "Acme".into(),
            phone: None,
            website: None,
            address: None,
            latitude: Some(91.0),
            longitude: Some(0.0),
            rating: None,
            rating_count: "0".into(),
            category: None,
            search_term: "acme".into(),
            search_type: SEARCH_TYPE.into(),
            search_location: "X".into(),
            detail_url: "https://maps.example/a".into(),
            emails: vec![],
            email_status: vec![],
            email_verification: None,
            filtered_reviews: None,
            filtered_review_count: None,
        };
        assert!(!b.coordinates_valid());
        b.latitude = Some(45.0);
        assert!(b.coordinates_valid());
    }
}
