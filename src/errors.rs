//! Error taxonomy for the pipeline.
//!
//! Each component exposes its own `thiserror` enum; `FailureKind` classifies
//! any `anyhow`-wrapped failure into a retry bucket the way the teacher's
//! `crawl_engine::crawl_types::FailureKind` does, and `PipelineError` is the
//! job-fatal umbrella type that crosses component boundaries.

use std::fmt;
use thiserror::Error;

/// Errors raised by the browser pool.
#[derive(Debug, Error)]
pub enum BrowserPoolError {
    #[error("browser unavailable after {attempts} reconnect attempts: {source}")]
    Unavailable { attempts: u32, source: anyhow::Error },
    #[error("failed to launch browser: {0}")]
    LaunchFailed(anyhow::Error),
    #[error("failed to connect to remote renderer at {endpoint}: {source}")]
    RemoteConnectFailed { endpoint: String, source: anyhow::Error },
    #[error("pool is shutting down")]
    ShuttingDown,
}

/// Errors raised while harvesting emails from a business website.
#[derive(Debug, Error)]
pub enum EmailHarvestError {
    #[error("homepage navigation failed: {0}")]
    HomepageUnreachable(anyhow::Error),
    #[error("harvest budget ({0:?}) exceeded before any page completed")]
    BudgetExceeded(std::time::Duration),
    #[error("browser closed mid-harvest: {0}")]
    BrowserClosed(anyhow::Error),
    #[error("content-fetch endpoint returned status {0}")]
    FetchStatus(u16),
}

/// Errors raised while verifying an email address's deliverability.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("syntactically invalid address: {0}")]
    InvalidSyntax(String),
    #[error("no MX or A/AAAA records for domain {0}")]
    NoMailExchanger(String),
    #[error("SMTP connection failed: {0}")]
    ConnectFailed(std::io::Error),
    #[error("SMTP command timed out")]
    Timeout,
    #[error("SMTP protocol violation: {0}")]
    Protocol(String),
}

/// Errors raised by the job runner / queue.
#[derive(Debug, Error)]
pub enum JobRunnerError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error("browser pool unrecoverable: {0}")]
    BrowserPoolUnrecoverable(#[from] BrowserPoolError),
    #[error("job was cancelled by user deletion")]
    Cancelled,
    #[error("persistence error: {0}")]
    Persistence(anyhow::Error),
}

/// Top-level job-fatal error, the only kind allowed to cross the
/// city/job boundary per the propagation policy (§7).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Runner(#[from] JobRunnerError),
    #[error(transparent)]
    Pool(#[from] BrowserPoolError),
    #[error("infrastructure error: {0}")]
    Infrastructure(anyhow::Error),
}

impl PipelineError {
    /// Machine-readable reason code recorded on the terminal job error payload.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Runner(JobRunnerError::InvalidScope(_)) => "invalid_scope",
            Self::Runner(JobRunnerError::Cancelled) => "cancelled",
            Self::Runner(JobRunnerError::BrowserPoolUnrecoverable(_)) | Self::Pool(_) => {
                "browser_pool_unavailable"
            }
            Self::Runner(JobRunnerError::Persistence(_)) => "persistence_error",
            Self::Infrastructure(_) => "infrastructure_error",
        }
    }
}

/// Categorizes a failure for intelligent retry decisions, mirroring the
/// teacher's `crawl_engine::crawl_types::FailureKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network-level failure (timeout, DNS, connection refused). High retry value.
    Network,
    /// Browser/page failure (crash, CDP error, target closed). Medium retry value.
    Browser,
    /// Content extraction failure (selector missing, DOM shape changed). Not retryable.
    ContentExtraction,
    /// Unknown/unclassified error.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Browser => "browser",
            Self::ContentExtraction => "content_extraction",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FailureKind {
    /// Classify an error into a failure kind based on message-pattern matching,
    /// the same heuristic the teacher applies in `FailureKind::classify`.
    #[must_use]
    pub fn classify(error: &anyhow::Error) -> Self {
        let msg = error.to_string().to_lowercase();

        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("unreachable")
        {
            return Self::Network;
        }

        if msg.contains("target closed")
            || msg.contains("session not found")
            || msg.contains("frame detached")
            || msg.contains("websocket")
            || msg.contains("browser")
            || msg.contains("cdp")
        {
            return Self::Browser;
        }

        if msg.contains("selector")
            || msg.contains("extract")
            || msg.contains("not found in dom")
            || msg.contains("parse")
        {
            return Self::ContentExtraction;
        }

        Self::Unknown
    }

    /// Whether this failure kind should be retried by default.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Network | Self::Browser | Self::Unknown => true,
            Self::ContentExtraction => false,
        }
    }

    /// Base delay multiplier applied on top of linear/exponential backoff.
    #[must_use]
    pub const fn delay_multiplier(self) -> f64 {
        match self {
            Self::Network => 1.0,
            Self::Browser => 1.5,
            Self::ContentExtraction | Self::Unknown => 1.0,
        }
    }
}

/// Whether a message matches the "connection-class" error set the spec calls
/// out for detail-worker page recreation (§4.7) and browser pool reconstruction (§4.1).
#[must_use]
pub fn is_connection_class_error(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    [
        "target closed",
        "session not found",
        "frame detached",
        "navigation timeout",
        "websocket closed",
        "dropped socket",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_errors() {
        let e = anyhow::anyhow!("request timed out after 10s");
        assert_eq!(FailureKind::classify(&e), FailureKind::Network);
    }

    #[test]
    fn classifies_browser_errors() {
        let e = anyhow::anyhow!("Protocol error: Target closed");
        assert_eq!(FailureKind::classify(&e), FailureKind::Browser);
    }

    #[test]
    fn content_extraction_not_retryable() {
        assert!(!FailureKind::ContentExtraction.is_retryable());
        assert!(FailureKind::Network.is_retryable());
    }

    #[test]
    fn connection_class_detection() {
        assert!(is_connection_class_error("Error: Target closed."));
        assert!(is_connection_class_error("session not found for frame"));
        assert!(!is_connection_class_error("selector not found in dom"));
    }
}
