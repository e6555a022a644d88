//! Core configuration types for the extraction pipeline.

use std::sync::Arc;
use std::time::Duration;

use super::env::EnvConfig;

/// SMTP-callout specific tuning, split out because it is also consumed
/// standalone by `verify::smtp` unit tests.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub helo_host: String,
    pub mail_from: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub try_starttls: bool,
    pub catchall_probe: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            helo_host: "localhost".to_string(),
            mail_from: "verify@localhost".to_string(),
            port: 25,
            connect_timeout: Duration::from_millis(10_000),
            command_timeout: Duration::from_millis(15_000),
            try_starttls: true,
            catchall_probe: true,
        }
    }
}

/// Main configuration struct for a pipeline run.
///
/// **INVARIANT:** `scraper_concurrency` and `email_concurrency` are always
/// `>= 1` (enforced in the builder).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub(crate) browser_ws_endpoint: Option<String>,
    pub(crate) headless: bool,
    pub(crate) scraper_concurrency: usize,
    pub(crate) email_concurrency: usize,
    pub(crate) email_pages_max: usize,
    pub(crate) email_timeout: Duration,
    pub(crate) email_api_timeout: Duration,
    pub(crate) email_fallback_on_smtp_failure: bool,
    pub(crate) smtp: SmtpConfig,
    pub(crate) logs_per_second_limit: Option<u32>,
    pub(crate) db_path: String,
    pub(crate) max_concurrent_pages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_env(&EnvConfig::from_env())
    }
}

impl PipelineConfig {
    /// Build a config from a resolved `EnvConfig`, applying the same
    /// production/development branching the teacher applies to its own
    /// environment-derived defaults.
    #[must_use]
    pub fn from_env(env: &EnvConfig) -> Self {
        Self {
            browser_ws_endpoint: env.browser_ws_endpoint_private.clone(),
            headless: true,
            scraper_concurrency: env.scraper_concurrency.unwrap_or(if env.is_production {
                2
            } else {
                5
            }),
            email_concurrency: env.email_api_concurrency.unwrap_or(4),
            email_pages_max: env.email_pages_max.unwrap_or(5),
            email_timeout: Duration::from_millis(env.email_timeout_ms.unwrap_or(65_000)),
            email_api_timeout: Duration::from_millis(env.email_api_timeout_ms.unwrap_or(30_000)),
            email_fallback_on_smtp_failure: env.email_fallback_on_smtp_failure,
            smtp: SmtpConfig {
                helo_host: env.helo_host.clone().unwrap_or_else(|| "localhost".to_string()),
                mail_from: env.mail_from.clone().unwrap_or_else(|| "verify@localhost".to_string()),
                port: env.smtp_port.unwrap_or(25),
                connect_timeout: Duration::from_millis(env.smtp_connect_timeout_ms.unwrap_or(10_000)),
                command_timeout: Duration::from_millis(env.smtp_command_timeout_ms.unwrap_or(15_000)),
                try_starttls: env.smtp_try_starttls,
                catchall_probe: env.smtp_catchall_probe,
            },
            logs_per_second_limit: if env.is_production {
                Some(env.logs_per_second_limit.unwrap_or(500))
            } else {
                None
            },
            db_path: env.db_path.clone(),
            max_concurrent_pages: env.scraper_concurrency.unwrap_or(5).max(4),
        }
    }

    #[must_use]
    pub fn browser_ws_endpoint(&self) -> Option<&str> {
        self.browser_ws_endpoint.as_deref()
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn scraper_concurrency(&self) -> usize {
        self.scraper_concurrency.max(1)
    }

    #[must_use]
    pub fn email_concurrency(&self) -> usize {
        self.email_concurrency.max(1)
    }

    #[must_use]
    pub fn email_pages_max(&self) -> usize {
        self.email_pages_max
    }

    #[must_use]
    pub fn email_timeout(&self) -> Duration {
        self.email_timeout
    }

    #[must_use]
    pub fn email_api_timeout(&self) -> Duration {
        self.email_api_timeout
    }

    #[must_use]
    pub fn email_fallback_on_smtp_failure(&self) -> bool {
        self.email_fallback_on_smtp_failure
    }

    #[must_use]
    pub fn smtp(&self) -> &SmtpConfig {
        &self.smtp
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    #[must_use]
    pub fn max_concurrent_pages(&self) -> usize {
        self.max_concurrent_pages.max(1)
    }

    /// Fluent override, mirrors the teacher's `#[must_use] pub fn with_x(mut self, ...) -> Self`.
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn with_scraper_concurrency(mut self, n: usize) -> Self {
        self.scraper_concurrency = n.max(1);
        self
    }

    #[must_use]
    pub fn with_browser_ws_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.browser_ws_endpoint = Some(endpoint.into());
        self
    }
}

/// Shared config handle passed into components that need read-only access
/// without owning a clone of every field.
pub type SharedConfig = Arc<PipelineConfig>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_default_concurrency_is_five() {
        let env = EnvConfig {
            is_production: false,
            ..EnvConfig::from_env()
        };
        let cfg = PipelineConfig::from_env(&env);
        assert_eq!(cfg.scraper_concurrency(), 5);
    }

    #[test]
    fn prod_default_concurrency_is_two() {
        let env = EnvConfig {
            is_production: true,
            ..EnvConfig::from_env()
        };
        let cfg = PipelineConfig::from_env(&env);
        assert_eq!(cfg.scraper_concurrency(), 2);
    }

    #[test]
    fn explicit_override_wins_over_branch_default() {
        let env = EnvConfig {
            is_production: true,
            scraper_concurrency: Some(9),
            ..EnvConfig::from_env()
        };
        let cfg = PipelineConfig::from_env(&env);
        assert_eq!(cfg.scraper_concurrency(), 9);
    }
}
