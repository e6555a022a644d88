//! Pipeline configuration: a fluent `PipelineConfig` builder (mirrors the
//! teacher's `CrawlConfigBuilder`) plus an `EnvConfig::from_env()` loader for
//! the environment variables named in spec §6.

mod env;
mod types;

pub use env::EnvConfig;
pub use types::{PipelineConfig, SmtpConfig};
