//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional
//! `roastscout.toml` next to the working directory, then environment
//! variables prefixed `ROASTSCOUT_` (nested keys separated by `__`,
//! e.g. `ROASTSCOUT_FETCHER__MAX_RETRIES=5`).

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub fetcher: FetcherConfig,
    pub enrichment: EnrichmentConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

/// Cache directories and default TTLs per namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for the file cache.
    pub root_dir: PathBuf,

    /// Default freshness window for cached pages, in days.
    pub page_ttl_days: u32,

    /// Default freshness window for cached roaster records, in days.
    pub roaster_ttl_days: u32,

    /// Default freshness window for cached product lists, in days.
    pub products_ttl_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let root_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("roastscout");
        Self {
            root_dir,
            page_ttl_days: 7,
            roaster_ttl_days: 30,
            products_ttl_days: 7,
        }
    }
}

/// HTTP fetcher behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum attempts per fetch (shared between errors and redirects).
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Process-wide cap on outgoing requests per second.
    pub max_requests_per_second: u32,

    /// Per-host cap on requests per second.
    pub per_host_requests_per_second: f64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            timeout_secs: 30,
            user_agent: "roastscout/0.3 (+https://github.com/roastscout/roastscout)".to_string(),
            max_requests_per_second: 10,
            per_host_requests_per_second: 2.0,
        }
    }
}

/// Enrichment collaborator settings. Enrichment is a no-op pass-through
/// when no API key is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum sites processed concurrently.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,

    /// Enable JSON formatted logs.
    pub json_format: bool,

    /// Enable file output alongside the console.
    pub file_output: bool,

    /// Directory for log files when file output is on.
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_output: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database URL, e.g. `sqlite:roastscout.db`.
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:roastscout.db".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, optional file, and environment.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("roastscout").required(false))
            .add_source(config::Environment::with_prefix("ROASTSCOUT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Misconfiguration is fatal at startup, unlike every runtime error.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.max_retries == 0 {
            bail!("fetcher.max_retries must be at least 1");
        }
        if self.fetcher.max_requests_per_second == 0 {
            bail!("fetcher.max_requests_per_second must be at least 1");
        }
        if self.fetcher.per_host_requests_per_second <= 0.0 {
            bail!("fetcher.per_host_requests_per_second must be positive");
        }
        if self.batch.concurrency == 0 {
            bail!("batch.concurrency must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetcher.max_retries, 3);
        assert_eq!(config.batch.concurrency, 5);
        assert!(config.enrichment.api_key.is_none());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retries_is_rejected() {
        let mut config = AppConfig::default();
        config.fetcher.max_retries = 0;
        assert!(config.validate().is_err());
    }
}
