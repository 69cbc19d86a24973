//! Logging system configuration and initialization
//!
//! Console logging through `tracing-subscriber` with an `EnvFilter`
//! derived from configuration (`RUST_LOG` still wins when set), plus
//! optional daily-rotated file output.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use std::sync::Mutex;
use tracing_appender::non_blocking;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keep non-blocking writer guards alive for the process lifetime
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Initialize the logging system with default configuration.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize the logging system from configuration. Calling twice
/// returns an error from the subscriber registry; call once at startup.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("roastscout={},sqlx=warn", config.level)))
        .context("Invalid log filter")?;

    let console_layer = if config.json_format {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let registry = Registry::default().with(filter).with(console_layer);

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log dir {}", config.log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, "roastscout.log");
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS
            .lock()
            .expect("log guard mutex poisoned")
            .push(guard);
        registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry.try_init().context("Failed to initialize logging")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_initializes_once() {
        // second initialization in the same process must fail, not panic
        let first = init_logging();
        let second = init_logging();
        assert!(first.is_ok() || second.is_err());
    }
}
