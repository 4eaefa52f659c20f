//! Logging setup.
//!
//! Diagnostics go to stderr so they never mix with command output. The
//! metrics layer itself only logs failures at `warn`, so the default filter
//! keeps a healthy run silent.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `level` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Overrides `RUST_LOG` when set.
    pub level: Option<tracing::Level>,
    pub format: LogFormat,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Compact,
            timestamps: false,
        }
    }
}

fn filter(config: &LogConfig) -> EnvFilter {
    match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install a global subscriber writing to stderr.
///
/// Fails if a subscriber is already installed.
///
/// ```no_run
/// use sen_metrics::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(&LogConfig { format: LogFormat::Json, ..Default::default() }).ok();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(filter(config));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry.with(layer.pretty()).try_init(),
        (LogFormat::Pretty, false) => registry.with(layer.pretty().without_time()).try_init(),
        (LogFormat::Compact, true) => registry.with(layer.compact()).try_init(),
        (LogFormat::Compact, false) => registry.with(layer.compact().without_time()).try_init(),
        (LogFormat::Json, true) => registry.with(layer.json()).try_init(),
        (LogFormat::Json, false) => registry.with(layer.json().without_time()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.level.is_none());
        assert!(!config.timestamps);
    }

    #[test]
    fn test_explicit_level_wins() {
        let config = LogConfig {
            level: Some(tracing::Level::DEBUG),
            ..Default::default()
        };
        assert_eq!(filter(&config).to_string(), "debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
