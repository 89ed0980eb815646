//! Structured logging for Heron.
//!
//! Every crate of the framework logs through `tracing` macros with
//! structured fields:
//!
//! | Level | Events |
//! |-------|--------|
//! | `debug` | Negotiation decisions, endpoint metadata, component resolution |
//! | `warn` | Client validation failures, rejected auth |
//! | `error` | Response contract violations, unhandled errors |
//!
//! [`init_logging`] installs the subscriber that formats those events.
//!
//! # Example
//!
//! ```rust,ignore
//! use heron_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(controller = "UserController", "Controller built");
//! ```

use crate::error::LoggingError;
use heron_config::{LogFormat, LoggingSettings};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Level or filter directive, used when `RUST_LOG` is not set.
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Service name, recorded on the root span.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "heron".to_string(),
        }
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        let base = match settings.format {
            LogFormat::Json => Self::production(),
            LogFormat::Pretty => Self::development(),
        };
        Self {
            enabled: settings.enabled,
            level: settings.level.clone(),
            service_name: settings.service_name.clone(),
            ..base
        }
    }
}

/// Builds the filter: `RUST_LOG` when set, `level` otherwise.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] when `level` cannot be parsed.
pub fn create_env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter(format!("{level}: {e}")))
}

/// Installs the global logging subscriber.
///
/// Does nothing when logging is disabled.
///
/// # Errors
///
/// Fails on an invalid filter, or when a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_thread_ids(config.thread_ids)
        .with_target(config.include_target);
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_format {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.pretty().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(service = %config.service_name, json = config.json_format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let dev = LogConfig::development();
        assert!(!dev.json_format);
        assert!(dev.span_events);
        assert_eq!(dev.level, "debug");

        let prod = LogConfig::production();
        assert!(prod.json_format);
        assert!(!prod.file_line_info);
        assert_eq!(prod.service_name, "heron");
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            enabled: true,
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            service_name: "users".to_string(),
        };
        let config = LogConfig::from(&settings);
        assert!(!config.json_format);
        assert_eq!(config.level, "warn");
        assert_eq!(config.service_name, "users");
    }

    #[test]
    fn test_invalid_filter() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = create_env_filter("heron=[").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter(_)));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
