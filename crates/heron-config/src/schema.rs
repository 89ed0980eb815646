//! Settings sections.

use serde::{Deserialize, Serialize};

/// Request and response validation settings.
///
/// # Example
///
/// ```
/// use heron_config::ValidationSettings;
///
/// let settings = ValidationSettings::default();
/// assert!(settings.validate_responses);
/// assert_eq!(settings.strict_request_validation, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSettings {
    /// Re-validate produced responses against their declared specs.
    #[serde(default = "default_true")]
    pub validate_responses: bool,

    /// Forces strict or lax request validation. `None` lets each model
    /// decide.
    #[serde(default)]
    pub strict_request_validation: Option<bool>,

    /// Validate response bodies strictly.
    #[serde(default = "default_true")]
    pub strict_response_validation: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            validate_responses: true,
            strict_request_validation: None,
            strict_response_validation: true,
        }
    }
}

/// HTTP method settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Methods whose form bodies are parsed like `POST`.
    #[serde(default = "default_treat_as_post")]
    pub treat_as_post: Vec<String>,

    /// Custom lowercase method names every controller accepts.
    #[serde(default)]
    pub allowed_http_methods: Vec<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            treat_as_post: default_treat_as_post(),
            allowed_http_methods: Vec::new(),
        }
    }
}

fn default_treat_as_post() -> Vec<String> {
    vec!["PUT".to_string(), "PATCH".to_string(), "DELETE".to_string()]
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines, one object per event.
    #[default]
    Json,
    /// Human readable, multi-line.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Service name attached to log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "heron".to_string()
}

const fn default_true() -> bool {
    true
}
