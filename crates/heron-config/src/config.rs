//! Root settings type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, HttpSettings, LogFormat, LoggingSettings, ValidationSettings};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete Heron settings.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and
/// environment variables over the defaults.
///
/// # Example
///
/// ```
/// use heron_config::HeronSettings;
///
/// let settings = HeronSettings::default();
/// assert!(settings.validation.validate_responses);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HeronSettings {
    /// Validation settings.
    #[serde(default)]
    pub validation: ValidationSettings,

    /// HTTP method settings.
    #[serde(default)]
    pub http: HttpSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl HeronSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unknown log level, a
    /// `treat_as_post` entry that is not an uppercase method, or a custom
    /// method name that is not lowercase.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown log level: {}", self.logging.level),
            ));
        }

        for method in &self.http.treat_as_post {
            let valid = !method.is_empty() && method.chars().all(|c| c.is_ascii_uppercase());
            if !valid {
                return Err(ConfigError::invalid_value(
                    "http.treat_as_post",
                    format!("{method} is not an uppercase method name"),
                ));
            }
        }

        for method in &self.http.allowed_http_methods {
            let valid = !method.is_empty()
                && method.chars().all(|c| c.is_ascii_lowercase() || c == '_');
            if !valid {
                return Err(ConfigError::invalid_value(
                    "http.allowed_http_methods",
                    format!("{method} is not a valid HTTP method name"),
                ));
            }
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, every response validated.
    #[must_use]
    pub fn development() -> Self {
        let mut settings = Self::default();
        settings.logging.level = "debug".to_string();
        settings.logging.format = LogFormat::Pretty;
        settings.validation.validate_responses = true;
        settings
    }

    /// Production preset: JSON logs at `info`, response validation off.
    #[must_use]
    pub fn production() -> Self {
        let mut settings = Self::default();
        settings.logging.level = "info".to_string();
        settings.logging.format = LogFormat::Json;
        settings.validation.validate_responses = false;
        settings
    }
}
