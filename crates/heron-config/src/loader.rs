//! Layered settings loader.
//!
//! This module provides the [`ConfigLoader`] for loading settings from
//! defaults, files, strings, `.env` files and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, HeronSettings, LogFormat};

/// Settings loader with a layered approach.
///
/// Layers are applied in order, later layers override earlier ones field by
/// field:
/// 1. Default values (or a preset)
/// 2. Settings files and strings (TOML or JSON)
/// 3. Environment variables, `PREFIX__SECTION__KEY`
///
/// # Example
///
/// ```no_run
/// use heron_config::ConfigLoader;
///
/// # fn main() -> Result<(), heron_config::ConfigError> {
/// let settings = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("heron.toml")?
///     .with_dotenv()?
///     .with_env_prefix("HERON")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    settings: HeronSettings,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: HeronSettings::default(),
            env_prefix: None,
        }
    }

    /// Start over from the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.settings = HeronSettings::default();
        self
    }

    /// Start over from the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use heron_config::{ConfigLoader, LogFormat};
    ///
    /// let settings = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(settings.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.settings = HeronSettings::development();
        self
    }

    /// Start over from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.settings = HeronSettings::production();
        self
    }

    /// Layer a settings file.
    ///
    /// The format follows the extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, unreadable, malformed, has an
    /// unknown extension or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::missing_file(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        self.with_string(&content, &format)
    }

    /// Layer a settings file if it exists.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::with_file`] for an existing file.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Layer settings from a string in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Fails on malformed content, an unknown format or unknown fields.
    ///
    /// # Example
    ///
    /// ```
    /// use heron_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new()
    ///     .with_string("[validation]\nvalidate_responses = false\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert!(!settings.validation.validate_responses);
    /// assert!(settings.validation.strict_response_validation);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        let mut merged = serde_json::to_value(&self.settings)?;
        merge(&mut merged, layer);
        self.settings = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Load `.env` from the working directory, if there is one.
    ///
    /// Variables already set in the environment are kept.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(err.into()),
        }
    }

    /// Load a specific `.env` file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or cannot be parsed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Set the environment variable prefix, usually `HERON`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Fails when an override cannot be parsed or validation fails.
    ///
    /// # Example
    ///
    /// ```
    /// use heron_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new().load().unwrap();
    /// assert_eq!(settings.logging.level, "info");
    /// ```
    pub fn load(mut self) -> Result<HeronSettings, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&format!("{prefix}__")))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        self.settings.validate()?;
        Ok(self.settings)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> HeronSettings {
        self.settings
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_override(key, "invalid key format"))?;
        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let boolean = || {
            parse_bool(value).ok_or_else(|| ConfigError::env_override(key, "expected boolean"))
        };

        match parts.as_slice() {
            ["VALIDATION", "VALIDATE_RESPONSES"] => {
                self.settings.validation.validate_responses = boolean()?;
            }
            ["VALIDATION", "STRICT_REQUEST_VALIDATION"] => {
                self.settings.validation.strict_request_validation =
                    if value.eq_ignore_ascii_case("none") || value.is_empty() {
                        None
                    } else {
                        Some(boolean()?)
                    };
            }
            ["VALIDATION", "STRICT_RESPONSE_VALIDATION"] => {
                self.settings.validation.strict_response_validation = boolean()?;
            }

            ["HTTP", "TREAT_AS_POST"] => {
                self.settings.http.treat_as_post = parse_list(value);
            }
            ["HTTP", "ALLOWED_HTTP_METHODS"] => {
                self.settings.http.allowed_http_methods = parse_list(value);
            }

            ["LOGGING", "ENABLED"] => {
                self.settings.logging.enabled = boolean()?;
            }
            ["LOGGING", "LEVEL"] => {
                self.settings.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.settings.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_override(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "SERVICE_NAME"] => {
                self.settings.logging.service_name = value.to_string();
            }

            _ => {}
        }
        Ok(())
    }
}

// Objects merge recursively, everything else is replaced.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let settings = ConfigLoader::new().load().unwrap();
        assert_eq!(settings, HeronSettings::default());
    }

    #[test]
    fn test_layers_merge_field_by_field() {
        let settings = ConfigLoader::new()
            .with_string("[logging]\nlevel = \"debug\"\n", "toml")
            .unwrap()
            .with_string(r#"{"logging": {"service_name": "users"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.service_name, "users");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = ConfigLoader::new().with_string("[validation]\nstrict = true\n", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigLoader::new().with_string("a: 1", "yaml").unwrap_err();
        assert!(err.to_string().contains("unsupported settings format: yaml"));
    }

    #[test]
    fn test_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[http]\nallowed_http_methods = [\"query\"]").unwrap();
        let settings = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(settings.http.allowed_http_methods, ["query"]);
        assert_eq!(settings.http.treat_as_post, ["PUT", "PATCH", "DELETE"]);
    }

    #[test]
    fn test_with_file_not_found() {
        let err = ConfigLoader::new().with_file("/nonexistent/heron.toml").unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
        assert!(ConfigLoader::new()
            .with_optional_file("/nonexistent/heron.toml")
            .is_ok());
    }

    #[test]
    fn test_invalid_settings_fail_on_load() {
        let result = ConfigLoader::new()
            .with_string(r#"{"logging": {"level": "loud"}}"#, "json")
            .unwrap()
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_apply_env_var_validation() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__VALIDATION__VALIDATE_RESPONSES", "false", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__VALIDATION__STRICT_REQUEST_VALIDATION", "yes", "TEST")
            .unwrap();
        assert!(!loader.settings.validation.validate_responses);
        assert_eq!(loader.settings.validation.strict_request_validation, Some(true));

        loader
            .apply_env_var("TEST__VALIDATION__STRICT_REQUEST_VALIDATION", "none", "TEST")
            .unwrap();
        assert_eq!(loader.settings.validation.strict_request_validation, None);
    }

    #[test]
    fn test_apply_env_var_lists() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__HTTP__TREAT_AS_POST", "PUT, PATCH", "TEST")
            .unwrap();
        assert_eq!(loader.settings.http.treat_as_post, ["PUT", "PATCH"]);
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__LOGGING__ENABLED", "sometimes", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
    }
}
