//! Settings loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required settings file does not exist.
    #[error("settings file {} does not exist", path.display())]
    MissingFile {
        /// Requested path.
        path: PathBuf,
    },

    /// A settings file exists but cannot be read.
    #[error("cannot read settings file {}", path.display())]
    Unreadable {
        /// Requested path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Only `toml` and `json` layers are understood.
    #[error("unsupported settings format: {0}")]
    UnsupportedFormat(String),

    /// Malformed TOML layer.
    #[error("malformed TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON layer, or a layer with unknown fields.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    /// `.env` could not be loaded.
    #[error("cannot load .env: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A `HERON__SECTION__KEY` override has an unusable value.
    #[error("environment override {var}: {reason}")]
    EnvOverride {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// Settings loaded but are inconsistent.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted setting name, such as `logging.level`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn env_override(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Invalid value for the dotted setting `field`.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
