//! Logging error types.

use thiserror::Error;

/// Errors that can occur while installing the logging subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level or filter directive cannot be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoggingError::InvalidFilter("heron=loud".to_string());
        assert_eq!(err.to_string(), "Invalid log filter: heron=loud");
        let err = LoggingError::Init("already set".to_string());
        assert_eq!(err.to_string(), "Failed to initialize logging: already set");
    }
}
