//! Test error types.

/// Errors that can occur while building requests or reading responses.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Request building failed
    #[error("Request build error: {0}")]
    RequestBuild(String),
    /// Response body is not what was asked for
    #[error("Body read error: {0}")]
    BodyRead(String),
    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Header name or value is invalid
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}
