//! Error types for Heron.
//!
//! This module provides the [`HeronError`] type, which is the standard error
//! type used throughout the Heron crates.
//!
//! Errors fall into three categories (see [`ErrorCategory`]):
//!
//! | Category | When | Examples |
//! |---|---|---|
//! | `Definition` | building endpoints at startup | unsolvable generics, bad metadata |
//! | `Client` | serving a request | unsupported content type, invalid payload |
//! | `Server` | checking our own response | undeclared status code, extra header |
//!
//! Client and server errors are rendered as `{"detail": [...]}` bodies,
//! see [`HeronError::to_envelope`].

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias using [`HeronError`].
pub type HeronResult<T> = Result<T, HeronError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Raised while endpoints are being declared; the process must not start.
    Definition,
    /// Bad client input: negotiation and request validation failures.
    Client,
    /// The endpoint violated its own declared contract.
    Server,
}

/// Machine-readable error kinds used in the `type` field of [`ErrorDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Generic value error.
    ValueError,
    /// Something was not found.
    NotFound,
    /// Authentication or authorization failure.
    Security,
    /// Method or operation is not allowed.
    NotAllowed,
    /// Message provided by user code.
    UserMsg,
}

impl ErrorType {
    /// Returns the wire representation of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValueError => "value_error",
            Self::NotFound => "not_found",
            Self::Security => "security",
            Self::NotAllowed => "not_allowed",
            Self::UserMsg => "user_msg",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of an error location: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocItem {
    /// Object key.
    Key(String),
    /// List index.
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for LocItem {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for LocItem {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// A single entry of the `detail` list in error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    pub msg: String,
    /// Location of the offending value, anchored at the component name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<LocItem>>,
    /// Machine-readable error kind.
    #[serde(rename = "type")]
    pub kind: String,
}

impl ErrorDetail {
    /// Creates a detail without a location.
    #[must_use]
    pub fn new(msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            loc: None,
            kind: kind.into(),
        }
    }

    /// Sets the location of this detail.
    #[must_use]
    pub fn at(mut self, loc: Vec<LocItem>) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Prepends a segment to the location.
    #[must_use]
    pub fn prefixed(mut self, segment: impl Into<LocItem>) -> Self {
        let mut loc = vec![segment.into()];
        loc.extend(self.loc.take().unwrap_or_default());
        self.loc = Some(loc);
        self
    }
}

/// Body of an error response: `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Either a list of [`ErrorDetail`] or a custom payload.
    pub detail: Value,
}

/// Standard error type for Heron.
///
/// # Example
///
/// ```
/// use heron_core::HeronError;
/// use http::StatusCode;
///
/// let err = HeronError::request_serialization("Cannot parse request body");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Error, Debug)]
pub enum HeronError {
    /// Generic parameters could not be resolved to concrete schemas.
    #[error("{message}")]
    UnsolvableAnnotations {
        /// Human-readable error message.
        message: String,
    },

    /// Endpoint metadata is declared incorrectly.
    #[error("{message}")]
    EndpointMetadata {
        /// Human-readable error message.
        message: String,
    },

    /// Raw bytes could not be decoded by a parser.
    #[error("{message}")]
    DataParsing {
        /// Human-readable error message.
        message: String,
    },

    /// Some part of the request could not be parsed.
    #[error("{message}")]
    RequestSerialization {
        /// Human-readable error message.
        message: String,
    },

    /// The produced response does not match its declared schema.
    #[error("{message}")]
    ResponseSchema {
        /// Human-readable error message.
        message: String,
        /// Body validation errors, empty for header and cookie mismatches.
        detail: Vec<ErrorDetail>,
    },

    /// The `Accept` header cannot be satisfied.
    #[error("{message}")]
    NotAcceptable {
        /// Human-readable error message.
        message: String,
    },

    /// No auth provider accepted the request.
    #[error("{message}")]
    NotAuthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// Structured validation failure.
    #[error("Validation failed with {} error(s)", detail.len())]
    Validation {
        /// Every error found, with locations.
        detail: Vec<ErrorDetail>,
        /// Status code used for the error response.
        status: StatusCode,
    },

    /// Error raised by user code with an arbitrary payload.
    #[error("API error with status {status}")]
    Api {
        /// Response body.
        payload: Value,
        /// Response status code.
        status: StatusCode,
    },

    /// Internal server error.
    #[error("{message}")]
    InternalServer {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl HeronError {
    /// Creates an unsolvable annotations error.
    #[must_use]
    pub fn unsolvable_annotations(message: impl Into<String>) -> Self {
        Self::UnsolvableAnnotations {
            message: message.into(),
        }
    }

    /// Creates an endpoint metadata error.
    #[must_use]
    pub fn endpoint_metadata(message: impl Into<String>) -> Self {
        Self::EndpointMetadata {
            message: message.into(),
        }
    }

    /// Creates a data parsing error.
    #[must_use]
    pub fn data_parsing(message: impl Into<String>) -> Self {
        Self::DataParsing {
            message: message.into(),
        }
    }

    /// Creates a request serialization error.
    #[must_use]
    pub fn request_serialization(message: impl Into<String>) -> Self {
        Self::RequestSerialization {
            message: message.into(),
        }
    }

    /// Creates a response schema error.
    #[must_use]
    pub fn response_schema(message: impl Into<String>) -> Self {
        Self::ResponseSchema {
            message: message.into(),
            detail: Vec::new(),
        }
    }

    /// Creates a response schema error from body validation errors.
    #[must_use]
    pub fn response_body_schema(detail: Vec<ErrorDetail>) -> Self {
        Self::ResponseSchema {
            message: format!("Response body failed validation with {} error(s)", detail.len()),
            detail,
        }
    }

    /// Creates a not acceptable error.
    #[must_use]
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::NotAcceptable {
            message: message.into(),
        }
    }

    /// Creates a not authenticated error.
    #[must_use]
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::NotAuthenticated {
            message: message.into(),
        }
    }

    /// Creates a structured validation error.
    #[must_use]
    pub fn validation(detail: Vec<ErrorDetail>, status: StatusCode) -> Self {
        Self::Validation { detail, status }
    }

    /// Creates an error with a custom payload.
    #[must_use]
    pub fn api(payload: Value, status: StatusCode) -> Self {
        Self::Api { payload, status }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalServer {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::InternalServer {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsolvableAnnotations { .. } | Self::EndpointMetadata { .. } => {
                ErrorCategory::Definition
            }
            Self::DataParsing { .. }
            | Self::RequestSerialization { .. }
            | Self::NotAcceptable { .. }
            | Self::NotAuthenticated { .. }
            | Self::Validation { .. }
            | Self::Api { .. } => ErrorCategory::Client,
            Self::ResponseSchema { .. } | Self::InternalServer { .. } => ErrorCategory::Server,
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// Response schema violations use `422`, the same status as other
    /// serialization failures that are not caused by the request itself.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::DataParsing { .. } | Self::RequestSerialization { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ResponseSchema { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::NotAuthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Validation { status, .. } | Self::Api { status, .. } => *status,
            Self::UnsolvableAnnotations { .. }
            | Self::EndpointMetadata { .. }
            | Self::InternalServer { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable kind used for message-only errors.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Self::NotAuthenticated { .. } => ErrorType::Security,
            _ => ErrorType::ValueError,
        }
    }

    /// Returns the `detail` list for this error.
    #[must_use]
    pub fn details(&self) -> Vec<ErrorDetail> {
        match self {
            Self::Validation { detail, .. } => detail.clone(),
            Self::ResponseSchema { detail, .. } if !detail.is_empty() => detail.clone(),
            Self::InternalServer { .. } => vec![ErrorDetail::new(
                "Internal server error",
                self.error_type().as_str(),
            )],
            _ => vec![ErrorDetail::new(self.to_string(), self.error_type().as_str())],
        }
    }

    /// Converts this error to the response body.
    ///
    /// [`HeronError::Api`] payloads are returned unchanged.
    #[must_use]
    pub fn to_envelope(&self) -> Value {
        match self {
            Self::Api { payload, .. } => payload.clone(),
            _ => serde_json::to_value(ErrorEnvelope {
                detail: serde_json::to_value(self.details()).unwrap_or(Value::Null),
            })
            .unwrap_or(Value::Null),
        }
    }
}

/// Formats a list the way error messages show them: `['a', 'b']`.
pub fn format_list<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let inner: Vec<String> = items.into_iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_envelope() {
        let err = HeronError::request_serialization(
            "Cannot parse request body with content type 'application/xml', expected=['application/json']",
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.category(), ErrorCategory::Client);
        assert_eq!(
            err.to_envelope(),
            json!({
                "detail": [{
                    "msg": "Cannot parse request body with content type 'application/xml', expected=['application/json']",
                    "type": "value_error",
                }],
            })
        );
    }

    #[test]
    fn test_validation_error_keeps_locations() {
        let err = HeronError::validation(
            vec![ErrorDetail::new("Field required", "missing")
                .at(vec!["email".into()])
                .prefixed("parsed_body")],
            StatusCode::BAD_REQUEST,
        );
        assert_eq!(
            err.to_envelope(),
            json!({
                "detail": [{
                    "msg": "Field required",
                    "loc": ["parsed_body", "email"],
                    "type": "missing",
                }],
            })
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            HeronError::response_schema("x").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            HeronError::not_acceptable("x").status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            HeronError::not_authenticated("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            HeronError::endpoint_metadata("x").category(),
            ErrorCategory::Definition
        );
    }

    #[test]
    fn test_not_authenticated_uses_security_type() {
        let details = HeronError::not_authenticated("Not authenticated").details();
        assert_eq!(details[0].kind, "security");
    }

    #[test]
    fn test_api_error_payload_is_untouched() {
        let err = HeronError::api(json!({"errors": ["nope"]}), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.to_envelope(), json!({"errors": ["nope"]}));
    }

    #[test]
    fn test_response_schema_details() {
        let err = HeronError::response_schema("Response has extra undescribed ['x-debug'] headers");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.details()[0].msg, "Response has extra undescribed ['x-debug'] headers");

        let detail = vec![ErrorDetail::new("Input should be a valid integer", "int_type")];
        let err = HeronError::response_body_schema(detail.clone());
        assert_eq!(err.details(), detail);
        assert_eq!(err.category(), ErrorCategory::Server);
    }

    #[test]
    fn test_internal_error_hides_message() {
        let err = HeronError::internal_with_source("db exploded", anyhow::anyhow!("boom"));
        assert_eq!(err.details()[0].msg, "Internal server error");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(["a", "b"]), "['a', 'b']");
        assert_eq!(format_list(Vec::<String>::new()), "[]");
    }
}
