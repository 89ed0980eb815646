//! Error responses.
//!
//! Errors raised while serving an endpoint go through a chain of
//! [`ErrorHandler`](heron_extract::ErrorHandler)s: the endpoint's own,
//! then the controller's, then [`global_error_handler`]. A handler either
//! recovers with a response or returns the error to pass it on.

use heron_core::{ErrorCategory, HeronError, HeronResult, Request, Response};
use heron_extract::request_renderer;
use http::StatusCode;
use serde_json::Value;

/// Error with an arbitrary response payload.
///
/// Lets handlers answer with any body and status code. The payload is sent
/// as it is, without the `{"detail": [...]}` envelope.
///
/// # Example
///
/// ```rust
/// use heron::ApiError;
/// use heron_core::HeronError;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let err: HeronError = ApiError::new(json!({"code": "taken"}), StatusCode::CONFLICT).into();
/// assert_eq!(err.status_code(), StatusCode::CONFLICT);
/// assert_eq!(err.to_envelope(), json!({"code": "taken"}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    payload: Value,
    status: StatusCode,
}

impl ApiError {
    /// Error answering with `payload` and `status`.
    #[must_use]
    pub fn new(payload: impl Into<Value>, status: StatusCode) -> Self {
        Self {
            payload: payload.into(),
            status,
        }
    }

    /// Response body.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApiError> for HeronError {
    fn from(err: ApiError) -> Self {
        HeronError::api(err.payload, err.status)
    }
}

/// Last handler of every chain.
///
/// Renders the error envelope with the status code of the error, using the
/// renderer negotiated for `request`, or JSON when there is none.
///
/// # Errors
///
/// Fails only when the envelope cannot be rendered.
pub fn global_error_handler(request: &Request, error: HeronError) -> HeronResult<Response> {
    let status = error.status_code();
    match error.category() {
        ErrorCategory::Server | ErrorCategory::Definition => tracing::error!(
            request_id = %request.request_id(),
            status = status.as_u16(),
            error = %error,
            "Request failed"
        ),
        ErrorCategory::Client => tracing::warn!(
            request_id = %request.request_id(),
            status = status.as_u16(),
            error = %error,
            "Request rejected"
        ),
    }

    let body = error.to_envelope();
    match request_renderer(request) {
        Some(renderer) => Response::new(status)
            .with_body(renderer.render(&body)?)
            .try_header("Content-Type", renderer.content_type()),
        None => Response::json(status, &body),
    }
}
