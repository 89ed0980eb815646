//! Response body renderers.

use crate::metadata::{add_new_response, EndpointMetadata};
use crate::parser::{JsonParser, Parser};
use bytes::Bytes;
use heron_core::{HeronError, HeronResult, ResponseSpec};
use http::StatusCode;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Ordered renderers of an endpoint, keyed by content type.
pub type RendererMap = IndexMap<String, Arc<dyn Renderer>>;

/// Encodes response bodies into one content type.
pub trait Renderer: Send + Sync + fmt::Debug {
    /// Content type this renderer produces.
    fn content_type(&self) -> &str;

    /// Encodes `value`.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be represented in this format.
    fn render(&self, value: &Value) -> HeronResult<Bytes>;

    /// Parser able to read back what this renderer produced.
    ///
    /// Used to re-parse response bodies when responses are validated.
    /// `None` when the output cannot be parsed back.
    fn validation_parser(&self) -> Option<Arc<dyn Parser>>;

    /// Responses that can happen while rendering.
    ///
    /// Returns a 406 for unsatisfiable `Accept` headers, and a 422 for
    /// contract violations when responses are validated.
    fn provide_response_specs(
        &self,
        metadata: &EndpointMetadata,
        existing: &IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        let mut specs = Vec::new();
        if metadata.validate_responses {
            specs.extend(add_new_response(
                ResponseSpec::new(metadata.error_model.clone(), StatusCode::UNPROCESSABLE_ENTITY)
                    .description("Raised when returned response does not match the response schema"),
                existing,
            ));
        }
        specs.extend(add_new_response(
            ResponseSpec::new(metadata.error_model.clone(), StatusCode::NOT_ACCEPTABLE)
                .description("Raised when provided `Accept` header cannot be satisfied"),
            existing,
        ));
        specs
    }
}

/// Renders `application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, value: &Value) -> HeronResult<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|err| HeronError::internal_with_source("Failed to render JSON", err))
    }

    fn validation_parser(&self) -> Option<Arc<dyn Parser>> {
        Some(Arc::new(JsonParser))
    }
}
