//! Serializer backends.
//!
//! A [`Serializer`] validates unstructured values against models and moves
//! values in and out of wire formats through parsers and renderers.

use crate::parser::Parser;
use crate::renderer::Renderer;
use bytes::Bytes;
use heron_core::{ErrorDetail, HeronResult, Request, Schema};
use serde_json::Value;
use std::fmt;

/// Validation and (de)serialization backend.
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Validates and coerces `unstructured` against `model`.
    ///
    /// `strict` overrides the strictness declared by the model.
    fn from_value(
        &self,
        unstructured: &Value,
        model: &Schema,
        strict: Option<bool>,
    ) -> Result<Value, Vec<ErrorDetail>>;

    /// Converts backend validation errors into the `detail` list.
    fn serialize_validation_error(&self, errors: Vec<ErrorDetail>) -> Vec<ErrorDetail> {
        errors
    }

    /// Encodes `value` with `renderer`.
    ///
    /// # Errors
    ///
    /// Fails when the renderer cannot encode `value`.
    fn serialize(&self, value: &Value, renderer: &dyn Renderer) -> HeronResult<Bytes> {
        renderer.render(value)
    }

    /// Decodes `raw` with `parser`.
    ///
    /// # Errors
    ///
    /// Propagates parser errors.
    fn deserialize(
        &self,
        raw: &Bytes,
        parser: &dyn Parser,
        request: &Request,
        model: &Schema,
    ) -> HeronResult<Value> {
        parser.parse(raw, request, model)
    }
}

/// Backend validating with [`Schema::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn from_value(
        &self,
        unstructured: &Value,
        model: &Schema,
        strict: Option<bool>,
    ) -> Result<Value, Vec<ErrorDetail>> {
        model.validate(unstructured, strict)
    }
}
