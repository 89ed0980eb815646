//! Endpoint metadata.
//!
//! [`EndpointMetadata`] is the per-endpoint description built once at
//! startup: declared responses, parsers, renderers, auth and components.
//! It is never mutated after the controller is built.

use crate::auth::AuthProvider;
use crate::component::ComponentParserSpec;
use crate::parser::ParserMap;
use crate::renderer::RendererMap;
use async_trait::async_trait;
use heron_core::{
    Field, HeronError, HeronResult, Request, Response, ResponseModification, ResponseSpec, Schema,
};
use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// HTTP spec checks that an endpoint can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpSpec {
    /// Statuses below 200, 204 and 304 must not have a body.
    EmptyResponseBody,
    /// `GET`, `HEAD`, `DELETE`, `CONNECT` and `TRACE` must not have a body.
    EmptyRequestBody,
}

/// Handles errors raised while serving an endpoint.
///
/// Return `Ok` with a response to recover, or `Err` to pass the error to
/// the next handler in the chain.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Converts `error` into a response or passes it on.
    async fn handle(&self, request: &Request, error: HeronError) -> HeronResult<Response>;
}

#[async_trait]
impl<F> ErrorHandler for F
where
    F: Fn(&Request, HeronError) -> HeronResult<Response> + Send + Sync,
{
    async fn handle(&self, request: &Request, error: HeronError) -> HeronResult<Response> {
        self(request, error)
    }
}

/// Body model of framework error responses: `{"detail": [{msg, loc, type}]}`.
pub fn error_model() -> Schema {
    let loc_item = Schema::union(vec![Schema::string(), Schema::integer()]);
    let detail = Schema::object("ErrorDetail")
        .field("msg", Schema::string())
        .field(
            "loc",
            Field::new(Schema::array(loc_item)).optional(),
        )
        .field("type", Schema::string());
    Schema::object("ErrorModel")
        .field("detail", Schema::array(detail.into()))
        .into()
}

/// Returns `[spec]` unless its status code is already described.
pub fn add_new_response(
    spec: ResponseSpec,
    existing: &IndexMap<StatusCode, ResponseSpec>,
) -> Vec<ResponseSpec> {
    if existing.contains_key(&spec.status_code) {
        Vec::new()
    } else {
        vec![spec]
    }
}

/// Description of one endpoint: one controller and one HTTP method.
#[derive(Clone)]
pub struct EndpointMetadata {
    /// Every response this endpoint can produce, by status code.
    pub responses: IndexMap<StatusCode, ResponseSpec>,
    /// Re-validate produced responses against `responses`.
    pub validate_responses: bool,
    /// Lowercase HTTP method name.
    pub method: String,
    /// How raw return values are turned into responses.
    pub modification: Option<ResponseModification>,
    /// Endpoint level error handler.
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    /// Components declared by the controller.
    pub component_parsers: Vec<ComponentParserSpec>,
    /// Request body parsers, in precedence order.
    pub parsers: ParserMap,
    /// Response body renderers, in precedence order.
    pub renderers: RendererMap,
    /// Auth providers, `None` when auth is disabled.
    pub auth: Option<Vec<AuthProvider>>,
    /// HTTP spec checks turned off for this endpoint.
    pub no_validate_http_spec: BTreeSet<HttpSpec>,
    /// Extra method names accepted for this endpoint.
    pub allowed_http_methods: BTreeSet<String>,
    /// Short summary for documentation.
    pub summary: Option<String>,
    /// Long description for documentation.
    pub description: Option<String>,
    /// Documentation tags.
    pub tags: Option<Vec<String>>,
    /// Unique operation id.
    pub operation_id: Option<String>,
    /// Whether the endpoint is deprecated.
    pub deprecated: bool,
    /// Body model of framework error responses.
    pub error_model: Schema,
}

impl fmt::Debug for EndpointMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMetadata")
            .field("method", &self.method)
            .field("responses", &self.responses.keys().collect::<Vec<_>>())
            .field("validate_responses", &self.validate_responses)
            .field("modification", &self.modification.is_some())
            .field("component_parsers", &self.component_parsers)
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .field("operation_id", &self.operation_id)
            .finish_non_exhaustive()
    }
}

impl EndpointMetadata {
    /// Empty metadata for `method`, with responses validated.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            responses: IndexMap::new(),
            validate_responses: true,
            method: method.into(),
            modification: None,
            error_handler: None,
            component_parsers: Vec::new(),
            parsers: ParserMap::new(),
            renderers: RendererMap::new(),
            auth: None,
            no_validate_http_spec: BTreeSet::new(),
            allowed_http_methods: BTreeSet::new(),
            summary: None,
            description: None,
            tags: None,
            operation_id: None,
            deprecated: false,
            error_model: error_model(),
        }
    }

    /// Responses contributed by components, parsers, renderers and auth.
    ///
    /// Providers run in that order. Each one sees what is already described
    /// and only adds status codes nobody described yet.
    pub fn collect_response_specs(
        &self,
        existing: &mut IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        let mut collected = Vec::new();
        for spec in &self.component_parsers {
            let specs = spec.component.provide_response_specs(self, existing);
            remember(specs, existing, &mut collected);
        }
        for parser in self.parsers.values() {
            let specs = parser.provide_response_specs(self, existing);
            remember(specs, existing, &mut collected);
        }
        for renderer in self.renderers.values() {
            let specs = renderer.provide_response_specs(self, existing);
            remember(specs, existing, &mut collected);
        }
        for auth in self.auth.iter().flatten() {
            let specs = auth.provide_response_specs(self, existing);
            remember(specs, existing, &mut collected);
        }
        collected
    }

    /// Adds every collected response spec to `responses`.
    pub fn with_collected_responses(mut self) -> Self {
        let mut existing = self.responses.clone();
        self.collect_response_specs(&mut existing);
        self.responses = existing;
        self
    }

    /// `true` when this endpoint declares a component with `context_name`.
    pub fn has_component(&self, context_name: &str) -> bool {
        self.component_parsers
            .iter()
            .any(|spec| spec.component.context_name() == context_name)
    }
}

fn remember(
    specs: Vec<ResponseSpec>,
    existing: &mut IndexMap<StatusCode, ResponseSpec>,
    collected: &mut Vec<ResponseSpec>,
) {
    for spec in specs {
        existing.insert(spec.status_code, spec.clone());
        collected.push(spec);
    }
}
