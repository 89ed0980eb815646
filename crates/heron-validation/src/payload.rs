//! Endpoint declaration payloads.
//!
//! A *validate* endpoint returns native [`Response`](heron_core::Response)s
//! and lists every response it can produce. A *modify* endpoint returns raw
//! values; the framework renders them with the declared status code,
//! headers and cookies.

use heron_core::{ResponseCookie, ResponseHeader, ResponseSpec, Schema};
use heron_extract::{AuthProvider, ErrorHandler, HttpSpec, Parser, ParserMap, Renderer, RendererMap};
use http::StatusCode;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Auth configuration of one declaration level.
///
/// Providers of every level are chained, endpoint first. A single
/// `Disabled` level turns auth off for the endpoint.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// Contribute nothing.
    #[default]
    Inherit,
    /// Turn auth off.
    Disabled,
    /// Contribute these providers.
    Providers(Vec<AuthProvider>),
}

impl AuthConfig {
    pub(crate) fn providers(&self) -> &[AuthProvider] {
        match self {
            Self::Providers(providers) => providers,
            Self::Inherit | Self::Disabled => &[],
        }
    }
}

/// Options shared by both payload kinds.
#[derive(Clone, Default)]
pub struct EndpointOptions {
    /// Overrides response validation for this endpoint.
    pub validate_responses: Option<bool>,
    /// Endpoint level error handler.
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    /// Accept a method name that is not a standard HTTP method.
    pub allow_custom_http_methods: bool,
    /// HTTP spec checks to turn off.
    pub no_validate_http_spec: BTreeSet<HttpSpec>,
    /// Parsers replacing the controller ones.
    pub parsers: Option<ParserMap>,
    /// Renderers replacing the controller ones.
    pub renderers: Option<RendererMap>,
    /// Auth of this endpoint.
    pub auth: AuthConfig,
    /// Short summary.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Documentation tags.
    pub tags: Option<Vec<String>>,
    /// Operation id, unique within a controller.
    pub operation_id: Option<String>,
    /// Marks the endpoint deprecated.
    pub deprecated: bool,
}

impl fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("validate_responses", &self.validate_responses)
            .field("error_handler", &self.error_handler.is_some())
            .field("allow_custom_http_methods", &self.allow_custom_http_methods)
            .field("no_validate_http_spec", &self.no_validate_http_spec)
            .field("parsers", &self.parsers.as_ref().map(|p| p.keys().collect::<Vec<_>>()))
            .field("renderers", &self.renderers.as_ref().map(|r| r.keys().collect::<Vec<_>>()))
            .field("auth", &self.auth)
            .field("operation_id", &self.operation_id)
            .finish_non_exhaustive()
    }
}

impl EndpointOptions {
    /// Sets response validation.
    #[must_use]
    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.validate_responses = Some(validate);
        self
    }

    /// Sets the error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Allows a custom method name.
    #[must_use]
    pub fn allow_custom_http_methods(mut self) -> Self {
        self.allow_custom_http_methods = true;
        self
    }

    /// Turns an HTTP spec check off.
    #[must_use]
    pub fn no_validate_http_spec(mut self, check: HttpSpec) -> Self {
        self.no_validate_http_spec.insert(check);
        self
    }

    /// Adds a parser.
    #[must_use]
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        let parser: Arc<dyn Parser> = Arc::new(parser);
        self.parsers
            .get_or_insert_with(ParserMap::new)
            .insert(parser.content_type().to_string(), parser);
        self
    }

    /// Adds a renderer.
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        let renderer: Arc<dyn Renderer> = Arc::new(renderer);
        self.renderers
            .get_or_insert_with(RendererMap::new)
            .insert(renderer.content_type().to_string(), renderer);
        self
    }

    /// Adds an auth provider.
    #[must_use]
    pub fn auth(mut self, provider: AuthProvider) -> Self {
        match &mut self.auth {
            AuthConfig::Providers(providers) => providers.push(provider),
            other => *other = AuthConfig::Providers(vec![provider]),
        }
        self
    }

    /// Turns auth off.
    #[must_use]
    pub fn no_auth(mut self) -> Self {
        self.auth = AuthConfig::Disabled;
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Sets the operation id.
    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Marks the endpoint deprecated.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Payload of an endpoint returning native responses.
#[derive(Debug, Clone, Default)]
pub struct ValidatePayload {
    /// Responses the endpoint can return.
    pub responses: Vec<ResponseSpec>,
    /// Shared options.
    pub options: EndpointOptions,
}

impl ValidatePayload {
    /// Payload with `responses`.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = ResponseSpec>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            options: EndpointOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn options(mut self, options: EndpointOptions) -> Self {
        self.options = options;
        self
    }
}

/// Payload of an endpoint returning raw values.
#[derive(Debug, Clone)]
pub struct ModifyPayload {
    /// Model of the returned value.
    pub return_type: Schema,
    /// Status code, 201 for `POST` and 200 otherwise when `None`.
    pub status_code: Option<StatusCode>,
    /// Headers to add or describe.
    pub headers: Option<IndexMap<String, ResponseHeader>>,
    /// Cookies to set or describe.
    pub cookies: Option<IndexMap<String, ResponseCookie>>,
    /// Other responses the endpoint can produce, usually errors.
    pub responses: Vec<ResponseSpec>,
    /// Shared options.
    pub options: EndpointOptions,
}

impl ModifyPayload {
    /// Payload returning values of `return_type`.
    #[must_use]
    pub fn new(return_type: Schema) -> Self {
        Self {
            return_type,
            status_code: None,
            headers: None,
            cookies: None,
            responses: Vec::new(),
            options: EndpointOptions::default(),
        }
    }

    /// Sets the status code.
    #[must_use]
    pub fn status_code(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, header: impl Into<ResponseHeader>) -> Self {
        self.headers
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), header.into());
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, cookie: impl Into<ResponseCookie>) -> Self {
        self.cookies
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), cookie.into());
        self
    }

    /// Adds another response.
    #[must_use]
    pub fn response(mut self, spec: ResponseSpec) -> Self {
        self.responses.push(spec);
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn options(mut self, options: EndpointOptions) -> Self {
        self.options = options;
        self
    }
}

/// How an endpoint declares its responses.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Native responses, validated against the listed specs.
    Validate(ValidatePayload),
    /// Raw values, turned into responses by the framework.
    Modify(ModifyPayload),
}

impl Payload {
    /// Options of either kind.
    pub fn options(&self) -> &EndpointOptions {
        match self {
            Self::Validate(payload) => &payload.options,
            Self::Modify(payload) => &payload.options,
        }
    }

    /// Responses listed by the payload itself.
    pub fn responses(&self) -> &[ResponseSpec] {
        match self {
            Self::Validate(payload) => &payload.responses,
            Self::Modify(payload) => &payload.responses,
        }
    }
}

impl From<ValidatePayload> for Payload {
    fn from(payload: ValidatePayload) -> Self {
        Self::Validate(payload)
    }
}

impl From<ModifyPayload> for Payload {
    fn from(payload: ModifyPayload) -> Self {
        Self::Modify(payload)
    }
}
