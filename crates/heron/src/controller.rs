//! Controllers: one class of components, one endpoint per HTTP method.
//!
//! A controller declares its components as bases of its class, the same way
//! generic classes declare their parents. [`ControllerBuilder::build`]
//! resolves those bases once, builds the combined validation model and the
//! metadata of every endpoint, and fails on any misdeclaration. A built
//! [`Controller`] never changes.
//!
//! # Example
//!
//! ```rust
//! use heron::{Controller, ModifyPayload};
//! use heron_core::{HeronError, Request, Schema};
//! use http::StatusCode;
//! use serde_json::Value;
//!
//! let user: Schema = Schema::object("User")
//!     .field("email", Schema::string())
//!     .field("age", Schema::integer())
//!     .into();
//!
//! let controller = Controller::builder("UserController")
//!     .body(user.clone())
//!     .endpoint("post", ModifyPayload::new(user), |ctx| async move {
//!         Ok::<_, HeronError>(ctx.body::<Value>()?)
//!     })
//!     .build()
//!     .unwrap();
//!
//! let request = Request::builder()
//!     .method("POST")
//!     .header("Content-Type", "application/json")
//!     .body(r#"{"email": "a@b.com", "age": 1}"#)
//!     .build()
//!     .unwrap();
//! let response = tokio_test::block_on(controller.dispatch(request));
//! assert_eq!(response.status(), StatusCode::CREATED);
//! ```

use crate::endpoint::Endpoint;
use crate::handler::{erase, EndpointContext, ErasedHandler, HandlerOutput};
use heron_config::HeronSettings;
use heron_core::{
    format_list, BaseRef, ClassDecl, ClassGraph, ErrorDetail, ErrorEnvelope, ErrorType, HeronError,
    HeaderSpec, HeronResult, Request, Response, ResponseSpec, Schema,
};
use heron_extract::{
    AuthProvider, ComponentParserBuilder, ComponentRegistry, ErrorHandler, FormUrlEncodedParser,
    HttpSpec, JsonParser, JsonRenderer, JsonSerializer, MultiPartParser, Parser, Renderer,
    Serializer, SerializerContext,
};
use heron_validation::{
    validate_unique_operation_ids, AuthConfig, ControllerDefaults, EndpointMetadataBuilder, Payload,
    ValidatePayload,
};
use http::header::ALLOW;
use http::StatusCode;
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Base class of every controller. Its own type parameter is the serializer.
pub const CONTROLLER: &str = "Controller";

/// A built controller.
#[derive(Debug, Clone)]
pub struct Controller {
    name: String,
    endpoints: IndexMap<String, Endpoint>,
}

impl Controller {
    /// Starts declaring a controller named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder::new(name)
    }

    /// Controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint serving the lowercase `method`.
    pub fn endpoint(&self, method: &str) -> Option<&Endpoint> {
        self.endpoints.get(method)
    }

    /// Every endpoint, in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Served methods, uppercase, in registration order.
    pub fn allowed_methods(&self) -> Vec<String> {
        self.endpoints
            .keys()
            .map(|method| method.to_ascii_uppercase())
            .collect()
    }

    /// Routes `request` to the endpoint serving its method.
    ///
    /// Unknown methods get a 405 with an `Allow` header.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method().as_str().to_ascii_lowercase();
        match self.endpoints.get(&method) {
            Some(endpoint) => endpoint.handle(request).await,
            None => self.method_not_allowed(&request),
        }
    }

    fn method_not_allowed(&self, request: &Request) -> Response {
        let allowed = self.allowed_methods();
        let message = format!(
            "Method {} is not allowed, allowed: {}",
            request.method(),
            format_list(&allowed)
        );
        tracing::warn!(
            controller = %self.name,
            request_id = %request.request_id(),
            method = %request.method(),
            "Method not allowed"
        );
        let envelope = ErrorEnvelope {
            detail: serde_json::to_value([ErrorDetail::new(message, ErrorType::NotAllowed.as_str())])
                .unwrap_or_default(),
        };
        Response::json(StatusCode::METHOD_NOT_ALLOWED, &envelope)
            .and_then(|response| response.try_header(ALLOW.as_str(), &allowed.join(", ")))
            .unwrap_or_else(|_| Response::new(StatusCode::METHOD_NOT_ALLOWED))
    }
}

struct EndpointDecl {
    method: String,
    payload: Payload,
    handler: ErasedHandler,
}

fn meta_endpoint(served: &[String]) -> EndpointDecl {
    let mut allowed: Vec<String> = served
        .iter()
        .map(|method| match method.as_str() {
            "meta" => "OPTIONS".to_string(),
            other => other.to_ascii_uppercase(),
        })
        .collect();
    allowed.sort();
    allowed.dedup();
    let allow = allowed.join(", ");
    let options = ResponseSpec::new(Schema::null(), StatusCode::NO_CONTENT)
        .header("Allow", HeaderSpec::new());
    EndpointDecl {
        method: "meta".to_string(),
        payload: ValidatePayload::new([options]).into(),
        handler: erase(move |_ctx: EndpointContext| {
            let allow = allow.clone();
            async move { Response::new(StatusCode::NO_CONTENT).try_header(ALLOW.as_str(), &allow) }
        }),
    }
}

/// Declares a [`Controller`].
pub struct ControllerBuilder {
    name: String,
    registry: ComponentRegistry,
    declarations: Vec<ClassDecl>,
    bases: Vec<BaseRef>,
    serializer: Arc<dyn Serializer>,
    defaults: ControllerDefaults,
    form_parsers: bool,
    treat_as_post: Vec<String>,
    strict_request_validation: Option<bool>,
    strict_response_validation: bool,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    meta: bool,
    endpoints: Vec<EndpointDecl>,
}

impl fmt::Debug for ControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerBuilder")
            .field("name", &self.name)
            .field("bases", &self.bases)
            .field("serializer", &self.serializer.name())
            .field(
                "endpoints",
                &self.endpoints.iter().map(|decl| &decl.method).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ControllerBuilder {
    fn new(name: impl Into<String>) -> Self {
        let settings = HeronSettings::default();
        Self {
            name: name.into(),
            registry: ComponentRegistry::standard(),
            declarations: Vec::new(),
            bases: Vec::new(),
            serializer: Arc::new(JsonSerializer),
            defaults: ControllerDefaults {
                validate_responses: settings.validation.validate_responses,
                ..ControllerDefaults::default()
            },
            form_parsers: false,
            treat_as_post: settings.http.treat_as_post,
            strict_request_validation: settings.validation.strict_request_validation,
            strict_response_validation: settings.validation.strict_response_validation,
            error_handler: None,
            meta: false,
            endpoints: Vec::new(),
        }
    }

    /// Applies validation and HTTP settings.
    #[must_use]
    pub fn settings(mut self, settings: &HeronSettings) -> Self {
        self.defaults.validate_responses = settings.validation.validate_responses;
        self.strict_request_validation = settings.validation.strict_request_validation;
        self.strict_response_validation = settings.validation.strict_response_validation;
        self.treat_as_post = settings.http.treat_as_post.clone();
        self.defaults
            .allowed_http_methods
            .extend(settings.http.allowed_http_methods.iter().cloned());
        self
    }

    /// Declares a helper class, usually a generic base shared by several
    /// controllers.
    #[must_use]
    pub fn declare(mut self, decl: ClassDecl) -> Self {
        self.declarations.push(decl);
        self
    }

    /// Adds a base to the controller class.
    #[must_use]
    pub fn base(mut self, base: BaseRef) -> Self {
        self.bases.push(base);
        self
    }

    /// Declares the `Query` component.
    #[must_use]
    pub fn query(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("Query").arg(model.into()))
    }

    /// Declares the `Body` component.
    #[must_use]
    pub fn body(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("Body").arg(model.into()))
    }

    /// Declares the `Headers` component.
    #[must_use]
    pub fn headers(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("Headers").arg(model.into()))
    }

    /// Declares the `Path` component.
    #[must_use]
    pub fn path(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("Path").arg(model.into()))
    }

    /// Declares the `Cookies` component.
    #[must_use]
    pub fn cookies(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("Cookies").arg(model.into()))
    }

    /// Declares the `FileMetadata` component.
    #[must_use]
    pub fn file_metadata(self, model: impl Into<Schema>) -> Self {
        self.base(BaseRef::new("FileMetadata").arg(model.into()))
    }

    /// Replaces the known components.
    #[must_use]
    pub fn components(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the serializer backend, [`JsonSerializer`] by default.
    #[must_use]
    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// Adds a parser shared by every endpoint. The first one is the
    /// default. JSON is used when none is added.
    #[must_use]
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        let parser: Arc<dyn Parser> = Arc::new(parser);
        self.defaults
            .parsers
            .insert(parser.content_type().to_string(), parser);
        self
    }

    /// Adds the urlencoded and multipart form parsers, after the other
    /// parsers. They parse the methods listed in `treat_as_post`.
    #[must_use]
    pub fn form_parsers(mut self) -> Self {
        self.form_parsers = true;
        self
    }

    /// Adds a renderer shared by every endpoint. The first one is the
    /// default. JSON is used when none is added.
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        let renderer: Arc<dyn Renderer> = Arc::new(renderer);
        self.defaults
            .renderers
            .insert(renderer.content_type().to_string(), renderer);
        self
    }

    /// Adds an auth provider, tried after the endpoint's own providers.
    #[must_use]
    pub fn auth(mut self, provider: AuthProvider) -> Self {
        match &mut self.defaults.auth {
            AuthConfig::Providers(providers) => providers.push(provider),
            other => *other = AuthConfig::Providers(vec![provider]),
        }
        self
    }

    /// Turns auth off for every endpoint.
    #[must_use]
    pub fn no_auth(mut self) -> Self {
        self.defaults.auth = AuthConfig::Disabled;
        self
    }

    /// Adds a response every endpoint can produce.
    #[must_use]
    pub fn response(mut self, spec: ResponseSpec) -> Self {
        self.defaults.responses.push(spec);
        self
    }

    /// Turns response validation on or off, unless an endpoint decides.
    #[must_use]
    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.defaults.validate_responses = validate;
        self
    }

    /// Turns an HTTP spec check off for every endpoint.
    #[must_use]
    pub fn no_validate_http_spec(mut self, check: HttpSpec) -> Self {
        self.defaults.no_validate_http_spec.insert(check);
        self
    }

    /// Accepts a custom lowercase method name.
    #[must_use]
    pub fn allow_http_method(mut self, method: impl Into<String>) -> Self {
        self.defaults.allowed_http_methods.insert(method.into());
        self
    }

    /// Handles errors endpoints do not handle themselves.
    #[must_use]
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Serves `OPTIONS` with a default `meta` endpoint.
    ///
    /// It answers 204 with an `Allow` header listing every served method,
    /// sorted.
    #[must_use]
    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Registers the endpoint serving `method`.
    ///
    /// `meta` serves `OPTIONS`.
    #[must_use]
    pub fn endpoint<F, Fut, O>(
        mut self,
        method: impl Into<String>,
        payload: impl Into<Payload>,
        handler: F,
    ) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HeronResult<O>> + Send + 'static,
        O: Into<HandlerOutput>,
    {
        self.endpoints.push(EndpointDecl {
            method: method.into(),
            payload: payload.into(),
            handler: erase(handler),
        });
        self
    }

    /// Builds the controller.
    ///
    /// # Errors
    ///
    /// Any definition error: unsolvable component models, invalid endpoint
    /// metadata, two endpoints for one method or duplicate operation ids.
    pub fn build(self) -> HeronResult<Controller> {
        let Self {
            name,
            registry,
            declarations,
            bases,
            serializer,
            mut defaults,
            form_parsers,
            treat_as_post,
            strict_request_validation,
            strict_response_validation,
            error_handler,
            meta,
            endpoints: declared,
        } = self;

        let mut graph = ClassGraph::new();
        registry.declare_classes(&mut graph)?;
        graph.declare(ClassDecl::new(CONTROLLER).base(BaseRef::generic(["_SerializerT"])))?;
        for decl in declarations {
            graph.declare(decl)?;
        }
        let blueprint = bases
            .into_iter()
            .fold(ClassDecl::new(name.as_str()), ClassDecl::base)
            .base(BaseRef::new(CONTROLLER).arg(Schema::any()));
        graph.declare(blueprint)?;

        let specs = ComponentParserBuilder::new(&name, CONTROLLER, &graph, &registry).build()?;
        let context = Arc::new(
            SerializerContext::new(&name, specs.clone())
                .strict_validation(strict_request_validation),
        );

        if defaults.parsers.is_empty() {
            defaults
                .parsers
                .insert(JsonParser.content_type().to_string(), Arc::new(JsonParser));
        }
        if form_parsers {
            let urlencoded = FormUrlEncodedParser::new().treat_as_post(&treat_as_post);
            let multipart = MultiPartParser::new().treat_as_post(&treat_as_post);
            defaults
                .parsers
                .insert(urlencoded.content_type().to_string(), Arc::new(urlencoded));
            defaults
                .parsers
                .insert(multipart.content_type().to_string(), Arc::new(multipart));
        }
        if defaults.renderers.is_empty() {
            defaults
                .renderers
                .insert(JsonRenderer.content_type().to_string(), Arc::new(JsonRenderer));
        }

        let mut endpoints: IndexMap<String, Endpoint> = IndexMap::new();
        let mut register = |decl: EndpointDecl| -> HeronResult<()> {
            let endpoint_name = format!("{name}.{}", decl.method);
            let metadata =
                EndpointMetadataBuilder::new(endpoint_name.as_str(), &decl.payload, &defaults, &specs)
                    .build(&decl.method)?;
            if endpoints.contains_key(&metadata.method) {
                return Err(HeronError::endpoint_metadata(format!(
                    "Controller {name} has more than one endpoint for method {}",
                    metadata.method.to_ascii_uppercase()
                )));
            }
            let method = metadata.method.clone();
            let endpoint = Endpoint::new(
                endpoint_name,
                metadata,
                decl.handler,
                Arc::clone(&context),
                Arc::clone(&serializer),
                strict_response_validation,
                error_handler.clone(),
            );
            endpoints.insert(method, endpoint);
            Ok(())
        };
        let mut served = Vec::with_capacity(declared.len() + 1);
        for decl in declared {
            served.push(decl.method.clone());
            register(decl)?;
        }
        if meta {
            served.push("meta".to_string());
            register(meta_endpoint(&served))?;
        }
        validate_unique_operation_ids(&name, endpoints.values().map(Endpoint::metadata))?;

        tracing::info!(
            controller = %name,
            methods = ?endpoints.keys().collect::<Vec<_>>(),
            components = ?specs.iter().map(|spec| spec.component.context_name()).collect::<Vec<_>>(),
            serializer = serializer.name(),
            "Controller built"
        );
        Ok(Controller { name, endpoints })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heron_validation::{ModifyPayload, ValidatePayload};
    use serde_json::{json, Value};

    fn user() -> Schema {
        Schema::object("User")
            .field("email", Schema::string())
            .field("age", Schema::integer())
            .into()
    }

    async fn echo(ctx: EndpointContext) -> HeronResult<Value> {
        ctx.body()
    }

    async fn no_content(_ctx: EndpointContext) -> HeronResult<Response> {
        Ok(Response::new(StatusCode::NO_CONTENT))
    }

    #[test]
    fn test_defaults_to_json() {
        let controller = Controller::builder("UserController")
            .body(user())
            .endpoint("post", ModifyPayload::new(user()), echo)
            .build()
            .unwrap();
        let metadata = controller.endpoint("post").unwrap().metadata();
        assert_eq!(metadata.parsers.keys().collect::<Vec<_>>(), ["application/json"]);
        assert_eq!(metadata.renderers.keys().collect::<Vec<_>>(), ["application/json"]);
        assert!(metadata.validate_responses);
    }

    #[test]
    fn test_form_parsers_follow_json() {
        let controller = Controller::builder("FormController")
            .body(user())
            .form_parsers()
            .endpoint("post", ModifyPayload::new(user()), echo)
            .build()
            .unwrap();
        let metadata = controller.endpoint("post").unwrap().metadata();
        assert_eq!(
            metadata.parsers.keys().collect::<Vec<_>>(),
            [
                "application/json",
                "application/x-www-form-urlencoded",
                "multipart/form-data"
            ]
        );
    }

    #[test]
    fn test_duplicate_method_is_rejected() {
        let payload = ValidatePayload::new([ResponseSpec::new(Schema::null(), StatusCode::NO_CONTENT)]);
        let err = Controller::builder("UserController")
            .endpoint("options", payload.clone(), no_content)
            .endpoint("meta", payload, no_content)
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Controller UserController has more than one endpoint for method OPTIONS"
        );
    }

    #[test]
    fn test_unsolvable_component_fails_build() {
        let err = Controller::builder("Broken")
            .base(BaseRef::new("Query"))
            .endpoint("get", ModifyPayload::new(Schema::any()), echo)
            .build()
            .unwrap_err();
        assert!(matches!(err, HeronError::UnsolvableAnnotations { .. }));
    }

    #[test]
    fn test_generic_base_controller() {
        let controller = Controller::builder("UserController")
            .declare(
                ClassDecl::new("CreateController")
                    .base(BaseRef::new("Body").param("M"))
                    .base(BaseRef::generic(["M"])),
            )
            .base(BaseRef::new("CreateController").arg(user()))
            .endpoint("post", ModifyPayload::new(user()), echo)
            .build()
            .unwrap();
        let specs = &controller.endpoint("post").unwrap().metadata().component_parsers;
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].model(), &user());
    }

    #[test]
    fn test_custom_method_from_settings() {
        let mut settings = HeronSettings::default();
        settings.http.allowed_http_methods.push("query".to_string());
        settings.validation.validate_responses = false;

        let controller = Controller::builder("SearchController")
            .settings(&settings)
            .endpoint("query", ModifyPayload::new(Schema::any()), |_ctx| async {
                Ok::<_, HeronError>(json!([]))
            })
            .build()
            .unwrap();
        let metadata = controller.endpoint("query").unwrap().metadata();
        assert!(!metadata.validate_responses);
        assert_eq!(controller.allowed_methods(), ["QUERY"]);
    }

    #[tokio::test]
    async fn test_unknown_method_is_405() {
        let controller = Controller::builder("UserController")
            .body(user())
            .endpoint("post", ModifyPayload::new(user()), echo)
            .build()
            .unwrap();
        let request = Request::builder().method("PUT").build().unwrap();
        let response = controller.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(
            body,
            json!({"detail": [{"msg": "Method PUT is not allowed, allowed: ['POST']", "type": "not_allowed"}]})
        );
    }
}
