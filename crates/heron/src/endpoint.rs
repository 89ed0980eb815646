//! One endpoint: a controller serving one HTTP method.
//!
//! Request pipeline, in order:
//!
//! ```text
//! auth → parser negotiation + components → combined validation → handler
//!                                                                   ↓
//! response ← response validation ← serialisation ← renderer negotiation
//! ```
//!
//! Any error leaves the pipeline and goes through the error handler chain.

use crate::errors::global_error_handler;
use crate::handler::{EndpointContext, ErasedHandler, HandlerOutput};
use heron_core::{HeronError, HeronResult, Request, Response};
use heron_extract::{
    authenticate, force_request_renderer, EndpointMetadata, ErrorHandler, RequestNegotiator,
    ResponseNegotiator, Serializer, SerializerContext,
};
use heron_validation::ResponseValidator;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// A built endpoint, ready to serve requests.
///
/// Everything here is immutable once the controller is built, so one
/// endpoint serves any number of concurrent requests.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    metadata: Arc<EndpointMetadata>,
    handler: ErasedHandler,
    context: Arc<SerializerContext>,
    serializer: Arc<dyn Serializer>,
    request_negotiator: RequestNegotiator,
    response_negotiator: ResponseNegotiator,
    validator: ResponseValidator,
    controller_error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("serializer", &self.serializer.name())
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    pub(crate) fn new(
        name: String,
        metadata: EndpointMetadata,
        handler: ErasedHandler,
        context: Arc<SerializerContext>,
        serializer: Arc<dyn Serializer>,
        strict_response_validation: bool,
        controller_error_handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Self {
        let metadata = Arc::new(metadata);
        Self {
            request_negotiator: RequestNegotiator::new(&metadata.parsers),
            response_negotiator: ResponseNegotiator::new(&metadata.renderers),
            validator: ResponseValidator::new(Arc::clone(&metadata), Arc::clone(&serializer))
                .strict_validation(strict_response_validation),
            name,
            metadata,
            handler,
            context,
            serializer,
            controller_error_handler,
        }
    }

    /// `Controller.method`, used in logs and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint contract.
    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }

    /// Serves `request`.
    ///
    /// Never fails: errors are turned into responses by the error handler
    /// chain.
    pub async fn handle(&self, request: Request) -> Response {
        let request = Arc::new(request);
        match self.run(&request).await {
            Ok(response) => response,
            Err(error) => self.handle_error(&request, error).await,
        }
    }

    async fn run(&self, request: &Arc<Request>) -> HeronResult<Response> {
        let identity = match &self.metadata.auth {
            Some(providers) => Some(authenticate(providers, request).await?),
            None => None,
        };
        let parsed = self
            .context
            .parse(request, &self.request_negotiator, self.serializer.as_ref())?;

        let ctx = EndpointContext::new(Arc::clone(request), parsed, identity);
        let output = (self.handler)(ctx).await?;

        self.response_negotiator.negotiate(request)?;
        match output {
            HandlerOutput::Raw(raw_data) => self
                .validator
                .validate_modification(request, raw_data)?
                .into_response(self.serializer.as_ref()),
            HandlerOutput::Native(response) => self.validator.validate_response(request, response),
        }
    }

    async fn handle_error(&self, request: &Request, error: HeronError) -> Response {
        // Error bodies still honour `Accept` when possible.
        if self.response_negotiator.negotiate(request).is_err() {
            if let Some(default) = self.response_negotiator.default_renderer() {
                force_request_renderer(request, Arc::clone(default));
            }
        }

        let mut error = error;
        let chain = [
            self.metadata.error_handler.as_ref(),
            self.controller_error_handler.as_ref(),
        ];
        for handler in chain.into_iter().flatten() {
            match handler.handle(request, error).await {
                Ok(response) => return response,
                Err(unhandled) => error = unhandled,
            }
        }

        global_error_handler(request, error).unwrap_or_else(|err| {
            tracing::error!(
                endpoint = %self.name,
                request_id = %request.request_id(),
                error = %err,
                "Cannot render error response"
            );
            Response::new(StatusCode::INTERNAL_SERVER_ERROR)
        })
    }
}
