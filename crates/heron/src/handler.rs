//! Endpoint handlers.
//!
//! Handlers are async functions receiving an [`EndpointContext`]. What they
//! return decides how the response is produced:
//!
//! - a raw [`Value`] is validated and rendered by the framework, which
//!   needs a *modify* endpoint;
//! - a native [`Response`] is sent as it is and validated against the
//!   declared responses.

use heron_core::{HeronError, HeronResult, Request, Response};
use heron_extract::ParsedComponents;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for boxed handler result.
pub type BoxedHandlerResult = Pin<Box<dyn Future<Output = HeronResult<HandlerOutput>> + Send>>;

/// A type-erased handler function.
pub type ErasedHandler = Arc<dyn Fn(EndpointContext) -> BoxedHandlerResult + Send + Sync>;

/// Everything a handler gets to see about the current request.
pub struct EndpointContext {
    request: Arc<Request>,
    parsed: ParsedComponents,
    identity: Option<Value>,
}

impl fmt::Debug for EndpointContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointContext")
            .field("request_id", &self.request.request_id())
            .field("parsed", &self.parsed)
            .field("identity", &self.identity)
            .finish()
    }
}

impl EndpointContext {
    pub(crate) fn new(
        request: Arc<Request>,
        parsed: ParsedComponents,
        identity: Option<Value>,
    ) -> Self {
        Self {
            request,
            parsed,
            identity,
        }
    }

    /// The request being served.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Validated components, by context name.
    pub fn parsed(&self) -> &ParsedComponents {
        &self.parsed
    }

    /// Identity returned by the auth provider that accepted the request.
    /// `None` when auth is disabled.
    pub fn identity(&self) -> Option<&Value> {
        self.identity.as_ref()
    }

    /// `parsed_body` as `T`.
    ///
    /// # Errors
    ///
    /// Internal error when the body component is not declared or does not
    /// fit `T`.
    pub fn body<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.parsed.body()
    }

    /// `parsed_query` as `T`.
    ///
    /// # Errors
    ///
    /// See [`EndpointContext::body`].
    pub fn query<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.parsed.query()
    }

    /// `parsed_headers` as `T`.
    ///
    /// # Errors
    ///
    /// See [`EndpointContext::body`].
    pub fn headers<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.parsed.headers()
    }

    /// `parsed_path` as `T`.
    ///
    /// # Errors
    ///
    /// See [`EndpointContext::body`].
    pub fn path<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.parsed.path()
    }

    /// `parsed_cookies` as `T`.
    ///
    /// # Errors
    ///
    /// See [`EndpointContext::body`].
    pub fn cookies<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.parsed.cookies()
    }
}

/// What a handler produced.
#[derive(Debug)]
pub enum HandlerOutput {
    /// Raw data, rendered with the endpoint's modification.
    Raw(Value),
    /// A finished response.
    Native(Response),
}

impl HandlerOutput {
    /// Raw data from any serializable value.
    ///
    /// # Errors
    ///
    /// Internal error when `value` cannot be converted to JSON.
    pub fn raw<T: Serialize>(value: &T) -> HeronResult<Self> {
        serde_json::to_value(value)
            .map(Self::Raw)
            .map_err(|err| HeronError::internal_with_source("Cannot convert returned data", err))
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl From<Response> for HandlerOutput {
    fn from(response: Response) -> Self {
        Self::Native(response)
    }
}

/// Erases the concrete handler type.
pub(crate) fn erase<F, Fut, O>(handler: F) -> ErasedHandler
where
    F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HeronResult<O>> + Send + 'static,
    O: Into<HandlerOutput>,
{
    let handler = Arc::new(handler);
    Arc::new(move |ctx: EndpointContext| {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler(ctx).await.map(Into::into) })
    })
}
