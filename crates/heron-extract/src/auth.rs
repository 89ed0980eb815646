//! Auth provider interfaces.
//!
//! Providers are tried in order. The first one returning an identity wins;
//! a provider returning `Ok(None)` lets the next one try, and an `Err` fails
//! the request at once.

use crate::metadata::{add_new_response, EndpointMetadata};
use async_trait::async_trait;
use heron_core::{HeronError, HeronResult, Request, ResponseSpec};
use http::StatusCode;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Synchronous auth provider.
pub trait SyncAuth: Send + Sync + fmt::Debug {
    /// Returns the identity of the caller, or `None` to decline.
    fn authenticate(&self, request: &Request) -> HeronResult<Option<Value>>;
}

/// Asynchronous auth provider.
#[async_trait]
pub trait AsyncAuth: Send + Sync + fmt::Debug {
    /// Returns the identity of the caller, or `None` to decline.
    async fn authenticate(&self, request: &Request) -> HeronResult<Option<Value>>;
}

/// Either kind of auth provider.
#[derive(Debug, Clone)]
pub enum AuthProvider {
    /// Runs inline.
    Sync(Arc<dyn SyncAuth>),
    /// Awaited.
    Async(Arc<dyn AsyncAuth>),
}

impl AuthProvider {
    /// Wraps a sync provider.
    pub fn sync(auth: impl SyncAuth + 'static) -> Self {
        Self::Sync(Arc::new(auth))
    }

    /// Wraps an async provider.
    pub fn async_auth(auth: impl AsyncAuth + 'static) -> Self {
        Self::Async(Arc::new(auth))
    }

    /// Runs this provider.
    pub async fn authenticate(&self, request: &Request) -> HeronResult<Option<Value>> {
        match self {
            Self::Sync(auth) => auth.authenticate(request),
            Self::Async(auth) => auth.authenticate(request).await,
        }
    }

    /// Every provider can reject the caller with a 401.
    pub fn provide_response_specs(
        &self,
        metadata: &EndpointMetadata,
        existing: &IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        add_new_response(
            ResponseSpec::new(metadata.error_model.clone(), StatusCode::UNAUTHORIZED)
                .description("Raised when auth was not successful"),
            existing,
        )
    }
}

/// Runs `providers` in order and returns the first identity.
///
/// # Errors
///
/// [`HeronError::NotAuthenticated`] when every provider declines, or the
/// first error a provider returns.
pub async fn authenticate(providers: &[AuthProvider], request: &Request) -> HeronResult<Value> {
    for provider in providers {
        if let Some(identity) = provider.authenticate(request).await? {
            return Ok(identity);
        }
    }
    tracing::warn!(
        request_id = %request.request_id(),
        providers = providers.len(),
        "Every auth provider declined the request"
    );
    Err(HeronError::not_authenticated("Not authenticated"))
}
