//! Content negotiation.
//!
//! [`RequestNegotiator`] picks the parser for a request by `Content-Type`,
//! [`ResponseNegotiator`] picks the renderer by `Accept`. Both are built
//! once per endpoint and memoize their decision on the request, so
//! negotiating twice within one request returns the same instance.

use crate::parser::{Parser, ParserMap};
use crate::renderer::{Renderer, RendererMap};
use heron_core::media::preferred_type;
use heron_core::{format_list, HeronError, HeronResult, MediaType, Request};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Frequently used content types.
pub mod content_type {
    /// `application/json`.
    pub const JSON: &str = "application/json";
    /// `application/xml`.
    pub const XML: &str = "application/xml";
    /// `application/x-www-form-urlencoded`.
    pub const X_WWW_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
    /// `multipart/form-data`.
    pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
}

#[derive(Clone)]
struct NegotiatedParser(Arc<dyn Parser>);

#[derive(Clone)]
struct NegotiatedRenderer(Arc<dyn Renderer>);

/// Parser chosen for `request`, if negotiation already happened.
pub fn request_parser(request: &Request) -> Option<Arc<dyn Parser>> {
    request.cached::<NegotiatedParser>().map(|negotiated| negotiated.0)
}

/// Renderer chosen for `request`, if negotiation already happened.
pub fn request_renderer(request: &Request) -> Option<Arc<dyn Renderer>> {
    request
        .cached::<NegotiatedRenderer>()
        .map(|negotiated| negotiated.0)
}

/// Forces `renderer` for `request`, unless one was already chosen.
pub fn force_request_renderer(request: &Request, renderer: Arc<dyn Renderer>) -> Arc<dyn Renderer> {
    request.cache(NegotiatedRenderer(renderer)).0
}

/// Selects a parser by the request `Content-Type`.
#[derive(Debug, Clone)]
pub struct RequestNegotiator {
    parsers: ParserMap,
    exact: HashMap<String, Arc<dyn Parser>>,
    by_precedence: Vec<(MediaType, Arc<dyn Parser>)>,
    default: Option<Arc<dyn Parser>>,
}

impl RequestNegotiator {
    /// Precomputes lookup tables for `parsers`.
    ///
    /// Content types without wildcards are matched exactly. Wildcard types
    /// are tried by specificity, then quality, then registration order.
    pub fn new(parsers: &ParserMap) -> Self {
        let exact = parsers
            .iter()
            .filter(|(content_type, _)| !content_type.contains('*'))
            .map(|(content_type, parser)| {
                (MediaType::parse(content_type).essence(), Arc::clone(parser))
            })
            .collect();
        let mut by_precedence: Vec<(MediaType, Arc<dyn Parser>)> = parsers
            .iter()
            .map(|(content_type, parser)| (MediaType::parse(content_type), Arc::clone(parser)))
            .filter(|(media, _)| media.quality() > 0.0)
            .collect();
        by_precedence.sort_by(|(a, _), (b, _)| by_specificity(a, b));
        Self {
            parsers: parsers.clone(),
            exact,
            by_precedence,
            default: parsers.values().next().cloned(),
        }
    }

    /// Returns the parser for `request`.
    ///
    /// # Errors
    ///
    /// [`HeronError::RequestSerialization`] when no parser handles the
    /// request content type.
    pub fn negotiate(&self, request: &Request) -> HeronResult<Arc<dyn Parser>> {
        if let Some(parser) = request_parser(request) {
            return Ok(parser);
        }
        let parser = self.decide(request)?;
        tracing::debug!(
            request_id = %request.request_id(),
            content_type = ?request.content_type(),
            parser = parser.content_type(),
            "Negotiated request parser"
        );
        Ok(request.cache(NegotiatedParser(parser)).0)
    }

    fn decide(&self, request: &Request) -> HeronResult<Arc<dyn Parser>> {
        let Some(content_type) = request.content_type() else {
            return self.default.clone().ok_or_else(|| self.unsupported("<missing>"));
        };
        if let Some(parser) = self.exact.get(&content_type) {
            return Ok(Arc::clone(parser));
        }
        let media = MediaType::parse(&content_type);
        self.by_precedence
            .iter()
            .find(|(pattern, _)| pattern.matches(&media))
            .map(|(_, parser)| Arc::clone(parser))
            .ok_or_else(|| self.unsupported(&content_type))
    }

    fn unsupported(&self, content_type: &str) -> HeronError {
        HeronError::request_serialization(format!(
            "Cannot parse request body with content type '{content_type}', expected={}",
            format_list(self.parsers.keys())
        ))
    }

    /// Registered parsers.
    pub fn parsers(&self) -> &ParserMap {
        &self.parsers
    }
}

fn by_specificity(a: &MediaType, b: &MediaType) -> Ordering {
    b.specificity()
        .cmp(&a.specificity())
        .then_with(|| b.quality().partial_cmp(&a.quality()).unwrap_or(Ordering::Equal))
}

/// Selects a renderer by the request `Accept` header.
#[derive(Debug, Clone)]
pub struct ResponseNegotiator {
    renderers: RendererMap,
    keys: Vec<String>,
    default: Option<Arc<dyn Renderer>>,
}

impl ResponseNegotiator {
    /// Prepares negotiation over `renderers`; the first one is the default.
    pub fn new(renderers: &RendererMap) -> Self {
        Self {
            renderers: renderers.clone(),
            keys: renderers.keys().cloned().collect(),
            default: renderers.values().next().cloned(),
        }
    }

    /// Returns the renderer for `request`.
    ///
    /// # Errors
    ///
    /// [`HeronError::NotAcceptable`] when `Accept` matches no renderer.
    pub fn negotiate(&self, request: &Request) -> HeronResult<Arc<dyn Renderer>> {
        if let Some(renderer) = request_renderer(request) {
            return Ok(renderer);
        }
        let renderer = self.decide(request)?;
        tracing::debug!(
            request_id = %request.request_id(),
            accept = ?request.accept(),
            renderer = renderer.content_type(),
            "Negotiated response renderer"
        );
        Ok(force_request_renderer(request, renderer))
    }

    fn decide(&self, request: &Request) -> HeronResult<Arc<dyn Renderer>> {
        if request.accept().is_none() {
            if let Some(default) = &self.default {
                return Ok(Arc::clone(default));
            }
        }
        let accepted = request.accepted_types();
        preferred_type(&accepted, &self.keys)
            .and_then(|key| self.renderers.get(key))
            .cloned()
            .ok_or_else(|| {
                HeronError::not_acceptable(format!(
                    "Cannot serialize response body with accepted types {}, supported={}",
                    format_list(&accepted),
                    format_list(&self.keys)
                ))
            })
    }

    /// The renderer used when `Accept` is missing.
    pub fn default_renderer(&self) -> Option<&Arc<dyn Renderer>> {
        self.default.as_ref()
    }

    /// Registered renderers.
    pub fn renderers(&self) -> &RendererMap {
        &self.renderers
    }
}

/// Picks the parser that re-reads a produced response body.
///
/// The renderer's own validation parser wins. Without a renderer, the
/// parser registered for the response content type is used, then the
/// default parser.
pub fn response_validation_parser(
    response_content_type: Option<&str>,
    renderer: Option<&Arc<dyn Renderer>>,
    parsers: &ParserMap,
) -> Option<Arc<dyn Parser>> {
    if let Some(parser) = renderer.and_then(|renderer| renderer.validation_parser()) {
        return Some(parser);
    }
    response_content_type
        .and_then(|content_type| parsers.get(&MediaType::parse(content_type).essence()))
        .or_else(|| parsers.values().next())
        .cloned()
}
