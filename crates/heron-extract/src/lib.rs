//! # Heron Extract
//!
//! Everything that sits between raw HTTP messages and typed endpoint data.
//!
//! ## Parsers and renderers
//!
//! | Type | Content type | Description |
//! |------|--------------|-------------|
//! | [`JsonParser`] | `application/json` | Empty body is `null` |
//! | [`FormUrlEncodedParser`] | `application/x-www-form-urlencoded` | Last value wins unless forced to a list |
//! | [`MultiPartParser`] | `multipart/form-data` | Text fields and uploaded files |
//! | [`JsonRenderer`] | `application/json` | Also used to re-parse responses |
//!
//! [`RequestNegotiator`] picks a parser from `Content-Type`, and
//! [`ResponseNegotiator`] picks a renderer from `Accept`. Both results are
//! cached on the request.
//!
//! ## Components
//!
//! | Component | Context name | Source |
//! |-----------|--------------|--------|
//! | [`Body`] | `parsed_body` | Negotiated parser |
//! | [`Query`] | `parsed_query` | Query string |
//! | [`Headers`] | `parsed_headers` | Request headers |
//! | [`Path`] | `parsed_path` | Named path parameters |
//! | [`Cookies`] | `parsed_cookies` | `Cookie` header |
//! | [`FileMetadata`] | `parsed_file_metadata` | Uploaded files |
//!
//! [`ComponentParserBuilder`] resolves the components a controller class
//! declares, and [`SerializerContext`] validates all of them with a single
//! [`Serializer`] call.
//!
//! ## Example
//!
//! ```rust
//! use heron_core::Request;
//! use heron_extract::{JsonParser, Parser, ParserMap, RequestNegotiator};
//! use std::sync::Arc;
//!
//! let mut parsers = ParserMap::new();
//! parsers.insert("application/json".to_string(), Arc::new(JsonParser) as Arc<dyn Parser>);
//! let negotiator = RequestNegotiator::new(&parsers);
//!
//! let request = Request::builder()
//!     .method("POST")
//!     .header("Content-Type", "application/json; charset=utf-8")
//!     .body(r#"{"name": "heron"}"#)
//!     .build()
//!     .unwrap();
//! let parser = negotiator.negotiate(&request).unwrap();
//! assert_eq!(parser.content_type(), "application/json");
//! ```

#![doc(html_root_url = "https://docs.rs/heron-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod builder;
mod component;
mod context;
mod metadata;
pub mod negotiation;
pub mod parser;
pub mod renderer;
mod serializer;

pub use auth::{authenticate, AsyncAuth, AuthProvider, SyncAuth};
pub use builder::{ComponentParserBuilder, ComponentRegistry, COMPONENT_PARSER};
pub use component::{
    Body, ComponentContext, ComponentParser, ComponentParserSpec, Cookies, FileMetadata, Headers,
    Path, Query,
};
pub use context::{ParsedComponents, SerializerContext};
pub use metadata::{add_new_response, error_model, EndpointMetadata, ErrorHandler, HttpSpec};
pub use negotiation::{
    content_type, force_request_renderer, request_parser, request_renderer,
    response_validation_parser, RequestNegotiator, ResponseNegotiator,
};
pub use parser::{
    FileParser, FormUrlEncodedParser, JsonParser, MultiPartParser, MultipartLimits, ParsedForm,
    Parser, ParserMap, UploadedFile,
};
pub use renderer::{JsonRenderer, Renderer, RendererMap};
pub use serializer::{JsonSerializer, Serializer};
