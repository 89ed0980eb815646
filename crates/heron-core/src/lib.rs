//! # Heron Core
//!
//! Core types for the Heron REST contract layer.
//!
//! This crate provides the foundational types used throughout Heron:
//!
//! - [`HeronError`] - Error taxonomy and the `{"detail": [...]}` envelope
//! - [`Schema`] - Structural models with validation and coercion
//! - [`ClassGraph`] / [`TypeVarInference`] - Generic declarations and their resolution
//! - [`MediaType`] - Media type parsing and `Accept` precedence
//! - [`Request`] / [`Response`] - HTTP primitives the contract layer works with
//! - [`ResponseSpec`] / [`ResponseModification`] - Response descriptions

#![doc(html_root_url = "https://docs.rs/heron-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cookies;
mod error;
pub mod generics;
pub mod headers;
pub mod media;
mod request;
mod response;
pub mod responses;
pub mod schema;

pub use cookies::{CookieAttrs, CookieSpec, NewCookie, SameSite};
pub use error::{
    format_list, ErrorCategory, ErrorDetail, ErrorEnvelope, ErrorType, HeronError, HeronResult,
    LocItem,
};
pub use generics::{infer_annotation, BaseRef, ClassDecl, ClassGraph, TypeArg, TypeVarInference};
pub use headers::{HeaderSpec, NewHeader, ResponseHeader};
pub use media::MediaType;
pub use request::{convert_multi_value, Request, RequestBuilder};
pub use response::Response;
pub use responses::{ResponseCookie, ResponseModification, ResponseSpec};
pub use schema::{Field, ObjectSchema, Pattern, Schema};
