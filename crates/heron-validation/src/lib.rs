//! # Heron Validation
//!
//! Declaration-time and response-time contract checks.
//!
//! ## Endpoint metadata
//!
//! An endpoint is declared with a [`Payload`]:
//!
//! | Payload | Endpoint returns | Responses |
//! |---------|------------------|-----------|
//! | [`ValidatePayload`] | Native [`Response`](heron_core::Response)s | Listed explicitly, at least one |
//! | [`ModifyPayload`] | Raw values | Built from the return type and status code |
//!
//! [`EndpointMetadataBuilder`] merges the payload with the
//! [`ControllerDefaults`], collects the responses that components, parsers,
//! renderers and auth providers can produce, and rejects misdeclarations:
//!
//! - conflicting responses for one status code
//! - `Set-Cookie` described as a header
//! - a body on 1xx, 204 or 304 responses
//! - a `Body` component on methods without a request body
//! - missing parsers or renderers
//! - invalid method names
//!
//! ## Response validation
//!
//! [`ResponseValidator`] re-checks every produced response against the
//! declared [`ResponseSpec`](heron_core::ResponseSpec) of its status code.
//!
//! ## Example
//!
//! ```rust
//! use heron_core::Schema;
//! use heron_extract::{JsonParser, JsonRenderer, Parser, Renderer};
//! use heron_validation::{ControllerDefaults, EndpointMetadataBuilder, ModifyPayload, Payload};
//! use http::StatusCode;
//! use std::sync::Arc;
//!
//! let mut defaults = ControllerDefaults::default();
//! defaults.parsers.insert("application/json".to_string(), Arc::new(JsonParser) as Arc<dyn Parser>);
//! defaults.renderers.insert("application/json".to_string(), Arc::new(JsonRenderer) as Arc<dyn Renderer>);
//!
//! let payload: Payload = ModifyPayload::new(Schema::string()).into();
//! let metadata = EndpointMetadataBuilder::new("Users.post", &payload, &defaults, &[])
//!     .build("post")
//!     .unwrap();
//! assert_eq!(metadata.modification.unwrap().status_code, StatusCode::CREATED);
//! ```

#![doc(html_root_url = "https://docs.rs/heron-validation/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod endpoint;
mod payload;
mod response;

pub use endpoint::{
    infer_status_code, validate_method_name, validate_unique_operation_ids, ControllerDefaults,
    EndpointMetadataBuilder, HTTP_METHODS,
};
pub use payload::{AuthConfig, EndpointOptions, ModifyPayload, Payload, ValidatePayload};
pub use response::{build_headers, ModificationContext, ResponseValidator};
