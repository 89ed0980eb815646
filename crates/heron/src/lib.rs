//! # Heron
//!
//! **Typed REST contracts for Rust services.**
//!
//! Heron sits between an HTTP layer and endpoint handlers:
//!
//! - **Components** – body, query, headers, path, cookies and uploaded files
//!   are declared once per controller and validated with one call
//! - **Content negotiation** – parsers by `Content-Type`, renderers by
//!   `Accept`, with quality and specificity rules
//! - **Response contracts** – every status code an endpoint returns is
//!   declared, and produced responses are checked against it
//! - **Structured errors** – every failure answers with
//!   `{"detail": [{"msg", "loc", "type"}]}`
//!
//! ## Quick Start
//!
//! ```rust
//! use heron::prelude::*;
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
//!     .build()?;
//! # Ok::<(), HeronError>(())
//! ```
//!
//! ## Pipeline
//!
//! Every request goes through the same fixed steps:
//!
//! ```text
//! Request → Auth → Parser negotiation → Components → Combined validation → Handler
//!                                                                             ↓
//! Response ← Response validation ← Serialization ← Renderer negotiation ←─────┘
//! ```

#![doc(html_root_url = "https://docs.rs/heron/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod controller;
mod endpoint;
mod errors;
mod handler;

pub use controller::{Controller, ControllerBuilder, CONTROLLER};
pub use endpoint::Endpoint;
pub use errors::{global_error_handler, ApiError};
pub use handler::{BoxedHandlerResult, EndpointContext, ErasedHandler, HandlerOutput};
pub use heron_validation::{
    AuthConfig, EndpointOptions, ModifyPayload, Payload, ValidatePayload,
};

// Re-export the building blocks
pub use heron_config as config;
pub use heron_core as core;
pub use heron_extract as extract;
pub use heron_telemetry as telemetry;
pub use heron_validation as validation;

/// Installs logging as configured in `settings`.
///
/// # Errors
///
/// Fails on an invalid log filter or when a global subscriber is already
/// installed.
pub fn init(settings: &heron_config::HeronSettings) -> Result<(), heron_telemetry::LoggingError> {
    heron_telemetry::init_logging(&heron_telemetry::LogConfig::from(&settings.logging))
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use heron::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ApiError, Controller, EndpointContext, EndpointOptions, HandlerOutput, ModifyPayload,
        ValidatePayload,
    };

    pub use heron_core::{
        BaseRef, ClassDecl, CookieSpec, HeaderSpec, HeronError, HeronResult, NewCookie, NewHeader,
        Request, Response, ResponseSpec, Schema,
    };

    pub use heron_extract::{
        AuthProvider, FormUrlEncodedParser, HttpSpec, JsonParser, JsonRenderer, MultiPartParser,
    };

    pub use heron_config::{ConfigLoader, HeronSettings};
}
