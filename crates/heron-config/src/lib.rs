//! Typed settings for Heron.
//!
//! - TOML and JSON settings files
//! - `.env` files and environment variable overrides
//! - Strict parsing (fails on unknown fields)
//! - Layered loading (defaults → files → env)
//!
//! # Overview
//!
//! [`HeronSettings`] holds every section:
//!
//! - [`ValidationSettings`] - response validation and strictness
//! - [`HttpSettings`] - form parsing methods and custom method names
//! - [`LoggingSettings`] - log level, format and service name
//!
//! # Settings File Format
//!
//! ```toml
//! [validation]
//! validate_responses = true
//! strict_request_validation = false
//! strict_response_validation = true
//!
//! [http]
//! treat_as_post = ["PUT", "PATCH", "DELETE"]
//! allowed_http_methods = ["query"]
//!
//! [logging]
//! level = "info"
//! format = "json"
//! service_name = "users"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values are overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `HERON__VALIDATION__VALIDATE_RESPONSES=false`
//! - `HERON__HTTP__ALLOWED_HTTP_METHODS=query,purge`
//! - `HERON__LOGGING__LEVEL=debug`

#![doc(html_root_url = "https://docs.rs/heron-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HeronSettings;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{HttpSettings, LogFormat, LoggingSettings, ValidationSettings};
