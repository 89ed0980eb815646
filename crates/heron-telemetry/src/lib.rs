//! Structured logging for Heron services.
//!
//! Heron emits `tracing` events from negotiation, component parsing and
//! response validation. This crate installs a `tracing-subscriber` registry
//! that renders them as JSON lines or pretty text, filtered by `RUST_LOG`
//! or the configured level.
//!
//! # Example
//!
//! ```rust,ignore
//! use heron_config::ConfigLoader;
//! use heron_telemetry::{init_logging, LogConfig};
//!
//! let settings = ConfigLoader::new().with_env_prefix("HERON").load()?;
//! init_logging(&LogConfig::from(&settings.logging))?;
//! ```

#![doc(html_root_url = "https://docs.rs/heron-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::LoggingError;
pub use logging::{create_env_filter, init_logging, LogConfig};
