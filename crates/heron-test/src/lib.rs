//! # Heron Test
//!
//! In-memory testing for Heron controllers. Requests are dispatched
//! straight to a [`Controller`](heron::Controller), without binding a port.
//!
//! ## Key Features
//!
//! - **Request Builder**: JSON, form, multipart, query, cookies and path
//!   parameters
//! - **Full Pipeline**: requests go through negotiation, validation and the
//!   error handler chain
//! - **Response Assertions**: status, headers, JSON fields and error
//!   envelopes
//!
//! ## Example
//!
//! ```rust
//! use heron::prelude::*;
//! use heron_test::TestClient;
//! use http::StatusCode;
//! use serde_json::{json, Value};
//!
//! let user: Schema = Schema::object("User")
//!     .field("email", Schema::string())
//!     .into();
//! let controller = Controller::builder("UserController")
//!     .body(user.clone())
//!     .endpoint("post", ModifyPayload::new(user), |ctx| async move {
//!         Ok::<_, HeronError>(ctx.body::<Value>()?)
//!     })
//!     .build()
//!     .unwrap();
//!
//! let client = TestClient::new(controller);
//! tokio_test::block_on(async {
//!     client
//!         .post("/users")
//!         .json(&json!({"email": "a@b.com"}))
//!         .send()
//!         .await
//!         .assert_status(StatusCode::CREATED);
//!
//!     client
//!         .post("/users")
//!         .json(&json!({}))
//!         .send()
//!         .await
//!         .assert_status(StatusCode::BAD_REQUEST)
//!         .assert_error("Field required", "missing");
//! });
//! ```

#![doc(html_root_url = "https://docs.rs/heron-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{MultipartForm, TestRequest, TestRequestBuilder};
pub use response::TestResponse;
