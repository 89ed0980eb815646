//! Test client dispatching to a controller in memory.

use crate::error::TestError;
use crate::request::{MultipartForm, TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use bytes::Bytes;
use heron::Controller;
use http::Method;
use serde::Serialize;

/// A test client for one controller.
///
/// Requests go through the complete endpoint pipeline without an HTTP
/// server: negotiation, components, the handler, response validation and
/// the error handler chain.
///
/// # Example
///
/// ```rust
/// use heron::prelude::*;
/// use heron_test::TestClient;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let controller = Controller::builder("PingController")
///     .endpoint("get", ModifyPayload::new(Schema::any()), |_ctx| async {
///         Ok::<_, HeronError>(json!({"pong": true}))
///     })
///     .build()
///     .unwrap();
///
/// let client = TestClient::new(controller);
/// let response = tokio_test::block_on(client.get("/ping").send());
/// response
///     .assert_status(StatusCode::OK)
///     .assert_json_eq(&json!({"pong": true}));
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestClient {
    controller: Controller,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a test client for `controller`.
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            default_headers: Vec::new(),
        }
    }

    /// Adds a default header that will be included in all requests.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The controller under test.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Dispatches a built request.
    pub async fn send_request(&self, request: TestRequest) -> TestResponse {
        self.controller
            .dispatch(request.into_request())
            .await
            .into()
    }
}

/// A request builder bound to a test client.
#[derive(Debug)]
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        Self { client, builder }
    }

    fn map(mut self, f: impl FnOnce(TestRequestBuilder) -> TestRequestBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    /// Sets a header on the request.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|builder| builder.header(name, value))
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.map(|builder| builder.content_type(content_type))
    }

    /// Sets the Accept header.
    pub fn accept(self, accept: impl AsRef<str>) -> Self {
        self.map(|builder| builder.accept(accept))
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.map(|builder| builder.bearer_token(token))
    }

    /// Appends a query string parameter.
    pub fn query(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.map(|builder| builder.query(name, value))
    }

    /// Adds a request cookie.
    pub fn cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.map(|builder| builder.cookie(name, value))
    }

    /// Sets a path parameter.
    pub fn path_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.map(|builder| builder.path_param(name, value))
    }

    /// Sets the raw request body.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.map(|builder| builder.body(body))
    }

    /// Sets the request body as JSON.
    pub fn json<T: Serialize>(self, value: &T) -> Self {
        self.map(|builder| builder.json(value))
    }

    /// Sets the request body as form-urlencoded.
    pub fn form<T: Serialize>(self, value: &T) -> Self {
        self.map(|builder| builder.form(value))
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(self, form: MultipartForm) -> Self {
        self.map(|builder| builder.multipart(form))
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics when the request cannot be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(err) => panic!("Invalid test request: {err}"),
        }
    }

    /// Sends the request and returns a Result.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be built.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.send_request(request).await)
    }
}
