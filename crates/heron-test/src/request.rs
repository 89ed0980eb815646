//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use heron_core::Request;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

const MULTIPART_BOUNDARY: &str = "heron-test-boundary";

/// A built test request, ready to be dispatched to a controller.
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Path parameters, as a router would have matched them
    pub path_params: IndexMap<String, String>,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Converts into the request type controllers dispatch.
    pub fn into_request(self) -> Request {
        Request::new(self.method, self.uri, self.headers, self.body)
            .with_path_params(self.path_params)
    }
}

/// A `multipart/form-data` body.
///
/// # Example
///
/// ```rust
/// use heron_test::{MultipartForm, TestRequest};
///
/// let request = TestRequest::post("/receipts")
///     .multipart(
///         MultipartForm::new()
///             .text("title", "Contract")
///             .file("receipt", "r.txt", "text/plain", "hello"),
///     )
///     .build()
///     .unwrap();
/// assert!(request.headers["content-type"]
///     .to_str()
///     .unwrap()
///     .starts_with("multipart/form-data; boundary="));
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain field.
    pub fn text(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{}\r\n",
                value.as_ref()
            )
            .as_bytes(),
        );
        self
    }

    /// Adds an uploaded file.
    pub fn file(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        content: impl AsRef<[u8]>,
    ) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content.as_ref());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Bytes {
        self.body
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        Bytes::from(self.body)
    }
}

/// Builder for constructing test requests.
///
/// Invalid input is remembered and reported by [`build`](Self::build).
#[derive(Debug)]
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Option<Bytes>,
    path_params: IndexMap<String, String>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
            path_params: IndexMap::new(),
            error: None,
        }
    }

    /// Creates a request builder for a method given by name, such as a
    /// custom `PURGE`.
    pub fn with_method(method: &str, uri: impl AsRef<str>) -> Self {
        match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(parsed) => Self::new(parsed, uri),
            Err(err) => {
                let mut builder = Self::new(Method::GET, uri);
                builder.fail(TestError::RequestBuild(format!("Invalid method {method}: {err}")));
                builder
            }
        }
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }

    /// Sets a header on the request, replacing earlier values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use heron_test::TestRequest;
    ///
    /// let request = TestRequest::get("/users")
    ///     .header("Authorization", "Bearer token")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["authorization"], "Bearer token");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => self.fail(TestError::InvalidHeader(err.to_string())),
            (_, Err(err)) => self.fail(TestError::InvalidHeader(err.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Accept header.
    pub fn accept(self, accept: impl AsRef<str>) -> Self {
        self.header(header::ACCEPT.as_str(), accept)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Appends a query string parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Adds a request cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Sets a path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request body as JSON.
    ///
    /// This also sets the `Content-Type` header to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(err) => self.fail(err.into()),
        }
        self.content_type("application/json")
    }

    /// Sets the request body as form-urlencoded.
    ///
    /// `value` must serialize to an object. Array fields repeat their key.
    /// This also sets the `Content-Type` header to
    /// `application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match form_pairs(value) {
            Ok(pairs) => self.body = Some(Bytes::from(encode_pairs(&pairs))),
            Err(err) => self.fail(err),
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(form.finish());
        self.content_type(format!(
            "multipart/form-data; boundary={MULTIPART_BOUNDARY}"
        ))
    }

    /// Builds the test request.
    ///
    /// # Errors
    ///
    /// Returns the first invalid input given to the builder, or an invalid
    /// URI.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut uri = self.uri;
        if !self.query.is_empty() {
            let separator = if uri.contains('?') { '&' } else { '?' };
            uri.push(separator);
            uri.push_str(&encode_pairs(&self.query));
        }
        let uri: Uri = uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        let mut headers = self.headers;
        if !self.cookies.is_empty() {
            let cookies: Vec<String> = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            let value = HeaderValue::try_from(cookies.join("; "))
                .map_err(|e| TestError::InvalidHeader(e.to_string()))?;
            headers.insert(header::COOKIE, value);
        }

        Ok(TestRequest {
            method: self.method,
            uri,
            headers,
            body: self.body.unwrap_or_default(),
            path_params: self.path_params,
        })
    }
}

fn form_pairs<T: Serialize>(value: &T) -> Result<Vec<(String, String)>, TestError> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(TestError::RequestBuild(
            "Expected object for form encoding".to_string(),
        ));
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.into_iter().map(|item| (key.clone(), form_value(item))));
            }
            other => pairs.push((key, form_value(other))),
        }
    }
    Ok(pairs)
}

fn form_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
