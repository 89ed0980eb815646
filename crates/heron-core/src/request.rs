//! Incoming request primitives.
//!
//! [`Request`] is the immutable view of an HTTP request the contract layer
//! works with. Per-request negotiation results are memoized on the request
//! itself with [`Request::cache`], which stores each type at most once.

use crate::error::{HeronError, HeronResult};
use crate::media::{parse_accept, MediaType};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::{BodyExt, Full};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

/// An incoming HTTP request.
///
/// # Example
///
/// ```rust
/// use heron_core::Request;
///
/// let request = Request::builder()
///     .method("POST")
///     .uri("/users?page=2")
///     .header("Content-Type", "application/json; charset=utf-8")
///     .body(r#"{"email": "a@b.com"}"#)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.content_type().as_deref(), Some("application/json"));
/// assert_eq!(request.query_pairs().unwrap(), vec![("page".to_string(), "2".to_string())]);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path_params: IndexMap<String, String>,
    path_args: Vec<String>,
    request_id: Uuid,
    cache: Mutex<Extensions>,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            path_params: IndexMap::new(),
            path_args: Vec::new(),
            request_id: Uuid::now_v7(),
            cache: Mutex::new(Extensions::new()),
        }
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Converts an `http` request, collecting its body.
    ///
    /// ```
    /// use bytes::Bytes;
    /// use heron_core::Request;
    /// use http_body_util::Full;
    ///
    /// let request = http::Request::builder()
    ///     .method("POST")
    ///     .header("Content-Type", "application/json")
    ///     .body(Full::new(Bytes::from_static(b"{}")))
    ///     .unwrap();
    /// let request = tokio_test::block_on(Request::from_http(request));
    /// assert_eq!(request.content_type().as_deref(), Some("application/json"));
    /// ```
    pub async fn from_http(request: http::Request<Full<Bytes>>) -> Self {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    /// Sets named path parameters, as captured by the router.
    #[must_use]
    pub fn with_path_params(mut self, params: IndexMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// Sets unnamed path arguments, as captured by the router.
    #[must_use]
    pub fn with_path_args(mut self, args: Vec<String>) -> Self {
        self.path_args = args;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path portion of the URI.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Named path parameters.
    pub fn path_params(&self) -> &IndexMap<String, String> {
        &self.path_params
    }

    /// Unnamed path arguments.
    pub fn path_args(&self) -> &[String] {
        &self.path_args
    }

    /// Unique id of this request.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Media type of the body without parameters, lowercased.
    ///
    /// A blank header counts as missing.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| MediaType::parse(raw).essence())
    }

    /// Raw `Accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.headers.get(ACCEPT).and_then(|v| v.to_str().ok())
    }

    /// Accepted media types, most preferred first.
    ///
    /// Every `Accept` header line is taken into account.
    pub fn accepted_types(&self) -> Vec<MediaType> {
        let joined: Vec<&str> = self
            .headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        parse_accept(&joined.join(","))
    }

    /// Query string as ordered key-value pairs.
    ///
    /// # Errors
    ///
    /// Fails when the query string is not valid `urlencoded` data.
    pub fn query_pairs(&self) -> HeronResult<Vec<(String, String)>> {
        let Some(query) = self.uri.query() else {
            return Ok(Vec::new());
        };
        serde_urlencoded::from_str(query).map_err(|err| {
            HeronError::request_serialization(format!("Cannot parse query string: {err}"))
        })
    }

    /// Query string with every value of each key, keys in first-seen order.
    ///
    /// # Errors
    ///
    /// Fails when the query string is not valid `urlencoded` data.
    pub fn query(&self) -> HeronResult<IndexMap<String, Vec<String>>> {
        let mut query: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in self.query_pairs()? {
            query.entry(key).or_default().push(value);
        }
        Ok(query)
    }

    /// Cookies sent with the request.
    pub fn cookies(&self) -> IndexMap<String, String> {
        let mut cookies = IndexMap::new();
        for header in self.headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for pair in header.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                cookies.insert(name.to_string(), value.to_string());
            }
        }
        cookies
    }

    /// Returns the cached value of type `T`, if any.
    pub fn cached<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.cache.lock().get::<T>().cloned()
    }

    /// Stores `value` unless a value of type `T` is already cached.
    ///
    /// Returns the value that ends up in the cache, so concurrent callers
    /// always observe the first write.
    pub fn cache<T: Clone + Send + Sync + 'static>(&self, value: T) -> T {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get::<T>() {
            return existing.clone();
        }
        cache.insert(value.clone());
        value
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    uri: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    path_params: IndexMap<String, String>,
    path_args: Vec<String>,
}

impl RequestBuilder {
    /// Sets the method, `GET` by default.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the URI, `/` by default.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a named path parameter.
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds an unnamed path argument.
    #[must_use]
    pub fn path_arg(mut self, value: impl Into<String>) -> Self {
        self.path_args.push(value.into());
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Fails on an invalid method, URI or header.
    pub fn build(self) -> HeronResult<Request> {
        let method = match self.method {
            Some(method) => Method::from_bytes(method.as_bytes())
                .map_err(|err| HeronError::internal_with_source("Invalid method", err))?,
            None => Method::GET,
        };
        let uri: Uri = self
            .uri
            .as_deref()
            .unwrap_or("/")
            .parse()
            .map_err(|err| HeronError::internal_with_source("Invalid URI", err))?;
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| HeronError::internal_with_source("Invalid header name", err))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|err| HeronError::internal_with_source("Invalid header value", err))?;
            headers.append(name, value);
        }
        Ok(Request::new(method, uri, headers, self.body)
            .with_path_params(self.path_params)
            .with_path_args(self.path_args))
    }
}

/// Converts multi-valued pairs into an object.
///
/// The last value wins unless the key is in `force_list`, in which case all
/// values are kept in order as a list.
pub fn convert_multi_value<I, V>(pairs: I, force_list: &BTreeSet<String>) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, V)>,
    V: Into<Value>,
{
    let mut result = Map::new();
    for (key, value) in pairs {
        let value = value.into();
        if force_list.contains(&key) {
            match result.get_mut(&key) {
                Some(Value::Array(values)) => values.push(value),
                _ => {
                    result.insert(key, Value::Array(vec![value]));
                }
            }
        } else {
            result.insert(key, value);
        }
    }
    result
}
