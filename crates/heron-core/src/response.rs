//! Outgoing response primitives.

use crate::cookies::NewCookie;
use crate::error::{HeronError, HeronResult};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use indexmap::IndexMap;
use serde::Serialize;

/// An HTTP response produced by an endpoint.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    cookies: IndexMap<String, NewCookie>,
}

impl Response {
    /// Creates an empty response.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            cookies: IndexMap::new(),
        }
    }

    /// JSON response.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be serialized.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> HeronResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|err| HeronError::internal_with_source("Failed to serialize response", err))?;
        Ok(Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a header, replacing previous values.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from strings.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name or value.
    pub fn try_header(mut self, name: &str, value: &str) -> HeronResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| HeronError::internal_with_source("Invalid header name", err))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| HeronError::internal_with_source("Invalid header value", err))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, cookie: NewCookie) -> Self {
        self.cookies.insert(name.into(), cookie);
        self
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers, without cookies.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Cookies to set.
    pub fn cookies(&self) -> &IndexMap<String, NewCookie> {
        &self.cookies
    }

    /// `Content-Type` header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Converts into an `http` response, rendering cookies as `Set-Cookie`.
    ///
    /// # Errors
    ///
    /// Fails when a cookie renders to an invalid header value.
    pub fn into_http(self) -> HeronResult<http::Response<Full<Bytes>>> {
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        for (name, cookie) in &self.cookies {
            let value = HeaderValue::from_str(&cookie.to_header_value(name))
                .map_err(|err| HeronError::internal_with_source("Invalid cookie", err))?;
            response.headers_mut().append(SET_COOKIE, value);
        }
        Ok(response)
    }
}
