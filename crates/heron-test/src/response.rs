//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use heron_core::{NewCookie, Response};
use http::{header, HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A dispatched response with helper methods for assertions.
#[derive(Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: IndexMap<String, NewCookie>,
    body: Bytes,
}

impl From<Response> for TestResponse {
    fn from(response: Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            cookies: response.cookies().clone(),
            body: response.body().clone(),
        }
    }
}

impl TestResponse {
    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true for 2xx responses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns a cookie set by the response.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&NewCookie> {
        self.cookies.get(name)
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Fails when the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON of type `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Error details of a `{"detail": [...]}` body.
    ///
    /// # Errors
    ///
    /// Fails when the body is not an error envelope.
    pub fn error_details(&self) -> Result<Vec<Value>, TestError> {
        let mut body: Value = self.json()?;
        match body.get_mut("detail").map(Value::take) {
            Some(Value::Array(details)) => Ok(details),
            _ => Err(TestError::BodyRead(format!("Not an error envelope: {body}"))),
        }
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(
            actual, expected,
            "Header '{name}': expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that the Content-Type header starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if Content-Type is missing or doesn't match.
    pub fn assert_content_type(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let actual = self
            .content_type()
            .unwrap_or_else(|| panic!("Content-Type header not found"));
        assert!(
            actual.starts_with(expected),
            "Content-Type: expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that the JSON body matches the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual: Value = self
            .json()
            .unwrap_or_else(|err| panic!("Body should be valid JSON: {err}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts that a JSON field exists and equals the expected value.
    ///
    /// `path` is dotted, with numeric segments indexing arrays, such as
    /// `detail.0.loc`.
    ///
    /// # Panics
    ///
    /// Panics if the field doesn't exist or doesn't match.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &Value) -> &Self {
        let path = path.as_ref();
        let json: Value = self
            .json()
            .unwrap_or_else(|err| panic!("Body should be valid JSON: {err}"));
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in: {json}"));
        assert_eq!(
            actual, expected,
            "JSON field '{path}': expected {expected}, got {actual}"
        );
        self
    }

    /// Asserts the first error detail of an error envelope.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an error envelope or the first detail has
    /// another message or type.
    pub fn assert_error(&self, msg: &str, kind: &str) -> &Self {
        let details = self
            .error_details()
            .unwrap_or_else(|err| panic!("{err}"));
        let first = details
            .first()
            .unwrap_or_else(|| panic!("Error envelope has no detail"));
        assert_eq!(first["msg"], msg, "Error message mismatch in {first}");
        assert_eq!(first["type"], kind, "Error type mismatch in {first}");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("body_len", &self.body.len())
            .finish()
    }
}

fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: StatusCode, body: &Value) -> TestResponse {
        Response::json(status, body).unwrap().into()
    }

    #[test]
    fn test_from_core_response() {
        let core = Response::json(StatusCode::CREATED, &json!({"id": 7}))
            .unwrap()
            .with_cookie("session", NewCookie::new("abc"));
        let response = TestResponse::from(core);
        assert_eq!(response.status_code(), 201);
        assert!(response.is_success());
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.cookie("session").unwrap().value, "abc");
        assert_eq!(response.text().unwrap(), r#"{"id":7}"#);
    }

    #[test]
    fn test_assertions_chain() {
        response(StatusCode::OK, &json!({"items": [{"name": "a"}]}))
            .assert_status(StatusCode::OK)
            .assert_content_type("application/json")
            .assert_json_field("items.0.name", &json!("a"))
            .assert_json_eq(&json!({"items": [{"name": "a"}]}));
    }

    #[test]
    fn test_error_details() {
        let body = json!({"detail": [{"msg": "Field required", "loc": ["parsed_body", "age"], "type": "missing"}]});
        let response = response(StatusCode::BAD_REQUEST, &body);
        response
            .assert_error("Field required", "missing")
            .assert_json_field("detail.0.loc.1", &json!("age"));
        assert_eq!(response.error_details().unwrap().len(), 1);

        let plain = self::response(StatusCode::CONFLICT, &json!({"code": "taken"}));
        assert!(plain.error_details().is_err());
    }

    #[test]
    #[should_panic(expected = "Expected status 404 Not Found")]
    fn test_assert_status_panics() {
        response(StatusCode::OK, &json!({})).assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_json_path_missing() {
        assert!(json_path(&json!({"a": [1]}), "a.3").is_none());
        assert_eq!(json_path(&json!({"a": [1]}), "a.0"), Some(&json!(1)));
    }
}
