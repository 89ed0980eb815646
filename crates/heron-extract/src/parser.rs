//! Request body parsers.
//!
//! A [`Parser`] turns raw body bytes into an unstructured [`Value`]. Parsers
//! are selected per request by the
//! [`RequestNegotiator`](crate::RequestNegotiator) based on `Content-Type`.

use crate::metadata::EndpointMetadata;
use bytes::Bytes;
use futures_util::FutureExt;
use heron_core::{convert_multi_value, HeronError, HeronResult, Request, ResponseSpec, Schema};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Ordered parsers of an endpoint, keyed by content type.
pub type ParserMap = IndexMap<String, Arc<dyn Parser>>;

/// Decodes request bodies of one content type.
pub trait Parser: Send + Sync + fmt::Debug {
    /// Content type this parser works with. May contain wildcards.
    fn content_type(&self) -> &str;

    /// Decodes `raw` into an unstructured value.
    ///
    /// `model` is the schema the result is validated against later; parsers
    /// use it for hints such as force-list keys.
    ///
    /// # Errors
    ///
    /// [`HeronError::DataParsing`] when `raw` is malformed.
    fn parse(&self, raw: &Bytes, request: &Request, model: &Schema) -> HeronResult<Value>;

    /// Returns this parser as a file parser, when it can parse files.
    fn as_file_parser(&self) -> Option<&dyn FileParser> {
        None
    }

    /// `true` when this parser produces uploaded file metadata.
    fn supports_file_parsing(&self) -> bool {
        self.as_file_parser().is_some()
    }

    /// `true` for form parsers that only parse `POST`-like methods.
    fn supports_form_parsing(&self) -> bool {
        false
    }

    /// Extra responses this parser can produce.
    ///
    /// Components already describe parsing failures, so parsers contribute
    /// nothing by default.
    fn provide_response_specs(
        &self,
        _metadata: &EndpointMetadata,
        _existing: &IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        Vec::new()
    }
}

/// Parsers that can extract uploaded files.
pub trait FileParser {
    /// Metadata of every uploaded file, keyed by form field name.
    ///
    /// The last file wins per field unless `model` forces a list.
    fn parse_files(&self, request: &Request, model: &Schema) -> HeronResult<Value>;
}

/// Parses `application/json` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn parse(&self, raw: &Bytes, _request: &Request, _model: &Schema) -> HeronResult<Value> {
        match serde_json::from_slice(raw) {
            Ok(value) => Ok(value),
            Err(_) if raw.is_empty() => Ok(Value::Null),
            Err(err) => Err(HeronError::data_parsing(err.to_string())),
        }
    }
}

fn default_treat_as_post() -> BTreeSet<String> {
    ["PUT", "PATCH", "DELETE"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn parses_as_post(method: &Method, treat_as_post: &BTreeSet<String>) -> bool {
    *method == Method::POST || treat_as_post.contains(method.as_str())
}

/// Parses `application/x-www-form-urlencoded` bodies.
///
/// Only `POST` and the methods listed in `treat_as_post` carry a form; any
/// other method yields an empty object.
#[derive(Debug, Clone)]
pub struct FormUrlEncodedParser {
    treat_as_post: BTreeSet<String>,
}

impl Default for FormUrlEncodedParser {
    fn default() -> Self {
        Self {
            treat_as_post: default_treat_as_post(),
        }
    }
}

impl FormUrlEncodedParser {
    /// Parser that treats `PUT`, `PATCH` and `DELETE` like `POST`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of methods parsed like `POST`.
    #[must_use]
    pub fn treat_as_post<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.treat_as_post = methods
            .into_iter()
            .map(|method| method.as_ref().to_ascii_uppercase())
            .collect();
        self
    }
}

impl Parser for FormUrlEncodedParser {
    fn content_type(&self) -> &str {
        "application/x-www-form-urlencoded"
    }

    fn parse(&self, raw: &Bytes, request: &Request, model: &Schema) -> HeronResult<Value> {
        if !parses_as_post(request.method(), &self.treat_as_post) {
            return Ok(Value::Object(Map::new()));
        }
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(raw)
            .map_err(|err| HeronError::request_serialization(err.to_string()))?;
        Ok(Value::Object(convert_multi_value(
            pairs,
            &model.force_list_keys(),
        )))
    }

    fn supports_form_parsing(&self) -> bool {
        true
    }
}

/// Default maximum total multipart body size (50 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 50 * 1024 * 1024;

/// Default maximum number of multipart fields.
pub const DEFAULT_MAX_FIELDS: usize = 100;

/// Limits applied while parsing multipart bodies.
#[derive(Debug, Clone)]
pub struct MultipartLimits {
    /// Maximum total body size in bytes.
    pub max_body_size: usize,
    /// Maximum number of fields, text and files together.
    pub max_fields: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_fields: DEFAULT_MAX_FIELDS,
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name sent by the client.
    pub filename: Option<String>,
    /// Declared content type.
    pub content_type: String,
    /// Declared charset, when present.
    pub charset: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl UploadedFile {
    /// Metadata object used for validation of the file sent as `field`.
    pub fn metadata(&self, field: &str) -> Value {
        json!({
            "name": field,
            "filename": self.filename,
            "content_type": self.content_type,
            "charset": self.charset,
            "size": self.data.len(),
        })
    }
}

/// Result of parsing one multipart body, cached on the request.
#[derive(Debug, Clone, Default)]
pub struct ParsedForm {
    /// Text fields in wire order.
    pub fields: Arc<Vec<(String, String)>>,
    /// Files in wire order.
    pub files: Arc<Vec<(String, UploadedFile)>>,
}

/// Parses `multipart/form-data` bodies.
///
/// Text fields become the body object, files become file metadata. The
/// body is parsed once per request, so `Body` and `FileMetadata` components
/// share a single pass.
#[derive(Debug, Clone)]
pub struct MultiPartParser {
    treat_as_post: BTreeSet<String>,
    limits: MultipartLimits,
}

impl Default for MultiPartParser {
    fn default() -> Self {
        Self {
            treat_as_post: default_treat_as_post(),
            limits: MultipartLimits::default(),
        }
    }
}

impl MultiPartParser {
    /// Parser that treats `PUT`, `PATCH` and `DELETE` like `POST`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of methods parsed like `POST`.
    #[must_use]
    pub fn treat_as_post<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.treat_as_post = methods
            .into_iter()
            .map(|method| method.as_ref().to_ascii_uppercase())
            .collect();
        self
    }

    /// Sets parsing limits.
    #[must_use]
    pub fn limits(mut self, limits: MultipartLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parses the request body, or returns the cached result.
    ///
    /// # Errors
    ///
    /// [`HeronError::RequestSerialization`] on malformed bodies or when a
    /// limit is exceeded.
    pub fn parse_form(&self, request: &Request) -> HeronResult<ParsedForm> {
        if let Some(form) = request.cached::<ParsedForm>() {
            return Ok(form);
        }
        if !parses_as_post(request.method(), &self.treat_as_post) {
            return Ok(request.cache(ParsedForm::default()));
        }
        let form = self.read_form(request)?;
        tracing::debug!(
            request_id = %request.request_id(),
            fields = form.fields.len(),
            files = form.files.len(),
            "Parsed multipart body"
        );
        Ok(request.cache(form))
    }

    fn read_form(&self, request: &Request) -> HeronResult<ParsedForm> {
        let body = request.body().clone();
        if body.len() > self.limits.max_body_size {
            return Err(HeronError::request_serialization(format!(
                "Multipart body is too large: {} bytes, limit {}",
                body.len(),
                self.limits.max_body_size
            )));
        }
        let content_type = request
            .header(http::header::CONTENT_TYPE.as_str())
            .unwrap_or_default();
        let boundary = multer::parse_boundary(content_type)
            .map_err(|err| HeronError::request_serialization(err.to_string()))?;

        let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);
        let max_fields = self.limits.max_fields;

        // The whole body is already in memory, so every await below is ready
        // on the first poll.
        let reading = async move {
            let mut fields = Vec::new();
            let mut files = Vec::new();
            while let Some(field) = multipart.next_field().await? {
                if fields.len() + files.len() >= max_fields {
                    return Ok(Err(format!("Too many fields, limit {max_fields}")));
                }
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(filename) => {
                        let mime = field
                            .content_type()
                            .cloned()
                            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                        let data = field.bytes().await?;
                        files.push((
                            name,
                            UploadedFile {
                                filename: Some(filename),
                                content_type: mime.essence_str().to_string(),
                                charset: mime
                                    .get_param(mime::CHARSET)
                                    .map(|charset| charset.as_str().to_string()),
                                data,
                            },
                        ));
                    }
                    None => fields.push((name, field.text().await?)),
                }
            }
            Ok::<_, multer::Error>(Ok(ParsedForm {
                fields: Arc::new(fields),
                files: Arc::new(files),
            }))
        };

        match reading.now_or_never() {
            Some(Ok(Ok(form))) => Ok(form),
            Some(Ok(Err(message))) => Err(HeronError::request_serialization(message)),
            Some(Err(err)) => Err(HeronError::request_serialization(err.to_string())),
            None => Err(HeronError::request_serialization(
                "Multipart body could not be read at once",
            )),
        }
    }
}

impl Parser for MultiPartParser {
    fn content_type(&self) -> &str {
        "multipart/form-data"
    }

    fn parse(&self, _raw: &Bytes, request: &Request, model: &Schema) -> HeronResult<Value> {
        let form = self.parse_form(request)?;
        Ok(Value::Object(convert_multi_value(
            form.fields.iter().cloned(),
            &model.force_list_keys(),
        )))
    }

    fn as_file_parser(&self) -> Option<&dyn FileParser> {
        Some(self)
    }

    fn supports_form_parsing(&self) -> bool {
        true
    }
}

impl FileParser for MultiPartParser {
    fn parse_files(&self, request: &Request, model: &Schema) -> HeronResult<Value> {
        let form = self.parse_form(request)?;
        Ok(Value::Object(convert_multi_value(
            form.files
                .iter()
                .map(|(name, file)| (name.clone(), file.metadata(name))),
            &model.force_list_keys(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "X-HERON-BOUNDARY";

    fn multipart_body() -> String {
        [
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nContract\r\n"),
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\na\r\n"),
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\nb\r\n"),
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"r.txt\"\r\n\
                 Content-Type: text/plain; charset=utf-8\r\n\r\nhello\r\n"
            ),
            format!("--{BOUNDARY}--\r\n"),
        ]
        .concat()
    }

    fn multipart_request(method: &str) -> Request {
        Request::builder()
            .method(method)
            .uri("/contracts")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body())
            .build()
            .unwrap()
    }

    #[test]
    fn test_json_parser() {
        let request = Request::builder().build().unwrap();
        let parser = JsonParser;
        let value = parser
            .parse(&Bytes::from_static(br#"{"a": 1}"#), &request, &Schema::any())
            .unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(
            parser.parse(&Bytes::new(), &request, &Schema::any()).unwrap(),
            Value::Null
        );
        let err = parser
            .parse(&Bytes::from_static(b"{"), &request, &Schema::any())
            .unwrap_err();
        assert!(matches!(err, HeronError::DataParsing { .. }));
    }

    #[test]
    fn test_form_parser_respects_force_list() {
        let request = Request::builder()
            .method("POST")
            .body("tag=a&tag=b&name=x")
            .build()
            .unwrap();
        let model: Schema = Schema::object("Form").force_list(["tag"]).into();
        let value = FormUrlEncodedParser::new()
            .parse(request.body(), &request, &model)
            .unwrap();
        assert_eq!(value, json!({"tag": ["a", "b"], "name": "x"}));
    }

    #[test]
    fn test_form_parser_skips_non_post_methods() {
        let request = Request::builder()
            .method("PUT")
            .body("name=x")
            .build()
            .unwrap();
        let parser = FormUrlEncodedParser::new().treat_as_post(["patch"]);
        let value = parser.parse(request.body(), &request, &Schema::any()).unwrap();
        assert_eq!(value, json!({}));

        let value = FormUrlEncodedParser::new()
            .parse(request.body(), &request, &Schema::any())
            .unwrap();
        assert_eq!(value, json!({"name": "x"}));
    }

    #[test]
    fn test_multipart_fields_and_files() {
        let request = multipart_request("POST");
        let parser = MultiPartParser::new();
        assert!(parser.supports_file_parsing());
        assert!(parser.supports_form_parsing());

        let body = parser
            .parse(request.body(), &request, &Schema::any())
            .unwrap();
        assert_eq!(body, json!({"title": "Contract", "tag": "b"}));

        let files = parser.parse_files(&request, &Schema::any()).unwrap();
        assert_eq!(
            files,
            json!({"receipt": {
                "name": "receipt",
                "filename": "r.txt",
                "content_type": "text/plain",
                "charset": "utf-8",
                "size": 5,
            }})
        );
    }

    #[test]
    fn test_multipart_is_parsed_once() {
        let request = multipart_request("POST");
        let parser = MultiPartParser::new();
        let first = parser.parse_form(&request).unwrap();
        let second = parser.parse_form(&request).unwrap();
        assert!(Arc::ptr_eq(&first.fields, &second.fields));
    }

    #[test]
    fn test_multipart_method_not_treated_as_post() {
        let request = multipart_request("PUT");
        let parser = MultiPartParser::new().treat_as_post(Vec::<String>::new());
        let body = parser
            .parse(request.body(), &request, &Schema::any())
            .unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn test_multipart_errors() {
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "multipart/form-data")
            .body("garbage")
            .build()
            .unwrap();
        let err = MultiPartParser::new()
            .parse(request.body(), &request, &Schema::any())
            .unwrap_err();
        assert!(matches!(err, HeronError::RequestSerialization { .. }));

        let request = multipart_request("POST");
        let limits = MultipartLimits {
            max_fields: 2,
            ..MultipartLimits::default()
        };
        let err = MultiPartParser::new()
            .limits(limits)
            .parse_form(&request)
            .unwrap_err();
        assert_eq!(err.to_string(), "Too many fields, limit 2");
    }
}
