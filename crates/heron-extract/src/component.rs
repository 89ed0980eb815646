//! Request components.
//!
//! A component is one typed slice of a request: body, query string,
//! headers, path parameters, cookies or uploaded file metadata. Each one
//! provides the raw, unvalidated data for its slice under a unique context
//! name; validation of all slices happens at once in
//! [`SerializerContext`](crate::SerializerContext).

use crate::metadata::{add_new_response, EndpointMetadata};
use crate::negotiation::RequestNegotiator;
use crate::serializer::Serializer;
use heron_core::{
    convert_multi_value, format_list, HeronError, HeronResult, Request, ResponseSpec, Schema,
};
use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

static ANY_MODEL: Schema = Schema::Any;

/// What a component needs to read its slice of the request.
#[derive(Clone, Copy)]
pub struct ComponentContext<'a> {
    /// The request being handled.
    pub request: &'a Request,
    /// Parser negotiation of the endpoint.
    pub negotiator: &'a RequestNegotiator,
    /// Serializer backend of the controller.
    pub serializer: &'a dyn Serializer,
}

impl fmt::Debug for ComponentContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("request_id", &self.request.request_id())
            .field("serializer", &self.serializer.name())
            .finish_non_exhaustive()
    }
}

/// One typed slice of a request.
pub trait ComponentParser: Send + Sync + fmt::Debug {
    /// Name of the declared class, such as `Query`.
    fn class_name(&self) -> &'static str;

    /// Unique key of this component in the combined model.
    fn context_name(&self) -> &'static str;

    /// Raw data for validation against `model`.
    ///
    /// # Errors
    ///
    /// [`HeronError::RequestSerialization`] when the slice cannot be read.
    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value>;

    /// Models to use instead of `model` for specific request content types.
    fn conditional_types(&self, _model: &Schema) -> IndexMap<String, Schema> {
        IndexMap::new()
    }

    /// Checks that the endpoint can serve this component. Runs at startup.
    ///
    /// # Errors
    ///
    /// [`HeronError::EndpointMetadata`] on misconfiguration.
    fn validate(&self, _metadata: &EndpointMetadata) -> HeronResult<()> {
        Ok(())
    }

    /// Responses caused by this component, a 400 by default.
    fn provide_response_specs(
        &self,
        metadata: &EndpointMetadata,
        existing: &IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        parsing_failure_response(metadata, existing)
    }
}

fn parsing_failure_response(
    metadata: &EndpointMetadata,
    existing: &IndexMap<StatusCode, ResponseSpec>,
) -> Vec<ResponseSpec> {
    add_new_response(
        ResponseSpec::new(metadata.error_model.clone(), StatusCode::BAD_REQUEST)
            .description("Raised when request components cannot be parsed"),
        existing,
    )
}

/// A component with its resolved models.
#[derive(Debug, Clone)]
pub struct ComponentParserSpec {
    /// The component.
    pub component: Arc<dyn ComponentParser>,
    /// Concrete models substituted for the component type parameters.
    pub type_args: Vec<Schema>,
}

impl ComponentParserSpec {
    /// Pairs `component` with its models.
    pub fn new(component: Arc<dyn ComponentParser>, type_args: Vec<Schema>) -> Self {
        Self {
            component,
            type_args,
        }
    }

    /// The model of this component.
    pub fn model(&self) -> &Schema {
        self.type_args.first().unwrap_or(&ANY_MODEL)
    }
}

/// Query string parameters, `parsed_query`.
///
/// Repeated keys keep the last value unless the model forces a list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query;

impl ComponentParser for Query {
    fn class_name(&self) -> &'static str {
        "Query"
    }

    fn context_name(&self) -> &'static str {
        "parsed_query"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value> {
        let pairs = ctx.request.query_pairs()?;
        Ok(Value::Object(convert_multi_value(
            pairs,
            &model.force_list_keys(),
        )))
    }
}

/// Request body decoded by the negotiated parser, `parsed_body`.
///
/// The model may be conditional on the request content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Body;

impl ComponentParser for Body {
    fn class_name(&self) -> &'static str {
        "Body"
    }

    fn context_name(&self) -> &'static str {
        "parsed_body"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value> {
        let parser = ctx.negotiator.negotiate(ctx.request)?;
        ctx.serializer
            .deserialize(ctx.request.body(), parser.as_ref(), ctx.request, model)
            .map_err(|err| match err {
                HeronError::DataParsing { message } => HeronError::request_serialization(message),
                other => other,
            })
    }

    fn conditional_types(&self, model: &Schema) -> IndexMap<String, Schema> {
        model.conditional_types().cloned().unwrap_or_default()
    }
}

/// Request headers, `parsed_headers`.
///
/// Declared fields are looked up case-insensitively by their wire name;
/// every other header is passed with a lowercase name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headers;

fn header_value(headers: &HeaderMap, name: &str) -> Option<Value> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect();
    (!values.is_empty()).then(|| Value::String(values.join(", ")))
}

impl ComponentParser for Headers {
    fn class_name(&self) -> &'static str {
        "Headers"
    }

    fn context_name(&self) -> &'static str {
        "parsed_headers"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value> {
        let headers = ctx.request.headers();
        let mut data = Map::new();
        let mut consumed = BTreeSet::new();
        if let Some(object) = model.as_object() {
            for (name, field) in &object.fields {
                let wire = field.wire_name(name);
                let lowered = wire.to_ascii_lowercase();
                let hyphenated = lowered.replace('_', "-");
                for candidate in [lowered, hyphenated] {
                    if let Some(value) = header_value(headers, &candidate) {
                        data.insert(wire.to_string(), value);
                        consumed.insert(candidate);
                        break;
                    }
                }
            }
        }
        for name in headers.keys() {
            let name = name.as_str();
            if consumed.contains(name) || data.contains_key(name) {
                continue;
            }
            if let Some(value) = header_value(headers, name) {
                data.insert(name.to_string(), value);
            }
        }
        Ok(Value::Object(data))
    }
}

/// Named path parameters, `parsed_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Path;

impl ComponentParser for Path {
    fn class_name(&self) -> &'static str {
        "Path"
    }

    fn context_name(&self) -> &'static str {
        "parsed_path"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value> {
        let args = ctx.request.path_args();
        if !args.is_empty() {
            return Err(HeronError::request_serialization(format!(
                "Path with model {} does not allow unnamed path parameters {}",
                model.type_name(),
                format_list(args)
            )));
        }
        Ok(Value::Object(
            ctx.request
                .path_params()
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect(),
        ))
    }

    fn provide_response_specs(
        &self,
        metadata: &EndpointMetadata,
        existing: &IndexMap<StatusCode, ResponseSpec>,
    ) -> Vec<ResponseSpec> {
        let mut specs = parsing_failure_response(metadata, existing);
        specs.extend(add_new_response(
            ResponseSpec::new(metadata.error_model.clone(), StatusCode::NOT_FOUND)
                .description("Raised when path parameters do not match"),
            existing,
        ));
        specs
    }
}

/// Request cookies, `parsed_cookies`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cookies;

impl ComponentParser for Cookies {
    fn class_name(&self) -> &'static str {
        "Cookies"
    }

    fn context_name(&self) -> &'static str {
        "parsed_cookies"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, _model: &Schema) -> HeronResult<Value> {
        Ok(Value::Object(
            ctx.request
                .cookies()
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
        ))
    }
}

/// Metadata of uploaded files, `parsed_file_metadata`.
///
/// Requires a parser that can parse files. Repeated file fields keep the
/// last file unless the model forces a list.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMetadata;

impl ComponentParser for FileMetadata {
    fn class_name(&self) -> &'static str {
        "FileMetadata"
    }

    fn context_name(&self) -> &'static str {
        "parsed_file_metadata"
    }

    fn provide_context_data(&self, ctx: ComponentContext<'_>, model: &Schema) -> HeronResult<Value> {
        let parser = ctx.negotiator.negotiate(ctx.request)?;
        let Some(files) = parser.as_file_parser() else {
            return Err(HeronError::request_serialization(format!(
                "Trying to parse files with '{}' parser that does not support file parsing",
                parser.content_type()
            )));
        };
        files.parse_files(ctx.request, model)
    }

    fn validate(&self, metadata: &EndpointMetadata) -> HeronResult<()> {
        if metadata
            .parsers
            .values()
            .any(|parser| parser.supports_file_parsing())
        {
            return Ok(());
        }
        Err(HeronError::endpoint_metadata(format!(
            "Component {} requires at least one parser that can parse files, found: {}",
            self.class_name(),
            format_list(metadata.parsers.keys())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{JsonParser, MultiPartParser, Parser, ParserMap};
    use crate::serializer::JsonSerializer;
    use heron_core::Field;
    use serde_json::json;

    fn json_parsers() -> ParserMap {
        let mut parsers = ParserMap::new();
        parsers.insert("application/json".to_string(), Arc::new(JsonParser) as Arc<dyn Parser>);
        parsers
    }

    fn extract(component: &dyn ComponentParser, request: &Request, model: &Schema) -> HeronResult<Value> {
        let negotiator = RequestNegotiator::new(&json_parsers());
        let ctx = ComponentContext {
            request,
            negotiator: &negotiator,
            serializer: &JsonSerializer,
        };
        component.provide_context_data(ctx, model)
    }

    #[test]
    fn test_query_force_list() {
        let request = Request::builder()
            .uri("/search?query=a&query=b&page=1")
            .build()
            .unwrap();
        let forced: Schema = Schema::object("Search").force_list(["query"]).into();
        assert_eq!(
            extract(&Query, &request, &forced).unwrap(),
            json!({"query": ["a", "b"], "page": "1"})
        );
        assert_eq!(
            extract(&Query, &request, &Schema::object("Search").into()).unwrap(),
            json!({"query": "b", "page": "1"})
        );
    }

    #[test]
    fn test_body_maps_parsing_errors() {
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body("{broken")
            .build()
            .unwrap();
        let err = extract(&Body, &request, &Schema::any()).unwrap_err();
        assert!(matches!(err, HeronError::RequestSerialization { .. }));
    }

    #[test]
    fn test_body_conditional_types() {
        let conditional = Schema::conditional([
            ("application/json", Schema::string()),
            ("application/xml", Schema::integer()),
        ])
        .unwrap();
        assert_eq!(Body.conditional_types(&conditional).len(), 2);
        assert!(Body.conditional_types(&Schema::string()).is_empty());
        assert!(Query.conditional_types(&conditional).is_empty());
    }

    #[test]
    fn test_headers_lookup() {
        let request = Request::builder()
            .header("X-API-Key", "secret")
            .header("X-Trace", "1")
            .header("Accept", "a/b")
            .header("Accept", "c/d")
            .build()
            .unwrap();
        let model: Schema = Schema::object("AuthHeaders")
            .field("api_key", Field::new(Schema::string()).alias("x-api-key"))
            .field("x_trace", Schema::string())
            .into();
        assert_eq!(
            extract(&Headers, &request, &model).unwrap(),
            json!({"x-api-key": "secret", "x_trace": "1", "accept": "a/b, c/d"})
        );
    }

    #[test]
    fn test_path_params() {
        let request = Request::builder()
            .path_param("user_id", "42")
            .build()
            .unwrap();
        assert_eq!(
            extract(&Path, &request, &Schema::any()).unwrap(),
            json!({"user_id": "42"})
        );

        let request = Request::builder().path_arg("42").build().unwrap();
        let err = extract(&Path, &request, &Schema::any()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path with model Any does not allow unnamed path parameters ['42']"
        );
    }

    #[test]
    fn test_cookies() {
        let request = Request::builder()
            .header("Cookie", "session=abc; theme=\"dark\"")
            .build()
            .unwrap();
        assert_eq!(
            extract(&Cookies, &request, &Schema::any()).unwrap(),
            json!({"session": "abc", "theme": "dark"})
        );
    }

    #[test]
    fn test_file_metadata_requires_file_parser() {
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body("{}")
            .build()
            .unwrap();
        let err = extract(&FileMetadata, &request, &Schema::any()).unwrap_err();
        assert!(err.to_string().contains("does not support file parsing"));

        let mut metadata = EndpointMetadata::new("post");
        metadata.parsers = json_parsers();
        let err = FileMetadata.validate(&metadata).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Component FileMetadata requires at least one parser that can parse files, found: ['application/json']"
        );

        metadata.parsers.insert(
            "multipart/form-data".to_string(),
            Arc::new(MultiPartParser::new()),
        );
        assert!(FileMetadata.validate(&metadata).is_ok());
    }

    #[test]
    fn test_path_contributes_not_found() {
        let metadata = EndpointMetadata::new("get");
        let codes: Vec<u16> = Path
            .provide_response_specs(&metadata, &IndexMap::new())
            .iter()
            .map(|spec| spec.status_code.as_u16())
            .collect();
        assert_eq!(codes, [400, 404]);
    }
}
