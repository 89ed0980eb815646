//! Combined validation of all request components.
//!
//! [`SerializerContext`] is built once per controller. It merges the models
//! of every declared component into one object model whose fields are the
//! component context names, plus one variant per request content type that
//! some component overrides. Each request is then validated with exactly
//! one serializer call.
//!
//! # Example
//!
//! ```rust
//! use heron_core::{Request, Schema};
//! use heron_extract::{
//!     ComponentParserSpec, JsonSerializer, ParserMap, Query, RequestNegotiator,
//!     SerializerContext,
//! };
//! use std::sync::Arc;
//!
//! let filters = Schema::object("Filters").field("page", Schema::integer());
//! let context = SerializerContext::new(
//!     "UserController",
//!     vec![ComponentParserSpec::new(Arc::new(Query), vec![filters.into()])],
//! );
//!
//! let request = Request::builder().uri("/users?page=2").build().unwrap();
//! let negotiator = RequestNegotiator::new(&ParserMap::new());
//! let parsed = context.parse(&request, &negotiator, &JsonSerializer).unwrap();
//! assert_eq!(parsed.get("parsed_query").unwrap()["page"], 2);
//! ```

use crate::component::{ComponentContext, ComponentParserSpec};
use crate::negotiation::RequestNegotiator;
use crate::serializer::Serializer;
use heron_core::{Field, HeronError, HeronResult, MediaType, ObjectSchema, Request, Schema};
use http::StatusCode;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Per-controller combined model and its conditional variants.
#[derive(Debug, Clone)]
pub struct SerializerContext {
    specs: Vec<ComponentParserSpec>,
    default_model: Schema,
    conditional_models: IndexMap<String, Schema>,
    strict_validation: Option<bool>,
}

impl SerializerContext {
    /// Builds the combined models of `blueprint` from its component specs.
    #[must_use]
    pub fn new(blueprint: &str, specs: Vec<ComponentParserSpec>) -> Self {
        let fields: IndexMap<String, Schema> = specs
            .iter()
            .map(|spec| (spec.component.context_name().to_string(), spec.model().clone()))
            .collect();

        let mut overrides: IndexMap<String, IndexMap<String, Schema>> = IndexMap::new();
        for spec in &specs {
            let context_name = spec.component.context_name();
            for (content_type, model) in spec.component.conditional_types(spec.model()) {
                overrides
                    .entry(MediaType::parse(&content_type).essence())
                    .or_default()
                    .insert(context_name.to_string(), model);
            }
        }

        let default_model = combined_model(&format!("_{blueprint}@ContextModel"), &fields);
        let conditional_models = overrides
            .into_iter()
            .map(|(content_type, overridden)| {
                let mut variant = fields.clone();
                variant.extend(overridden);
                let name = format!("_{blueprint}@ContextModel#{content_type}");
                (content_type, combined_model(&name, &variant))
            })
            .collect();

        Self {
            specs,
            default_model,
            conditional_models,
            strict_validation: None,
        }
    }

    /// Forces strict (`Some(true)`) or lax (`Some(false)`) validation.
    /// `None` lets every model decide.
    #[must_use]
    pub fn strict_validation(mut self, strict: Option<bool>) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Declared component specs.
    pub fn specs(&self) -> &[ComponentParserSpec] {
        &self.specs
    }

    /// The combined model used when no conditional variant applies.
    pub fn default_model(&self) -> &Schema {
        &self.default_model
    }

    /// Conditional combined models by request content type.
    pub fn conditional_models(&self) -> &IndexMap<String, Schema> {
        &self.conditional_models
    }

    /// The combined model for a request with `content_type`.
    pub fn model_for(&self, content_type: Option<&str>) -> &Schema {
        content_type
            .map(|raw| MediaType::parse(raw).essence())
            .and_then(|essence| self.conditional_models.get(&essence))
            .unwrap_or(&self.default_model)
    }

    /// Extracts every component of `request` and validates them at once.
    ///
    /// # Errors
    ///
    /// Extraction errors are returned as they are, before any validation.
    /// Validation errors become a 400 [`HeronError::Validation`] located
    /// under the component context names.
    pub fn parse(
        &self,
        request: &Request,
        negotiator: &RequestNegotiator,
        serializer: &dyn Serializer,
    ) -> HeronResult<ParsedComponents> {
        if self.specs.is_empty() {
            return Ok(ParsedComponents::default());
        }

        let ctx = ComponentContext {
            request,
            negotiator,
            serializer,
        };
        let mut raw = Map::new();
        for spec in &self.specs {
            let data = spec.component.provide_context_data(ctx, spec.model())?;
            raw.insert(spec.component.context_name().to_string(), data);
        }

        let model = self.model_for(request.content_type().as_deref());
        match serializer.from_value(&Value::Object(raw), model, self.strict_validation) {
            Ok(Value::Object(values)) => Ok(ParsedComponents { values }),
            Ok(other) => Err(HeronError::internal(format!(
                "Combined model {} produced a non-object value: {other}",
                model.type_name()
            ))),
            Err(errors) => {
                tracing::warn!(
                    request_id = %request.request_id(),
                    model = %model.type_name(),
                    errors = errors.len(),
                    "Request components failed validation"
                );
                Err(HeronError::validation(
                    serializer.serialize_validation_error(errors),
                    StatusCode::BAD_REQUEST,
                ))
            }
        }
    }
}

fn combined_model(name: &str, fields: &IndexMap<String, Schema>) -> Schema {
    fields
        .iter()
        .fold(ObjectSchema::new(name), |object, (context_name, model)| {
            object.field(context_name.as_str(), Field::new(model.clone()))
        })
        .into()
}

/// Validated components of one request, by context name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedComponents {
    values: Map<String, Value>,
}

impl ParsedComponents {
    /// Validated value of the component with `context_name`.
    pub fn get(&self, context_name: &str) -> Option<&Value> {
        self.values.get(context_name)
    }

    /// Deserializes the component with `context_name` into `T`.
    ///
    /// # Errors
    ///
    /// Internal error when the component is not declared or does not fit `T`.
    pub fn typed<T: DeserializeOwned>(&self, context_name: &str) -> HeronResult<T> {
        let value = self.get(context_name).ok_or_else(|| {
            HeronError::internal(format!("Component {context_name} is not declared"))
        })?;
        serde_json::from_value(value.clone()).map_err(|err| {
            HeronError::internal_with_source(format!("Cannot convert {context_name}"), err)
        })
    }

    /// `parsed_body` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn body<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_body")
    }

    /// `parsed_query` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn query<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_query")
    }

    /// `parsed_headers` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn headers<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_headers")
    }

    /// `parsed_path` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn path<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_path")
    }

    /// `parsed_cookies` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn cookies<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_cookies")
    }

    /// `parsed_file_metadata` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ParsedComponents::typed`].
    pub fn file_metadata<T: DeserializeOwned>(&self) -> HeronResult<T> {
        self.typed("parsed_file_metadata")
    }

    /// Every validated component.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// `true` when no component was declared.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Body, Headers, Path, Query};
    use crate::parser::{FormUrlEncodedParser, JsonParser, Parser, ParserMap};
    use crate::serializer::JsonSerializer;
    use heron_core::LocItem;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn negotiator() -> RequestNegotiator {
        let mut parsers = ParserMap::new();
        parsers.insert("application/json".to_string(), Arc::new(JsonParser) as Arc<dyn Parser>);
        parsers.insert(
            "application/x-www-form-urlencoded".to_string(),
            Arc::new(FormUrlEncodedParser::new()),
        );
        RequestNegotiator::new(&parsers)
    }

    fn user() -> Schema {
        Schema::object("UserCreateModel")
            .field("email", Schema::string())
            .field("age", Schema::integer())
            .into()
    }

    #[test]
    fn test_combined_model_shape() {
        let context = SerializerContext::new(
            "UserController",
            vec![
                ComponentParserSpec::new(Arc::new(Body), vec![user()]),
                ComponentParserSpec::new(Arc::new(Query), vec![Schema::any()]),
            ],
        );
        let model = context.default_model().as_object().unwrap();
        assert_eq!(model.name, "_UserController@ContextModel");
        let names: Vec<&str> = model.fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["parsed_body", "parsed_query"]);
        assert!(context.conditional_models().is_empty());
    }

    #[test]
    fn test_conditional_models_keep_every_field() {
        let body = Schema::conditional([
            ("application/json", user()),
            ("Application/X-WWW-Form-Urlencoded", Schema::object("Form").into()),
        ])
        .unwrap();
        let context = SerializerContext::new(
            "UserController",
            vec![
                ComponentParserSpec::new(Arc::new(Body), vec![body]),
                ComponentParserSpec::new(Arc::new(Query), vec![Schema::any()]),
            ],
        );
        let keys: Vec<&str> = context.conditional_models().keys().map(String::as_str).collect();
        assert_eq!(keys, ["application/json", "application/x-www-form-urlencoded"]);

        let json_model = context
            .model_for(Some("application/json; charset=utf-8"))
            .as_object()
            .unwrap();
        assert_eq!(json_model.name, "_UserController@ContextModel#application/json");
        assert_eq!(json_model.fields.len(), 2);
        assert_eq!(json_model.fields["parsed_body"].schema, user());

        assert_eq!(context.model_for(Some("text/plain")), context.default_model());
        assert_eq!(context.model_for(None), context.default_model());
    }

    #[test]
    fn test_parse_validates_once() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct UserCreate {
            email: String,
            age: i64,
        }

        let context = SerializerContext::new(
            "UserController",
            vec![
                ComponentParserSpec::new(Arc::new(Body), vec![user()]),
                ComponentParserSpec::new(Arc::new(Path), vec![Schema::any()]),
            ],
        );
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body(r#"{"email": "a@b.com", "age": "30"}"#)
            .path_param("team", "core")
            .build()
            .unwrap();
        let parsed = context
            .parse(&request, &negotiator(), &JsonSerializer)
            .unwrap();
        assert_eq!(
            parsed.body::<UserCreate>().unwrap(),
            UserCreate {
                email: "a@b.com".to_string(),
                age: 30
            }
        );
        assert_eq!(parsed.get("parsed_path"), Some(&json!({"team": "core"})));
        assert!(parsed.query::<Value>().is_err());
    }

    #[test]
    fn test_validation_errors_are_located() {
        let context = SerializerContext::new(
            "UserController",
            vec![ComponentParserSpec::new(Arc::new(Body), vec![user()])],
        );
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body(r#"{"email": "a@b.com"}"#)
            .build()
            .unwrap();
        let err = context
            .parse(&request, &negotiator(), &JsonSerializer)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let detail = err.details();
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0].kind, "missing");
        assert_eq!(
            detail[0].loc,
            Some(vec![LocItem::from("parsed_body"), LocItem::from("age")])
        );
    }

    #[test]
    fn test_extraction_errors_skip_validation() {
        let context = SerializerContext::new(
            "UserController",
            vec![
                ComponentParserSpec::new(Arc::new(Headers), vec![Schema::any()]),
                ComponentParserSpec::new(Arc::new(Body), vec![user()]),
            ],
        );
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body("{not json")
            .build()
            .unwrap();
        let err = context
            .parse(&request, &negotiator(), &JsonSerializer)
            .unwrap_err();
        assert!(matches!(err, HeronError::RequestSerialization { .. }));
    }

    #[test]
    fn test_strict_validation() {
        let context = SerializerContext::new(
            "UserController",
            vec![ComponentParserSpec::new(Arc::new(Body), vec![user()])],
        )
        .strict_validation(Some(true));
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body(r#"{"email": "a@b.com", "age": "30"}"#)
            .build()
            .unwrap();
        let err = context
            .parse(&request, &negotiator(), &JsonSerializer)
            .unwrap_err();
        assert_eq!(err.details()[0].kind, "int_type");
    }

    #[test]
    fn test_no_components_is_a_noop() {
        let context = SerializerContext::new("Empty", Vec::new());
        let request = Request::builder()
            .header("Content-Type", "application/json")
            .body("{broken")
            .build()
            .unwrap();
        let parsed = context
            .parse(&request, &negotiator(), &JsonSerializer)
            .unwrap();
        assert!(parsed.is_empty());
    }
}
