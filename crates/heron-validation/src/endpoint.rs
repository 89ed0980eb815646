//! Endpoint metadata construction and validation.
//!
//! Runs once per endpoint while the controller is built. Every check here
//! fails with [`HeronError::EndpointMetadata`] so that a misdeclared
//! endpoint never serves a request.

use crate::payload::{AuthConfig, ModifyPayload, Payload};
use crate::response::is_bodyless;
use heron_core::{
    format_list, HeronError, HeronResult, ResponseCookie, ResponseHeader, ResponseModification,
    ResponseSpec, Schema,
};
use heron_extract::{
    AuthProvider, ComponentParserSpec, EndpointMetadata, HttpSpec, ParserMap, RendererMap,
};
use http::StatusCode;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Standard HTTP methods, lowercase.
pub const HTTP_METHODS: [&str; 9] = [
    "get", "head", "post", "put", "delete", "connect", "options", "trace", "patch",
];

/// Methods that must not carry a request body.
const METHODS_WITHOUT_BODY: [&str; 5] = ["get", "head", "delete", "connect", "trace"];

/// Validates an endpoint method name and returns the method it serves.
///
/// `meta` serves `options`.
///
/// # Errors
///
/// Fails for names that are not lowercase, and for non-standard names
/// unless `allow_custom` is set.
pub fn validate_method_name(name: &str, allow_custom: bool) -> HeronResult<String> {
    let invalid = || HeronError::endpoint_metadata(format!("{name} is not a valid HTTP method name"));
    if name.is_empty() || name != name.to_lowercase() {
        return Err(invalid());
    }
    if name == "meta" {
        return Ok("options".to_string());
    }
    if allow_custom || HTTP_METHODS.contains(&name) {
        return Ok(name.to_string());
    }
    Err(invalid())
}

/// Default status code of a raw-data endpoint.
pub fn infer_status_code(method: &str) -> StatusCode {
    if method.eq_ignore_ascii_case("post") {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// What every endpoint of a controller inherits.
#[derive(Debug, Clone, Default)]
pub struct ControllerDefaults {
    /// Responses shared by every endpoint.
    pub responses: Vec<ResponseSpec>,
    /// Parsers, unless the endpoint sets its own.
    pub parsers: ParserMap,
    /// Renderers, unless the endpoint sets its own.
    pub renderers: RendererMap,
    /// Controller level auth, chained after the endpoint level.
    pub auth: AuthConfig,
    /// Response validation, unless the endpoint sets it.
    pub validate_responses: bool,
    /// HTTP spec checks turned off for every endpoint.
    pub no_validate_http_spec: BTreeSet<HttpSpec>,
    /// Custom method names every endpoint may use.
    pub allowed_http_methods: BTreeSet<String>,
}

/// Builds and validates the [`EndpointMetadata`] of one endpoint.
#[derive(Debug)]
pub struct EndpointMetadataBuilder<'a> {
    endpoint: String,
    payload: &'a Payload,
    defaults: &'a ControllerDefaults,
    components: &'a [ComponentParserSpec],
}

impl<'a> EndpointMetadataBuilder<'a> {
    /// Prepares the build of `endpoint`, a name used in error messages.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        payload: &'a Payload,
        defaults: &'a ControllerDefaults,
        components: &'a [ComponentParserSpec],
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            defaults,
            components,
        }
    }

    /// Builds the metadata of the endpoint serving `method_name`.
    ///
    /// # Errors
    ///
    /// [`HeronError::EndpointMetadata`] on any misdeclaration.
    pub fn build(&self, method_name: &str) -> HeronResult<EndpointMetadata> {
        let options = self.payload.options();
        let method = validate_method_name(
            method_name,
            options.allow_custom_http_methods
                || self.defaults.allowed_http_methods.contains(method_name),
        )?;

        let modification = match self.payload {
            Payload::Validate(payload) => {
                if self.defaults.responses.is_empty() && payload.responses.is_empty() {
                    return Err(HeronError::endpoint_metadata(format!(
                        "'{}' returns native responses and has no configured responses, \
                         it requires at least one ResponseSpec",
                        self.endpoint
                    )));
                }
                None
            }
            Payload::Modify(payload) => {
                self.validate_new_http_parts(payload)?;
                Some(ResponseModification {
                    return_type: payload.return_type.clone(),
                    status_code: payload
                        .status_code
                        .unwrap_or_else(|| infer_status_code(&method)),
                    headers: payload.headers.clone(),
                    cookies: payload.cookies.clone(),
                })
            }
        };

        let mut metadata = EndpointMetadata::new(method);
        metadata.validate_responses = options
            .validate_responses
            .unwrap_or(self.defaults.validate_responses);
        metadata.modification = modification;
        metadata.error_handler = options.error_handler.clone();
        metadata.component_parsers = self.components.to_vec();
        metadata.parsers = self.parsers()?;
        metadata.renderers = self.renderers()?;
        metadata.auth = self.auth();
        metadata.no_validate_http_spec = options
            .no_validate_http_spec
            .union(&self.defaults.no_validate_http_spec)
            .copied()
            .collect();
        metadata.allowed_http_methods = self.defaults.allowed_http_methods.clone();
        metadata.summary = options.summary.clone();
        metadata.description = options.description.clone();
        metadata.tags = options.tags.clone();
        metadata.operation_id = options.operation_id.clone();
        metadata.deprecated = options.deprecated;

        let responses = self.resolve_all_responses(&metadata);
        metadata.responses = ResponseListValidator {
            endpoint: &self.endpoint,
            metadata: &metadata,
        }
        .validate(responses)?;

        self.validate_request_http_spec(&metadata)?;
        for spec in &metadata.component_parsers {
            spec.component.validate(&metadata)?;
            spec.type_args.iter().try_for_each(Schema::check_definition)?;
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            method = %metadata.method,
            responses = ?metadata.responses.keys().map(StatusCode::as_u16).collect::<Vec<_>>(),
            "Built endpoint metadata"
        );
        Ok(metadata)
    }

    fn parsers(&self) -> HeronResult<ParserMap> {
        let parsers = self
            .payload
            .options()
            .parsers
            .clone()
            .filter(|parsers| !parsers.is_empty())
            .unwrap_or_else(|| self.defaults.parsers.clone());
        if parsers.is_empty() {
            return Err(HeronError::endpoint_metadata(format!(
                "'{}' must have at least one parser configured",
                self.endpoint
            )));
        }
        Ok(parsers)
    }

    fn renderers(&self) -> HeronResult<RendererMap> {
        let renderers = self
            .payload
            .options()
            .renderers
            .clone()
            .filter(|renderers| !renderers.is_empty())
            .unwrap_or_else(|| self.defaults.renderers.clone());
        if renderers.is_empty() {
            return Err(HeronError::endpoint_metadata(format!(
                "'{}' must have at least one renderer configured",
                self.endpoint
            )));
        }
        Ok(renderers)
    }

    fn auth(&self) -> Option<Vec<AuthProvider>> {
        let levels = [&self.payload.options().auth, &self.defaults.auth];
        if levels
            .iter()
            .any(|level| matches!(level, AuthConfig::Disabled))
        {
            return None;
        }
        let providers: Vec<AuthProvider> = levels
            .iter()
            .flat_map(|level| level.providers().iter().cloned())
            .collect();
        (!providers.is_empty()).then_some(providers)
    }

    fn validate_new_http_parts(&self, payload: &ModifyPayload) -> HeronResult<()> {
        let described_header = payload.headers.iter().flatten().any(|(_, header)| {
            matches!(header, ResponseHeader::Spec(spec) if !spec.schema_only)
        });
        if described_header {
            return Err(HeronError::endpoint_metadata(format!(
                "Since '{}' returns raw data, it is not possible to use `HeaderSpec` \
                 because there are no existing headers to describe. Use `NewHeader` \
                 to add new headers to the response. Or mark the `HeaderSpec` as schema_only",
                self.endpoint
            )));
        }
        let described_cookie = payload.cookies.iter().flatten().any(|(_, cookie)| {
            matches!(cookie, ResponseCookie::Spec(spec) if !spec.schema_only)
        });
        if described_cookie {
            return Err(HeronError::endpoint_metadata(format!(
                "Since '{}' returns raw data, it is not possible to use `CookieSpec` \
                 because there are no existing cookies to describe. Use `NewCookie` \
                 to add new cookies to the response. Or mark the `CookieSpec` as schema_only",
                self.endpoint
            )));
        }
        Ok(())
    }

    // Controller responses, then payload responses, then the modification,
    // then everything the providers contribute.
    fn resolve_all_responses(&self, metadata: &EndpointMetadata) -> Vec<ResponseSpec> {
        let mut all: Vec<ResponseSpec> = self
            .defaults
            .responses
            .iter()
            .chain(self.payload.responses())
            .cloned()
            .collect();
        if let Some(modification) = &metadata.modification {
            all.push(modification.to_spec());
        }
        let mut existing: IndexMap<StatusCode, ResponseSpec> = all
            .iter()
            .map(|spec| (spec.status_code, spec.clone()))
            .collect();
        all.extend(metadata.collect_response_specs(&mut existing));
        all
    }

    fn validate_request_http_spec(&self, metadata: &EndpointMetadata) -> HeronResult<()> {
        if metadata
            .no_validate_http_spec
            .contains(&HttpSpec::EmptyRequestBody)
        {
            return Ok(());
        }
        if !METHODS_WITHOUT_BODY.contains(&metadata.method.as_str())
            || !metadata.has_component("parsed_body")
        {
            return Ok(());
        }
        let method = metadata.method.to_uppercase();
        Err(HeronError::endpoint_metadata(format!(
            "HTTP method '{method}' cannot have a request body, but endpoint '{}' \
             uses Body component. Either remove Body component or use a different \
             HTTP method like POST, PUT, or PATCH.",
            self.endpoint
        )))
    }
}

struct ResponseListValidator<'a> {
    endpoint: &'a str,
    metadata: &'a EndpointMetadata,
}

impl ResponseListValidator<'_> {
    fn validate(
        &self,
        responses: Vec<ResponseSpec>,
    ) -> HeronResult<IndexMap<StatusCode, ResponseSpec>> {
        self.validate_unique_responses(&responses)?;
        for response in &responses {
            response.return_type.check_definition()?;
        }
        self.validate_header_descriptions(&responses)?;
        if !self
            .metadata
            .no_validate_http_spec
            .contains(&HttpSpec::EmptyResponseBody)
        {
            self.check_empty_response_body(&responses)?;
        }
        Ok(responses
            .into_iter()
            .map(|spec| (spec.status_code, spec))
            .collect())
    }

    fn validate_unique_responses(&self, responses: &[ResponseSpec]) -> HeronResult<()> {
        let mut unique: IndexMap<StatusCode, &ResponseSpec> = IndexMap::new();
        for response in responses {
            match unique.get(&response.status_code) {
                Some(existing) if *existing != response => {
                    return Err(HeronError::endpoint_metadata(format!(
                        "Endpoint '{}' has multiple responses for status_code={}, \
                         but with different metadata",
                        self.endpoint,
                        response.status_code.as_u16()
                    )));
                }
                Some(_) => {}
                None => {
                    unique.insert(response.status_code, response);
                }
            }
        }
        Ok(())
    }

    fn validate_header_descriptions(&self, responses: &[ResponseSpec]) -> HeronResult<()> {
        for response in responses {
            let names = response.headers.iter().flat_map(IndexMap::keys);
            for name in names {
                if name.eq_ignore_ascii_case("set-cookie") {
                    return Err(HeronError::endpoint_metadata(format!(
                        "Cannot use \"Set-Cookie\" header in response {}, use `cookies` \
                         instead in '{}'",
                        response.status_code.as_u16(),
                        self.endpoint
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_empty_response_body(&self, responses: &[ResponseSpec]) -> HeronResult<()> {
        for response in responses {
            let status = response.status_code;
            if is_bodyless(status) && !response.return_type.is_null() {
                return Err(HeronError::endpoint_metadata(format!(
                    "Can only return `None` not {} from an endpoint '{}' with status code {}",
                    response.return_type.type_name(),
                    self.endpoint,
                    status.as_u16()
                )));
            }
        }
        Ok(())
    }
}

/// Rejects duplicate operation ids among the endpoints of one controller.
///
/// # Errors
///
/// [`HeronError::EndpointMetadata`] naming the duplicated id.
pub fn validate_unique_operation_ids<'a>(
    controller: &str,
    endpoints: impl IntoIterator<Item = &'a EndpointMetadata>,
) -> HeronResult<()> {
    let mut seen = BTreeSet::new();
    for metadata in endpoints {
        let Some(operation_id) = &metadata.operation_id else {
            continue;
        };
        if !seen.insert(operation_id.as_str()) {
            return Err(HeronError::endpoint_metadata(format!(
                "Controller {controller} has duplicate operation_id {}",
                format_list([operation_id])
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{EndpointOptions, ModifyPayload, ValidatePayload};
    use heron_core::{HeaderSpec, HeronResult, NewHeader, Request, Schema};
    use heron_extract::{
        Body, FileMetadata, JsonParser, JsonRenderer, Parser, Renderer, SyncAuth,
    };
    use serde_json::Value;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Anonymous;

    impl SyncAuth for Anonymous {
        fn authenticate(&self, _request: &Request) -> HeronResult<Option<Value>> {
            Ok(Some(Value::Null))
        }
    }

    fn defaults() -> ControllerDefaults {
        let mut defaults = ControllerDefaults {
            validate_responses: true,
            ..ControllerDefaults::default()
        };
        defaults
            .parsers
            .insert("application/json".to_string(), Arc::new(JsonParser) as Arc<dyn Parser>);
        defaults
            .renderers
            .insert("application/json".to_string(), Arc::new(JsonRenderer) as Arc<dyn Renderer>);
        defaults
    }

    fn body() -> Vec<ComponentParserSpec> {
        vec![ComponentParserSpec::new(Arc::new(Body), vec![Schema::any()])]
    }

    fn build(payload: impl Into<Payload>, method: &str) -> HeronResult<EndpointMetadata> {
        let payload = payload.into();
        let defaults = defaults();
        EndpointMetadataBuilder::new("UserController.post", &payload, &defaults, &[]).build(method)
    }

    #[test]
    fn test_validate_method_name() {
        assert_eq!(validate_method_name("get", false).unwrap(), "get");
        assert_eq!(validate_method_name("meta", false).unwrap(), "options");
        assert_eq!(validate_method_name("query", true).unwrap(), "query");
        assert_eq!(
            validate_method_name("GET", true).unwrap_err().to_string(),
            "GET is not a valid HTTP method name"
        );
        assert!(validate_method_name("query", false).is_err());
    }

    #[test]
    fn test_modify_status_code_is_inferred() {
        let metadata = build(ModifyPayload::new(Schema::string()), "post").unwrap();
        let modification = metadata.modification.as_ref().unwrap();
        assert_eq!(modification.status_code, StatusCode::CREATED);
        let codes: Vec<u16> = metadata.responses.keys().map(StatusCode::as_u16).collect();
        assert_eq!(codes, [201, 422, 406]);

        let metadata = build(ModifyPayload::new(Schema::string()), "put").unwrap();
        assert_eq!(metadata.modification.unwrap().status_code, StatusCode::OK);
    }

    #[test]
    fn test_validate_requires_responses() {
        let err = build(ValidatePayload::default(), "get").unwrap_err();
        assert!(err.to_string().contains("has no configured responses"));

        let payload = ValidatePayload::new([ResponseSpec::new(Schema::null(), StatusCode::OK)]);
        let metadata = build(payload, "get").unwrap();
        assert!(metadata.modification.is_none());
        assert!(metadata.responses.contains_key(&StatusCode::OK));
    }

    #[test]
    fn test_duplicate_responses() {
        let payload = ValidatePayload::new([
            ResponseSpec::new(Schema::string(), StatusCode::OK),
            ResponseSpec::new(Schema::integer(), StatusCode::OK),
        ]);
        let err = build(payload, "get").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Endpoint 'UserController.post' has multiple responses for status_code=200, \
             but with different metadata"
        );

        let same = ResponseSpec::new(Schema::string(), StatusCode::OK);
        assert!(build(ValidatePayload::new([same.clone(), same]), "get").is_ok());
    }

    #[test]
    fn test_set_cookie_header_is_rejected() {
        let payload = ValidatePayload::new([ResponseSpec::new(Schema::null(), StatusCode::OK)
            .header("Set-Cookie", HeaderSpec::new())]);
        let err = build(payload, "get").unwrap_err();
        assert!(err.to_string().starts_with("Cannot use \"Set-Cookie\" header"));
    }

    #[test]
    fn test_raw_data_cannot_describe_headers() {
        let payload = ModifyPayload::new(Schema::string()).header("X-Total", HeaderSpec::new());
        let err = build(payload, "get").unwrap_err();
        assert!(err.to_string().contains("it is not possible to use `HeaderSpec`"));

        let payload = ModifyPayload::new(Schema::string())
            .header("X-Total", HeaderSpec::new().schema_only())
            .header("X-Source", NewHeader::new("heron"));
        assert!(build(payload, "get").is_ok());
    }

    #[test]
    fn test_empty_response_body() {
        let payload = ValidatePayload::new([ResponseSpec::new(Schema::string(), StatusCode::NO_CONTENT)]);
        let err = build(payload.clone(), "delete").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can only return `None` not str from an endpoint 'UserController.post' with status code 204"
        );

        let payload = payload.options(
            EndpointOptions::default().no_validate_http_spec(HttpSpec::EmptyResponseBody),
        );
        assert!(build(payload, "delete").is_ok());
    }

    #[test]
    fn test_empty_request_body() {
        let payload: Payload = ModifyPayload::new(Schema::string()).into();
        let defaults = defaults();
        let components = body();
        let err = EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &components)
            .build("get")
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("HTTP method 'GET' cannot have a request body"));

        assert!(EndpointMetadataBuilder::new("Users.post", &payload, &defaults, &components)
            .build("post")
            .is_ok());

        let payload: Payload = ModifyPayload::new(Schema::string())
            .options(EndpointOptions::default().no_validate_http_spec(HttpSpec::EmptyRequestBody))
            .into();
        assert!(EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &components)
            .build("get")
            .is_ok());
    }

    #[test]
    fn test_parsers_and_renderers_are_required() {
        let payload: Payload = ModifyPayload::new(Schema::string()).into();
        let defaults = ControllerDefaults::default();
        let err = EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &[])
            .build("get")
            .unwrap_err();
        assert_eq!(err.to_string(), "'Users.get' must have at least one parser configured");

        let payload: Payload = ModifyPayload::new(Schema::string())
            .options(EndpointOptions::default().parser(JsonParser))
            .into();
        let err = EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &[])
            .build("get")
            .unwrap_err();
        assert_eq!(err.to_string(), "'Users.get' must have at least one renderer configured");
    }

    #[test]
    fn test_auth_levels() {
        let mut defaults = defaults();
        defaults.auth = AuthConfig::Providers(vec![AuthProvider::sync(Anonymous)]);
        let payload: Payload = ModifyPayload::new(Schema::string())
            .options(EndpointOptions::default().auth(AuthProvider::sync(Anonymous)))
            .into();
        let metadata = EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &[])
            .build("get")
            .unwrap();
        assert_eq!(metadata.auth.as_ref().map(Vec::len), Some(2));
        assert!(metadata.responses.contains_key(&StatusCode::UNAUTHORIZED));

        let payload: Payload = ModifyPayload::new(Schema::string())
            .options(EndpointOptions::default().no_auth())
            .into();
        let metadata = EndpointMetadataBuilder::new("Users.get", &payload, &defaults, &[])
            .build("get")
            .unwrap();
        assert!(metadata.auth.is_none());
        assert!(!metadata.responses.contains_key(&StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_invalid_patterns_fail_the_build() {
        let code = Schema::string().pattern("([a-z");
        let err = build(ModifyPayload::new(code.clone()), "post").unwrap_err();
        assert!(err.to_string().starts_with("Invalid pattern '([a-z'"));

        let payload: Payload = ModifyPayload::new(Schema::string()).into();
        let defaults = defaults();
        let components = vec![ComponentParserSpec::new(Arc::new(Body), vec![code])];
        let err = EndpointMetadataBuilder::new("Code.post", &payload, &defaults, &components)
            .build("post")
            .unwrap_err();
        assert!(matches!(err, HeronError::EndpointMetadata { .. }));
    }

    #[test]
    fn test_component_validation_runs() {
        let payload: Payload = ModifyPayload::new(Schema::string()).into();
        let defaults = defaults();
        let components = vec![ComponentParserSpec::new(Arc::new(FileMetadata), vec![Schema::any()])];
        let err = EndpointMetadataBuilder::new("Upload.post", &payload, &defaults, &components)
            .build("post")
            .unwrap_err();
        assert!(err.to_string().starts_with("Component FileMetadata requires"));
    }

    #[test]
    fn test_custom_methods_from_controller() {
        let mut defaults = defaults();
        defaults.allowed_http_methods.insert("query".to_string());
        let payload: Payload = ModifyPayload::new(Schema::string()).into();
        let metadata = EndpointMetadataBuilder::new("Search.query", &payload, &defaults, &[])
            .build("query")
            .unwrap();
        assert_eq!(metadata.method, "query");
    }

    #[test]
    fn test_unique_operation_ids() {
        let options = EndpointOptions::default().operation_id("list_users");
        let first = build(ModifyPayload::new(Schema::string()).options(options.clone()), "get").unwrap();
        let second = build(ModifyPayload::new(Schema::string()).options(options), "post").unwrap();
        let err = validate_unique_operation_ids("Users", [&first, &second]).unwrap_err();
        assert_eq!(err.to_string(), "Controller Users has duplicate operation_id ['list_users']");
        assert!(validate_unique_operation_ids("Users", [&first]).is_ok());
    }
}
