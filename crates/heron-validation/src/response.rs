//! Response validation.
//!
//! [`ResponseValidator`] checks what an endpoint produced against the
//! [`ResponseSpec`] declared for its status code. Native responses are
//! re-parsed with the negotiation machinery used for requests; raw values
//! are checked before they are rendered.
//!
//! Every violation is a [`HeronError::ResponseSchema`]: the endpoint broke
//! its own contract, the client did nothing wrong.

use bytes::Bytes;
use heron_core::media::media_by_precedence;
use heron_core::{
    format_list, HeronError, HeronResult, MediaType, NewCookie, Request, Response,
    ResponseModification, ResponseSpec,
};
use heron_extract::{
    request_renderer, response_validation_parser, EndpointMetadata, Renderer, Serializer,
};
use http::StatusCode;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Validates produced responses of one endpoint.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    metadata: Arc<EndpointMetadata>,
    serializer: Arc<dyn Serializer>,
    strict_validation: bool,
}

impl ResponseValidator {
    /// Creates a strict validator.
    #[must_use]
    pub fn new(metadata: Arc<EndpointMetadata>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            metadata,
            serializer,
            strict_validation: true,
        }
    }

    /// Sets strictness of body validation.
    #[must_use]
    pub fn strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Metadata this validator checks against.
    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }

    /// Validates a native response.
    ///
    /// Checks run in order: status code, body, headers, cookies, content
    /// type. The first failure wins.
    ///
    /// # Errors
    ///
    /// [`HeronError::ResponseSchema`] on any contract violation.
    pub fn validate_response(&self, request: &Request, response: Response) -> HeronResult<Response> {
        if !self.metadata.validate_responses {
            return Ok(response);
        }
        match self.check_response(request, &response) {
            Ok(()) => Ok(response),
            Err(err) => {
                tracing::error!(
                    request_id = %request.request_id(),
                    method = %self.metadata.method,
                    status = response.status().as_u16(),
                    error = %err,
                    "Response does not match its declared schema"
                );
                Err(err)
            }
        }
    }

    /// Validates a raw value returned by a modify endpoint.
    ///
    /// Returns everything needed to render it. The renderer must already be
    /// negotiated for `request`.
    ///
    /// # Errors
    ///
    /// [`HeronError::InternalServer`] when the endpoint has no modification
    /// or no renderer was negotiated, [`HeronError::ResponseSchema`] when
    /// `raw_data` does not match the declared body.
    pub fn validate_modification(
        &self,
        request: &Request,
        raw_data: Value,
    ) -> HeronResult<ModificationContext> {
        let Some(modification) = &self.metadata.modification else {
            return Err(HeronError::internal(format!(
                "Endpoint '{}' returned raw data without associated modification",
                self.metadata.method
            )));
        };
        let renderer = request_renderer(request).ok_or_else(|| {
            HeronError::internal("Raw data cannot be validated before renderer negotiation")
        })?;
        let context = ModificationContext {
            raw_data,
            status_code: modification.status_code,
            headers: build_headers(modification, renderer.as_ref()),
            cookies: modification.actionable_cookies(),
            renderer,
        };
        if !self.metadata.validate_responses {
            return Ok(context);
        }
        let spec = self.response_spec(context.status_code)?;
        if let Err(err) = self.validate_body(&context.raw_data, spec, context.renderer.content_type()) {
            tracing::error!(
                request_id = %request.request_id(),
                method = %self.metadata.method,
                status = context.status_code.as_u16(),
                error = %err,
                "Returned data does not match its declared schema"
            );
            return Err(err);
        }
        Ok(context)
    }

    fn check_response(&self, request: &Request, response: &Response) -> HeronResult<()> {
        let spec = self.response_spec(response.status())?;
        let renderer = request_renderer(request);
        let parser = response_validation_parser(
            response.content_type(),
            renderer.as_ref(),
            &self.metadata.parsers,
        )
        .ok_or_else(|| HeronError::internal("No parser can read the response body back"))?;
        let structured = self
            .serializer
            .deserialize(response.body(), parser.as_ref(), request, &spec.return_type)
            .map_err(|err| {
                HeronError::response_schema(format!("Response body cannot be parsed: {err}"))
            })?;
        let content_type = renderer
            .as_ref()
            .map_or_else(|| parser.content_type(), |renderer| renderer.content_type());
        self.validate_body(&structured, spec, content_type)?;
        validate_headers(response, spec)?;
        validate_cookies(response, spec)?;
        if is_bodyless(response.status())
            && response.body().is_empty()
            && response.content_type().is_none()
        {
            return Ok(());
        }
        self.validate_content_type(response)
    }

    fn response_spec(&self, status: StatusCode) -> HeronResult<&ResponseSpec> {
        self.metadata.responses.get(&status).ok_or_else(|| {
            let allowed: Vec<String> = self
                .metadata
                .responses
                .keys()
                .map(|code| code.as_u16().to_string())
                .collect();
            HeronError::response_schema(format!(
                "Returned status code {} is not specified in the list of allowed status codes: [{}]",
                status.as_u16(),
                allowed.join(", ")
            ))
        })
    }

    fn validate_body(&self, structured: &Value, spec: &ResponseSpec, content_type: &str) -> HeronResult<()> {
        let essence = MediaType::parse(content_type).essence();
        if let Some(allowed) = &spec.limit_to_content_types {
            let listed = allowed
                .iter()
                .any(|limit| MediaType::parse(limit).essence() == essence);
            if !listed {
                return Err(HeronError::response_schema(format!(
                    "Response {} is not allowed for '{content_type}', only for {}",
                    spec.status_code.as_u16(),
                    format_list(allowed)
                )));
            }
        }

        let model = match spec.return_type.conditional_types() {
            Some(mapping) => mapping
                .iter()
                .find(|(declared, _)| MediaType::parse(declared).essence() == essence)
                .map(|(_, model)| model)
                .ok_or_else(|| {
                    HeronError::response_schema(format!(
                        "Content-Type '{content_type}' is not listed in supported content types {}",
                        format_list(mapping.keys())
                    ))
                })?,
            None => &spec.return_type,
        };

        self.serializer
            .from_value(structured, model, Some(self.strict_validation))
            .map(|_| ())
            .map_err(|errors| {
                HeronError::response_body_schema(self.serializer.serialize_validation_error(errors))
            })
    }

    fn validate_content_type(&self, response: &Response) -> HeronResult<()> {
        let content_type = response.content_type().unwrap_or_default();
        let listed = media_by_precedence(self.metadata.renderers.keys())
            .iter()
            .any(|media| media.matches_str(content_type));
        if listed {
            return Ok(());
        }
        Err(HeronError::response_schema(format!(
            "Response content type '{content_type}' is not listed as a possible to be returned {}",
            format_list(self.metadata.renderers.keys())
        )))
    }
}

fn validate_headers(response: &Response, spec: &ResponseSpec) -> HeronResult<()> {
    let present: BTreeSet<String> = response
        .headers()
        .keys()
        .map(|name| name.as_str().to_lowercase())
        .collect();
    let described = spec.headers.iter().flatten();

    let missing: BTreeSet<String> = described
        .clone()
        .filter(|(_, header)| header.required && !header.schema_only)
        .map(|(name, _)| name.to_lowercase())
        .filter(|name| !present.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(HeronError::response_schema(format!(
            "Response has missing required {} headers",
            format_list(&missing)
        )));
    }

    let known: BTreeSet<String> = described
        .filter(|(_, header)| !header.schema_only)
        .map(|(name, _)| name.to_lowercase())
        .collect();
    let extra: BTreeSet<&String> = present
        .iter()
        .filter(|name| *name != "content-type" && !known.contains(*name))
        .collect();
    if !extra.is_empty() {
        return Err(HeronError::response_schema(format!(
            "Response has extra undescribed {} headers",
            format_list(extra)
        )));
    }
    Ok(())
}

// Cookie names are case sensitive.
fn validate_cookies(response: &Response, spec: &ResponseSpec) -> HeronResult<()> {
    let present = response.cookies();
    let described = spec.cookies.iter().flatten();

    let missing: BTreeSet<&String> = described
        .clone()
        .filter(|(name, cookie)| cookie.required && !cookie.schema_only && !present.contains_key(*name))
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        return Err(HeronError::response_schema(format!(
            "Response has missing required {} cookie",
            format_list(missing)
        )));
    }

    let known: IndexMap<&String, _> = described
        .filter(|(_, cookie)| !cookie.schema_only)
        .collect();
    let extra: BTreeSet<&String> = present
        .keys()
        .filter(|name| !known.contains_key(name))
        .collect();
    if !extra.is_empty() {
        return Err(HeronError::response_schema(format!(
            "Response has extra undescribed {} cookies",
            format_list(extra)
        )));
    }

    for (name, cookie) in present {
        if let Some(expected) = known.get(name) {
            if !expected.is_equal(cookie) {
                return Err(HeronError::response_schema(format!(
                    "Response cookie {name}={cookie:?} is not equal to {expected:?}"
                )));
            }
        }
    }
    Ok(())
}

/// Headers set on responses built from raw data.
///
/// Every actionable header of `modification`, plus `Content-Type` of the
/// negotiated renderer.
pub fn build_headers(
    modification: &ResponseModification,
    renderer: &dyn Renderer,
) -> IndexMap<String, String> {
    let mut headers: IndexMap<String, String> = modification
        .actionable_headers()
        .into_iter()
        .flatten()
        .map(|(name, header)| (name, header.value))
        .collect();
    headers.insert("Content-Type".to_string(), renderer.content_type().to_string());
    headers
}

/// Validated raw data with everything needed to render it.
#[derive(Clone)]
pub struct ModificationContext {
    /// Value returned by the endpoint.
    pub raw_data: Value,
    /// Status code of the built response.
    pub status_code: StatusCode,
    /// Headers to set.
    pub headers: IndexMap<String, String>,
    /// Cookies to set.
    pub cookies: Option<IndexMap<String, NewCookie>>,
    /// Negotiated renderer.
    pub renderer: Arc<dyn Renderer>,
}

impl fmt::Debug for ModificationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModificationContext")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("renderer", &self.renderer.content_type())
            .finish_non_exhaustive()
    }
}

impl ModificationContext {
    /// Renders the response.
    ///
    /// `null` returned with a bodyless status code renders an empty body.
    ///
    /// # Errors
    ///
    /// Fails when rendering fails or a header is invalid.
    pub fn into_response(self, serializer: &dyn Serializer) -> HeronResult<Response> {
        let body = if is_bodyless(self.status_code) && self.raw_data.is_null() {
            Bytes::new()
        } else {
            serializer.serialize(&self.raw_data, self.renderer.as_ref())?
        };
        let mut response = Response::new(self.status_code).with_body(body);
        for (name, value) in &self.headers {
            response = response.try_header(name, value)?;
        }
        for (name, cookie) in self.cookies.into_iter().flatten() {
            response = response.with_cookie(name, cookie);
        }
        Ok(response)
    }
}

/// Status codes that never carry a body.
pub(crate) fn is_bodyless(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}
