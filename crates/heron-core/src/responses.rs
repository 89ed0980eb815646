//! Response descriptions.
//!
//! A [`ResponseSpec`] documents one possible response of an endpoint and is
//! the unit of response validation. A [`ResponseModification`] describes how
//! raw return values are turned into a response.

use crate::cookies::{CookieSpec, NewCookie};
use crate::headers::{HeaderSpec, NewHeader, ResponseHeader};
use crate::schema::Schema;
use http::StatusCode;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// One documented and validated response.
///
/// Only [`HeaderSpec`] and [`CookieSpec`] can appear here: a spec describes
/// a response that already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// Body model.
    pub return_type: Schema,
    /// Status code.
    pub status_code: StatusCode,
    /// Headers of this response.
    pub headers: Option<IndexMap<String, HeaderSpec>>,
    /// Cookies of this response.
    pub cookies: Option<IndexMap<String, CookieSpec>>,
    /// What this response means.
    pub description: Option<String>,
    /// Content types this response can be rendered with. `None` means all.
    pub limit_to_content_types: Option<BTreeSet<String>>,
}

impl ResponseSpec {
    /// Creates a spec without headers or cookies.
    #[must_use]
    pub fn new(return_type: Schema, status_code: StatusCode) -> Self {
        Self {
            return_type,
            status_code,
            headers: None,
            cookies: None,
            description: None,
            limit_to_content_types: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, spec: HeaderSpec) -> Self {
        self.headers
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), spec);
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, spec: CookieSpec) -> Self {
        self.cookies
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), spec);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts the content types this response can use.
    #[must_use]
    pub fn limit_to_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.limit_to_content_types = Some(content_types.into_iter().map(Into::into).collect());
        self
    }
}

/// Either kind of response cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCookie {
    /// Cookie to set.
    New(NewCookie),
    /// Cookie to describe.
    Spec(CookieSpec),
}

impl ResponseCookie {
    /// `true` for cookies the framework sets itself.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::New(_))
    }

    /// Description of this cookie.
    pub fn to_spec(&self) -> CookieSpec {
        match self {
            Self::New(cookie) => cookie.to_spec(),
            Self::Spec(spec) => spec.clone(),
        }
    }
}

impl From<NewCookie> for ResponseCookie {
    fn from(cookie: NewCookie) -> Self {
        Self::New(cookie)
    }
}

impl From<CookieSpec> for ResponseCookie {
    fn from(spec: CookieSpec) -> Self {
        Self::Spec(spec)
    }
}

/// How raw return values become a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseModification {
    /// Body model.
    pub return_type: Schema,
    /// Status code of the built response.
    pub status_code: StatusCode,
    /// Headers to add or describe.
    pub headers: Option<IndexMap<String, ResponseHeader>>,
    /// Cookies to add or describe.
    pub cookies: Option<IndexMap<String, ResponseCookie>>,
}

impl ResponseModification {
    /// Creates a modification without headers or cookies.
    #[must_use]
    pub fn new(return_type: Schema, status_code: StatusCode) -> Self {
        Self {
            return_type,
            status_code,
            headers: None,
            cookies: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, header: impl Into<ResponseHeader>) -> Self {
        self.headers
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), header.into());
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, cookie: impl Into<ResponseCookie>) -> Self {
        self.cookies
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), cookie.into());
        self
    }

    /// Converts into a response description.
    pub fn to_spec(&self) -> ResponseSpec {
        ResponseSpec {
            return_type: self.return_type.clone(),
            status_code: self.status_code,
            headers: self.headers.as_ref().map(|headers| {
                headers
                    .iter()
                    .map(|(name, header)| (name.clone(), header.to_spec()))
                    .collect()
            }),
            cookies: self.cookies.as_ref().map(|cookies| {
                cookies
                    .iter()
                    .map(|(name, cookie)| (name.clone(), cookie.to_spec()))
                    .collect()
            }),
            description: None,
            limit_to_content_types: None,
        }
    }

    /// Headers that must be added to the response.
    pub fn actionable_headers(&self) -> Option<IndexMap<String, NewHeader>> {
        self.headers.as_ref().map(|headers| {
            headers
                .iter()
                .filter_map(|(name, header)| match header {
                    ResponseHeader::New(new) => Some((name.clone(), new.clone())),
                    ResponseHeader::Spec(_) => None,
                })
                .collect()
        })
    }

    /// Cookies that must be added to the response.
    pub fn actionable_cookies(&self) -> Option<IndexMap<String, NewCookie>> {
        self.cookies.as_ref().map(|cookies| {
            cookies
                .iter()
                .filter_map(|(name, cookie)| match cookie {
                    ResponseCookie::New(new) => Some((name.clone(), new.clone())),
                    ResponseCookie::Spec(_) => None,
                })
                .collect()
        })
    }
}
