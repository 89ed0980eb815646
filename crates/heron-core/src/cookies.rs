//! Response cookie descriptions.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// `Lax`.
    #[default]
    Lax,
    /// `Strict`.
    Strict,
    /// `None`.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        })
    }
}

/// Attributes shared by [`CookieSpec`] and [`NewCookie`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieAttrs {
    /// Path the cookie is valid for.
    #[serde(default = "default_path")]
    pub path: String,
    /// `Max-Age` in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    /// Seconds from now until the cookie expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    /// Domain the cookie is valid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Only sent over https.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// Hidden from scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub httponly: Option<bool>,
    /// Cross-site policy.
    #[serde(default)]
    pub samesite: SameSite,
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for CookieAttrs {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_age: None,
            expires: None,
            domain: None,
            secure: None,
            httponly: None,
            samesite: SameSite::Lax,
        }
    }
}

impl CookieAttrs {
    /// Compares attributes that can be checked on a produced response.
    ///
    /// `expires` is relative to the current time and is skipped. Missing
    /// flags equal `false`.
    fn same_as(&self, other: &Self) -> bool {
        self.path == other.path
            && self.max_age == other.max_age
            && self.domain.as_deref().unwrap_or_default() == other.domain.as_deref().unwrap_or_default()
            && self.secure.unwrap_or(false) == other.secure.unwrap_or(false)
            && self.httponly.unwrap_or(false) == other.httponly.unwrap_or(false)
            && self.samesite == other.samesite
    }
}

/// Description of a cookie a response sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSpec {
    /// Cookie attributes.
    #[serde(flatten)]
    pub attrs: CookieAttrs,
    /// Documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The cookie must be set.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Only documented, never checked at runtime.
    #[serde(default)]
    pub schema_only: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for CookieSpec {
    fn default() -> Self {
        Self {
            attrs: CookieAttrs::default(),
            description: None,
            required: true,
            schema_only: false,
        }
    }
}

impl CookieSpec {
    /// Creates a required cookie spec with default attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets attributes.
    #[must_use]
    pub fn attrs(mut self, attrs: CookieAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the cookie as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Marks the cookie as documentation only.
    #[must_use]
    pub fn schema_only(mut self) -> Self {
        self.schema_only = true;
        self
    }

    /// Returns `true` when `cookie` carries the described attributes.
    pub fn is_equal(&self, cookie: &NewCookie) -> bool {
        self.attrs.same_as(&cookie.attrs)
    }
}

/// A cookie to set on a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCookie {
    /// Cookie value.
    pub value: String,
    /// Cookie attributes.
    #[serde(flatten)]
    pub attrs: CookieAttrs,
}

impl NewCookie {
    /// Creates a cookie with default attributes.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            attrs: CookieAttrs::default(),
        }
    }

    /// Sets attributes.
    #[must_use]
    pub fn attrs(mut self, attrs: CookieAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Converts into a required [`CookieSpec`].
    pub fn to_spec(&self) -> CookieSpec {
        CookieSpec {
            attrs: self.attrs.clone(),
            ..CookieSpec::default()
        }
    }

    /// Renders the `Set-Cookie` header value for cookie `name`.
    pub fn to_header_value(&self, name: &str) -> String {
        let mut out = format!("{name}={}; Path={}", self.value, self.attrs.path);
        if let Some(max_age) = self.attrs.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(expires) = self.attrs.expires {
            let at = Utc::now() + Duration::seconds(expires);
            out.push_str(&format!(
                "; Expires={}",
                at.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        if let Some(domain) = &self.attrs.domain {
            out.push_str(&format!("; Domain={domain}"));
        }
        if self.attrs.secure == Some(true) {
            out.push_str("; Secure");
        }
        if self.attrs.httponly == Some(true) {
            out.push_str("; HttpOnly");
        }
        out.push_str(&format!("; SameSite={}", self.attrs.samesite));
        out
    }
}
