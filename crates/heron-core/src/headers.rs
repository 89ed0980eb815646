//! Response header descriptions.
//!
//! [`NewHeader`] adds a header to a response the framework builds.
//! [`HeaderSpec`] describes a header an existing response already carries.

use serde::{Deserialize, Serialize};

/// A header that is added to responses built from raw return values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHeader {
    /// Value to set.
    pub value: String,
    /// Documentation for this header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this header is deprecated.
    #[serde(default)]
    pub deprecated: bool,
    /// Example value for documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl NewHeader {
    /// Creates a header with `value`.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
            deprecated: false,
            example: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Converts into a required [`HeaderSpec`].
    pub fn to_spec(&self) -> HeaderSpec {
        HeaderSpec {
            description: self.description.clone(),
            deprecated: self.deprecated,
            example: self.example.clone(),
            required: true,
            schema_only: false,
        }
    }
}

/// A header that already exists on a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpec {
    /// Documentation for this header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this header is deprecated.
    #[serde(default)]
    pub deprecated: bool,
    /// Example value for documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// The header must be present.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Only documented, never checked at runtime. Useful for headers set
    /// later by a proxy or outer middleware.
    #[serde(default)]
    pub schema_only: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for HeaderSpec {
    fn default() -> Self {
        Self {
            description: None,
            deprecated: false,
            example: None,
            required: true,
            schema_only: false,
        }
    }
}

impl HeaderSpec {
    /// Creates a required header spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the header as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Marks the header as documentation only.
    #[must_use]
    pub fn schema_only(mut self) -> Self {
        self.schema_only = true;
        self
    }
}

/// Either kind of response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHeader {
    /// Header to add.
    New(NewHeader),
    /// Header to describe.
    Spec(HeaderSpec),
}

impl ResponseHeader {
    /// `true` for headers the framework sets itself.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::New(_))
    }

    /// Description of this header.
    pub fn to_spec(&self) -> HeaderSpec {
        match self {
            Self::New(header) => header.to_spec(),
            Self::Spec(spec) => spec.clone(),
        }
    }
}

impl From<NewHeader> for ResponseHeader {
    fn from(header: NewHeader) -> Self {
        Self::New(header)
    }
}

impl From<HeaderSpec> for ResponseHeader {
    fn from(spec: HeaderSpec) -> Self {
        Self::Spec(spec)
    }
}
