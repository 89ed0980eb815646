//! Structural schemas.
//!
//! A [`Schema`] describes the shape of a request component or a response
//! body. Endpoints never see Rust types at the contract layer: every model is
//! a `Schema`, and validation turns untyped [`serde_json::Value`] input into
//! coerced output or a list of [`ErrorDetail`]s.
//!
//! # Example
//!
//! ```
//! use heron_core::schema::Schema;
//! use serde_json::json;
//!
//! let user: Schema = Schema::object("UserCreateModel")
//!     .field("email", Schema::string())
//!     .field("age", Schema::integer())
//!     .into();
//!
//! let out = user.validate(&json!({"email": "a@b.com", "age": "1"}), None).unwrap();
//! assert_eq!(out, json!({"email": "a@b.com", "age": 1}));
//!
//! let errors = user.validate(&json!({"age": 1}), None).unwrap_err();
//! assert_eq!(errors[0].kind, "missing");
//! ```

use crate::error::{ErrorDetail, HeronError, HeronResult, LocItem};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::fmt;

/// A structural model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    /// String type.
    String {
        /// Minimum length in characters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        /// Maximum length in characters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Regex the value must match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },
    /// Integer type.
    Integer {
        /// Minimum value (inclusive).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        /// Maximum value (inclusive).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// Number (float) type.
    Number {
        /// Minimum value (inclusive).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Maximum value (inclusive).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// Boolean type.
    Boolean,
    /// Only `null` is accepted. Used for empty bodies.
    Null,
    /// Anything is accepted unchanged.
    Any,
    /// Exactly one value.
    Literal {
        /// The accepted value.
        value: Value,
    },
    /// Homogeneous list.
    Array {
        /// Schema of each item.
        items: Box<Schema>,
        /// Minimum number of items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        /// Maximum number of items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    /// Named object with fields.
    Object(ObjectSchema),
    /// First matching variant wins.
    Union {
        /// Variants, tried in order.
        variants: Vec<Schema>,
    },
    /// `null` or the inner schema.
    Optional {
        /// Schema used for non-null values.
        inner: Box<Schema>,
    },
    /// A model that depends on the content type of the request or response.
    ///
    /// Build it with [`Schema::conditional`].
    Conditional {
        /// Content type to schema.
        mapping: IndexMap<String, Schema>,
    },
}

/// A string pattern, compiled once when the model is built.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl Pattern {
    /// Compiles `source`.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&source);
        Self { source, compiled }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled regex.
    ///
    /// # Errors
    ///
    /// [`HeronError::EndpointMetadata`] when the source is not a valid regex.
    pub fn regex(&self) -> HeronResult<&Regex> {
        self.compiled.as_ref().map_err(|err| {
            HeronError::endpoint_metadata(format!("Invalid pattern '{}': {err}", self.source))
        })
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = Self::new(String::deserialize(deserializer)?);
        if let Err(err) = pattern.regex() {
            return Err(serde::de::Error::custom(err));
        }
        Ok(pattern)
    }
}

/// An object model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Model name, used in error messages and union locations.
    pub name: String,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    /// Keys whose multi-valued wire representation is kept as a list.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub force_list: BTreeSet<String>,
    /// Strictness of this model, unless the caller forces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Reject keys that are not declared.
    #[serde(default)]
    pub deny_unknown: bool,
}

/// One field of an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field schema.
    pub schema: Schema,
    /// Missing required fields are an error.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Key used on the wire instead of the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Value used when the field is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

const fn default_required() -> bool {
    true
}

impl Field {
    /// Creates a required field.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            required: true,
            alias: None,
            default: None,
        }
    }

    /// Marks the field as not required.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets a default value, which also makes the field not required.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    /// Sets the wire key.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Key used to look the field up in input data.
    pub fn wire_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias.as_deref().unwrap_or(name)
    }
}

impl From<Schema> for Field {
    fn from(schema: Schema) -> Self {
        Self::new(schema)
    }
}

impl ObjectSchema {
    /// Creates an empty object model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            force_list: BTreeSet::new(),
            strict: None,
            deny_unknown: false,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Keeps every value of these keys when the wire format is multi-valued.
    #[must_use]
    pub fn force_list<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.force_list.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets model strictness.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Rejects undeclared keys.
    #[must_use]
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    /// Looks up a field by its wire key or name.
    pub fn find_field(&self, key: &str) -> Option<(&str, &Field)> {
        self.fields
            .iter()
            .find(|(name, field)| field.wire_name(name) == key || name.as_str() == key)
            .map(|(name, field)| (name.as_str(), field))
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        Self::Object(object)
    }
}

impl Schema {
    /// String schema.
    #[must_use]
    pub const fn string() -> Self {
        Self::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Integer schema.
    #[must_use]
    pub const fn integer() -> Self {
        Self::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// Number schema.
    #[must_use]
    pub const fn number() -> Self {
        Self::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// Boolean schema.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::Boolean
    }

    /// Null schema.
    #[must_use]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Schema that accepts anything.
    #[must_use]
    pub const fn any() -> Self {
        Self::Any
    }

    /// Literal schema.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// List schema.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// Object schema builder.
    #[must_use]
    pub fn object(name: impl Into<String>) -> ObjectSchema {
        ObjectSchema::new(name)
    }

    /// Union schema.
    #[must_use]
    pub fn union(variants: Vec<Schema>) -> Self {
        Self::Union { variants }
    }

    /// Optional schema.
    #[must_use]
    pub fn optional(inner: Schema) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// Content-type conditional schema.
    ///
    /// # Errors
    ///
    /// Fails when fewer than two content types are given.
    pub fn conditional<I, S>(mapping: I) -> HeronResult<Self>
    where
        I: IntoIterator<Item = (S, Schema)>,
        S: Into<String>,
    {
        let mapping: IndexMap<String, Schema> = mapping
            .into_iter()
            .map(|(content_type, schema)| (content_type.into(), schema))
            .collect();
        if mapping.len() < 2 {
            let shown: Vec<String> = mapping
                .iter()
                .map(|(content_type, schema)| format!("'{content_type}': {schema}"))
                .collect();
            return Err(HeronError::endpoint_metadata(format!(
                "conditional_type must be called with a mapping of length >= 2, got {{{}}}",
                shown.join(", ")
            )));
        }
        Ok(Self::Conditional { mapping })
    }

    /// Sets the minimum length for string schemas.
    #[must_use]
    pub fn min_length(self, len: usize) -> Self {
        match self {
            Self::String {
                max_length,
                pattern,
                ..
            } => Self::String {
                min_length: Some(len),
                max_length,
                pattern,
            },
            other => other,
        }
    }

    /// Sets the maximum length for string schemas.
    #[must_use]
    pub fn max_length(self, len: usize) -> Self {
        match self {
            Self::String {
                min_length,
                pattern,
                ..
            } => Self::String {
                min_length,
                max_length: Some(len),
                pattern,
            },
            other => other,
        }
    }

    /// Sets the pattern for string schemas.
    ///
    /// The regex is compiled here. A malformed one is reported by
    /// [`Schema::check_definition`].
    #[must_use]
    pub fn pattern(self, regex: impl Into<String>) -> Self {
        match self {
            Self::String {
                min_length,
                max_length,
                ..
            } => Self::String {
                min_length,
                max_length,
                pattern: Some(Pattern::new(regex)),
            },
            other => other,
        }
    }

    /// Sets the minimum for integer schemas.
    #[must_use]
    pub fn minimum_int(self, min: i64) -> Self {
        match self {
            Self::Integer { maximum, .. } => Self::Integer {
                minimum: Some(min),
                maximum,
            },
            other => other,
        }
    }

    /// Sets the maximum for integer schemas.
    #[must_use]
    pub fn maximum_int(self, max: i64) -> Self {
        match self {
            Self::Integer { minimum, .. } => Self::Integer {
                minimum,
                maximum: Some(max),
            },
            other => other,
        }
    }

    /// Sets the minimum for number schemas.
    #[must_use]
    pub fn minimum_number(self, min: f64) -> Self {
        match self {
            Self::Number { maximum, .. } => Self::Number {
                minimum: Some(min),
                maximum,
            },
            other => other,
        }
    }

    /// Sets the maximum for number schemas.
    #[must_use]
    pub fn maximum_number(self, max: f64) -> Self {
        match self {
            Self::Number { minimum, .. } => Self::Number {
                minimum,
                maximum: Some(max),
            },
            other => other,
        }
    }

    /// Sets the minimum item count for array schemas.
    #[must_use]
    pub fn min_items(self, count: usize) -> Self {
        match self {
            Self::Array {
                items, max_items, ..
            } => Self::Array {
                items,
                min_items: Some(count),
                max_items,
            },
            other => other,
        }
    }

    /// Sets the maximum item count for array schemas.
    #[must_use]
    pub fn max_items(self, count: usize) -> Self {
        match self {
            Self::Array {
                items, min_items, ..
            } => Self::Array {
                items,
                min_items,
                max_items: Some(count),
            },
            other => other,
        }
    }

    /// Returns the content type mapping of a conditional schema.
    pub fn conditional_types(&self) -> Option<&IndexMap<String, Schema>> {
        match self {
            Self::Conditional { mapping } => Some(mapping),
            _ => None,
        }
    }

    /// Returns the object model, if this is one.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns `true` for the empty body schema.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Checks the model itself, before any value is validated.
    ///
    /// # Errors
    ///
    /// [`HeronError::EndpointMetadata`] for a string pattern that is not a
    /// valid regex, anywhere in the model.
    pub fn check_definition(&self) -> HeronResult<()> {
        match self {
            Self::String {
                pattern: Some(pattern),
                ..
            } => pattern.regex().map(|_| ()),
            Self::Array { items, .. } => items.check_definition(),
            Self::Optional { inner } => inner.check_definition(),
            Self::Object(object) => object
                .fields
                .values()
                .try_for_each(|field| field.schema.check_definition()),
            Self::Union { variants } => variants.iter().try_for_each(Self::check_definition),
            Self::Conditional { mapping } => mapping.values().try_for_each(Self::check_definition),
            _ => Ok(()),
        }
    }

    /// Keys that must be kept as lists when read from multi-valued sources.
    ///
    /// Unions, optionals and conditionals merge the keys of their members.
    pub fn force_list_keys(&self) -> BTreeSet<String> {
        match self {
            Self::Object(object) => object.force_list.clone(),
            Self::Optional { inner } => inner.force_list_keys(),
            Self::Union { variants } => variants.iter().flat_map(Self::force_list_keys).collect(),
            Self::Conditional { mapping } => {
                mapping.values().flat_map(Self::force_list_keys).collect()
            }
            _ => BTreeSet::new(),
        }
    }

    /// Returns `true` if `key` is forced to stay a list.
    pub fn is_forced_list(&self, key: &str) -> bool {
        self.force_list_keys().contains(key)
    }

    /// Returns the short type name used in messages and union locations.
    pub fn type_name(&self) -> String {
        match self {
            Self::String { .. } => "str".to_string(),
            Self::Integer { .. } => "int".to_string(),
            Self::Number { .. } => "float".to_string(),
            Self::Boolean => "bool".to_string(),
            Self::Null => "None".to_string(),
            Self::Any => "Any".to_string(),
            Self::Literal { value } => format!("Literal[{}]", literal_repr(value)),
            Self::Array { items, .. } => format!("list[{}]", items.type_name()),
            Self::Object(object) => object.name.clone(),
            Self::Union { variants } => format!("Union[{}]", join_names(variants.iter())),
            Self::Conditional { mapping } => format!("Union[{}]", join_names(mapping.values())),
            Self::Optional { inner } => format!("Optional[{}]", inner.type_name()),
        }
    }

    /// Validates and coerces `value`, collecting every error.
    ///
    /// `strict` overrides the strictness of every nested model. When it is
    /// `None` each object uses its own `strict` setting, inherited by its
    /// children, and the root defaults to lax.
    pub fn validate(&self, value: &Value, strict: Option<bool>) -> Result<Value, Vec<ErrorDetail>> {
        let mut errors = Vec::new();
        let mode = Mode {
            forced: strict,
            inherited: false,
        };
        let output = self.check(value, &[], mode, &mut errors);
        if errors.is_empty() {
            Ok(output.unwrap_or(Value::Null))
        } else {
            Err(errors)
        }
    }

    fn check(
        &self,
        value: &Value,
        loc: &[LocItem],
        mode: Mode,
        errors: &mut Vec<ErrorDetail>,
    ) -> Option<Value> {
        match self {
            Self::Any => Some(value.clone()),
            Self::Null => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    push(errors, loc, "none_required", "Input should be None");
                    None
                }
            }
            Self::Optional { inner } => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    inner.check(value, loc, mode, errors)
                }
            }
            Self::Literal { value: expected } => {
                if value == expected {
                    Some(value.clone())
                } else {
                    push(
                        errors,
                        loc,
                        "literal_error",
                        format!("Input should be {}", literal_repr(expected)),
                    );
                    None
                }
            }
            Self::String {
                min_length,
                max_length,
                pattern,
            } => check_string(
                value,
                loc,
                *min_length,
                *max_length,
                pattern.as_ref(),
                errors,
            ),
            Self::Integer { minimum, maximum } => {
                let number = coerce_int(value, mode.strict(), loc, errors)?;
                let mut ok = true;
                if let Some(min) = minimum {
                    if number < *min {
                        push(
                            errors,
                            loc,
                            "greater_than_equal",
                            format!("Input should be greater than or equal to {min}"),
                        );
                        ok = false;
                    }
                }
                if let Some(max) = maximum {
                    if number > *max {
                        push(
                            errors,
                            loc,
                            "less_than_equal",
                            format!("Input should be less than or equal to {max}"),
                        );
                        ok = false;
                    }
                }
                ok.then(|| Value::from(number))
            }
            Self::Number { minimum, maximum } => {
                let number = coerce_float(value, mode.strict(), loc, errors)?;
                let mut ok = true;
                if let Some(min) = minimum {
                    if number < *min {
                        push(
                            errors,
                            loc,
                            "greater_than_equal",
                            format!("Input should be greater than or equal to {min}"),
                        );
                        ok = false;
                    }
                }
                if let Some(max) = maximum {
                    if number > *max {
                        push(
                            errors,
                            loc,
                            "less_than_equal",
                            format!("Input should be less than or equal to {max}"),
                        );
                        ok = false;
                    }
                }
                if !ok {
                    return None;
                }
                // Integers given for numbers keep their integer representation.
                match value {
                    Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                    _ => Number::from_f64(number).map(Value::Number),
                }
            }
            Self::Boolean => coerce_bool(value, mode.strict(), loc, errors).map(Value::Bool),
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let Value::Array(values) = value else {
                    push(errors, loc, "list_type", "Input should be a valid list");
                    return None;
                };
                let mut ok = true;
                if let Some(min) = min_items {
                    if values.len() < *min {
                        push(
                            errors,
                            loc,
                            "too_short",
                            format!(
                                "List should have at least {min} item{} after validation, not {}",
                                plural(*min),
                                values.len()
                            ),
                        );
                        ok = false;
                    }
                }
                if let Some(max) = max_items {
                    if values.len() > *max {
                        push(
                            errors,
                            loc,
                            "too_long",
                            format!(
                                "List should have at most {max} item{} after validation, not {}",
                                plural(*max),
                                values.len()
                            ),
                        );
                        ok = false;
                    }
                }
                let mut output = Vec::with_capacity(values.len());
                for (idx, item) in values.iter().enumerate() {
                    let item_loc = extend(loc, LocItem::Index(idx));
                    match items.check(item, &item_loc, mode, errors) {
                        Some(item) => output.push(item),
                        None => ok = false,
                    }
                }
                ok.then_some(Value::Array(output))
            }
            Self::Object(object) => object.check(value, loc, mode, errors),
            Self::Union { variants } => check_union(variants.iter(), value, loc, mode, errors),
            Self::Conditional { mapping } => {
                check_union(mapping.values(), value, loc, mode, errors)
            }
        }
    }
}

impl ObjectSchema {
    fn check(
        &self,
        value: &Value,
        loc: &[LocItem],
        mode: Mode,
        errors: &mut Vec<ErrorDetail>,
    ) -> Option<Value> {
        let Value::Object(input) = value else {
            push(
                errors,
                loc,
                "model_type",
                format!(
                    "Input should be a valid dictionary or instance of {}",
                    self.name
                ),
            );
            return None;
        };
        let mode = Mode {
            forced: mode.forced,
            inherited: self.strict.unwrap_or(mode.inherited),
        };

        let before = errors.len();
        let mut output = Map::new();
        for (name, field) in &self.fields {
            let wire = field.wire_name(name);
            let raw = input.get(wire).or_else(|| input.get(name.as_str()));
            match raw {
                Some(raw) => {
                    let field_loc = extend(loc, LocItem::Key(wire.to_string()));
                    if let Some(checked) = field.schema.check(raw, &field_loc, mode, errors) {
                        output.insert(name.clone(), checked);
                    }
                }
                None => {
                    if let Some(default) = &field.default {
                        output.insert(name.clone(), default.clone());
                    } else if field.required {
                        push(
                            errors,
                            &extend(loc, LocItem::Key(wire.to_string())),
                            "missing",
                            "Field required",
                        );
                    }
                }
            }
        }

        if self.deny_unknown {
            for key in input.keys() {
                if self.find_field(key).is_none() {
                    push(
                        errors,
                        &extend(loc, LocItem::Key(key.clone())),
                        "extra_forbidden",
                        "Extra inputs are not permitted",
                    );
                }
            }
        }

        (errors.len() == before).then_some(Value::Object(output))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

#[derive(Debug, Clone, Copy)]
struct Mode {
    forced: Option<bool>,
    inherited: bool,
}

impl Mode {
    fn strict(self) -> bool {
        self.forced.unwrap_or(self.inherited)
    }
}

fn push(errors: &mut Vec<ErrorDetail>, loc: &[LocItem], kind: &str, msg: impl Into<String>) {
    errors.push(ErrorDetail::new(msg, kind).at(loc.to_vec()));
}

fn extend(loc: &[LocItem], item: LocItem) -> Vec<LocItem> {
    let mut next = loc.to_vec();
    next.push(item);
    next
}

const fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn join_names<'a>(schemas: impl Iterator<Item = &'a Schema>) -> String {
    schemas.map(Schema::type_name).collect::<Vec<_>>().join(", ")
}

fn literal_repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

fn check_union<'a>(
    variants: impl Iterator<Item = &'a Schema>,
    value: &Value,
    loc: &[LocItem],
    mode: Mode,
    errors: &mut Vec<ErrorDetail>,
) -> Option<Value> {
    let mut collected = Vec::new();
    for variant in variants {
        let mut variant_errors = Vec::new();
        if let Some(output) = variant.check(value, &[], mode, &mut variant_errors) {
            if variant_errors.is_empty() {
                return Some(output);
            }
        }
        let name = variant.type_name();
        collected.extend(variant_errors.into_iter().map(|mut detail| {
            let mut full = loc.to_vec();
            full.push(LocItem::Key(name.clone()));
            full.extend(detail.loc.take().unwrap_or_default());
            detail.loc = Some(full);
            detail
        }));
    }
    errors.extend(collected);
    None
}

fn check_string(
    value: &Value,
    loc: &[LocItem],
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<&Pattern>,
    errors: &mut Vec<ErrorDetail>,
) -> Option<Value> {
    let Value::String(s) = value else {
        push(errors, loc, "string_type", "Input should be a valid string");
        return None;
    };
    let len = s.chars().count();
    let mut ok = true;
    if let Some(min) = min_length {
        if len < min {
            push(
                errors,
                loc,
                "string_too_short",
                format!("String should have at least {min} character{}", plural(min)),
            );
            ok = false;
        }
    }
    if let Some(max) = max_length {
        if len > max {
            push(
                errors,
                loc,
                "string_too_long",
                format!("String should have at most {max} character{}", plural(max)),
            );
            ok = false;
        }
    }
    if let Some(pattern) = pattern {
        match pattern.regex() {
            Ok(regex) if regex.is_match(s) => {}
            Ok(_) => {
                push(
                    errors,
                    loc,
                    "string_pattern_mismatch",
                    format!("String should match pattern '{}'", pattern.as_str()),
                );
                ok = false;
            }
            Err(err) => {
                push(errors, loc, "value_error", err.to_string());
                ok = false;
            }
        }
    }
    ok.then(|| value.clone())
}

const INT_OUT_OF_RANGE: &str = "Input should be a valid integer, value is out of range";

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn coerce_int(
    value: &Value,
    strict: bool,
    loc: &[LocItem],
    errors: &mut Vec<ErrorDetail>,
) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            if n.is_u64() {
                push(errors, loc, "int_parsing", INT_OUT_OF_RANGE);
                return None;
            }
            if !strict {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < 9.0e15 {
                        return Some(f as i64);
                    }
                    if f.fract() == 0.0 {
                        push(errors, loc, "int_parsing", INT_OUT_OF_RANGE);
                        return None;
                    }
                    push(
                        errors,
                        loc,
                        "int_from_float",
                        "Input should be a valid integer, got a number with a fractional part",
                    );
                    return None;
                }
            }
            push(errors, loc, "int_type", "Input should be a valid integer");
            None
        }
        Value::String(s) if !strict => {
            if let Ok(i) = s.trim().parse::<i64>() {
                Some(i)
            } else {
                push(
                    errors,
                    loc,
                    "int_parsing",
                    "Input should be a valid integer, unable to parse string as an integer",
                );
                None
            }
        }
        _ => {
            push(errors, loc, "int_type", "Input should be a valid integer");
            None
        }
    }
}

fn coerce_float(
    value: &Value,
    strict: bool,
    loc: &[LocItem],
    errors: &mut Vec<ErrorDetail>,
) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().or_else(|| {
            push(errors, loc, "float_type", "Input should be a valid number");
            None
        }),
        Value::String(s) if !strict => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Some(f),
            _ => {
                push(
                    errors,
                    loc,
                    "float_parsing",
                    "Input should be a valid number, unable to parse string as a number",
                );
                None
            }
        },
        _ => {
            push(errors, loc, "float_type", "Input should be a valid number");
            None
        }
    }
}

fn coerce_bool(
    value: &Value,
    strict: bool,
    loc: &[LocItem],
    errors: &mut Vec<ErrorDetail>,
) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if !strict => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
            _ => {
                push(
                    errors,
                    loc,
                    "bool_parsing",
                    "Input should be a valid boolean, unable to interpret input",
                );
                None
            }
        },
        Value::Number(n) if !strict => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => {
                push(
                    errors,
                    loc,
                    "bool_parsing",
                    "Input should be a valid boolean, unable to interpret input",
                );
                None
            }
        },
        _ => {
            push(errors, loc, "bool_type", "Input should be a valid boolean");
            None
        }
    }
}
