//! # Content Transformation
//!
//! Bidirectional mapping between the CMS content representation and a
//! platform's native representation.
//!
//! A [`TransformMapping`] is a declarative table of `cms path -> platform path`
//! rules with two named directions: [`Direction::Forward`] (CMS to platform,
//! e.g. `cms_to_wp`) and [`Direction::Backward`] (platform to CMS, e.g.
//! `wp_to_cms`). Applying a mapping:
//!
//! - copies every mapped field that is present in the input, converting status
//!   enums and date formats where a rule asks for it
//! - drops input fields the table does not mention
//! - leaves fields of an existing output document untouched when the table
//!   does not cover them ([`Transformer::forward_into`])
//! - validates required output fields, aggregating every violation into one
//!   [`ValidationError::MissingFields`]
//!
//! `backward(forward(x))` restores every mapped field of `x`, provided the
//! status tables of the two directions are inverses of each other.

pub mod path;
pub mod presets;

use crate::ValidationError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use path::{get_path, segments, set_path};

/// Status used when a status value has no entry in the lookup table
pub const DEFAULT_STATUS_FALLBACK: &str = "draft";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the transformation layer.
///
/// None of these are retried; they surface directly to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown direction '{name}' for mapping '{mapping}'")]
    UnknownDirection { mapping: String, name: String },

    #[error("Invalid mapping '{mapping}': {message}")]
    InvalidMapping { mapping: String, message: String },

    #[error("Unknown mapping preset '{name}'")]
    UnknownPreset { name: String },
}

// ============================================================================
// Mapping Definition
// ============================================================================

/// Direction a mapping is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// CMS document to platform document
    Forward,
    /// Platform document to CMS document
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Value conversion applied while copying a field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conversion {
    /// Copy the value verbatim
    #[default]
    None,

    /// Translate through the direction's status table
    Status,

    /// Convert between CMS RFC 3339 timestamps and a platform format
    ///
    /// `format` is a `chrono` format string describing the platform side.
    /// Platform formats without an offset are read and written as UTC.
    DateTime { format: String },
}

/// One `cms path <-> platform path` correspondence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Dot path on the CMS side
    pub cms: String,

    /// Dot path on the platform side
    pub platform: String,

    #[serde(default)]
    pub conversion: Conversion,
}

impl FieldRule {
    pub fn new(cms: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            cms: cms.into(),
            platform: platform.into(),
            conversion: Conversion::None,
        }
    }

    pub fn status(cms: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            conversion: Conversion::Status,
            ..Self::new(cms, platform)
        }
    }

    pub fn datetime(
        cms: impl Into<String>,
        platform: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            conversion: Conversion::DateTime {
                format: format.into(),
            },
            ..Self::new(cms, platform)
        }
    }

    fn input_path(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.cms,
            Direction::Backward => &self.platform,
        }
    }

    fn output_path(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.platform,
            Direction::Backward => &self.cms,
        }
    }
}

/// Status enum lookup for one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTable {
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    /// Value used for statuses absent from the table
    #[serde(default = "default_status_fallback")]
    pub fallback: String,
}

fn default_status_fallback() -> String {
    DEFAULT_STATUS_FALLBACK.to_string()
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            fallback: default_status_fallback(),
        }
    }
}

impl StatusTable {
    /// Build a table from `(from, to)` pairs with the default fallback
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            fallback: default_status_fallback(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Translate a status, falling back for unknown values
    pub fn translate(&self, status: &str) -> String {
        match self.values.get(status) {
            Some(mapped) => mapped.clone(),
            None => {
                debug!(status, fallback = %self.fallback, "Unmapped status, using fallback");
                self.fallback.clone()
            }
        }
    }

    /// Table mapping every target value back to its source
    pub fn inverted(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(from, to)| (to.clone(), from.clone()))
                .collect(),
            fallback: self.fallback.clone(),
        }
    }
}

/// Settings scoped to one direction of a mapping
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionSettings {
    /// Name callers use for this direction, e.g. `cms_to_wp`
    pub name: String,

    #[serde(default)]
    pub status: StatusTable,

    /// Output paths that must be present and non-empty after mapping
    #[serde(default)]
    pub required: Vec<String>,
}

/// Declarative field mapping between the CMS and one platform
///
/// # Examples
///
/// ```rust
/// use cms_bridge_core::transform::{FieldRule, TransformMapping, Transformer};
/// use serde_json::json;
///
/// let mapping = TransformMapping::new("blog", "cms_to_blog", "blog_to_cms")
///     .with_rule(FieldRule::new("title", "post.title"))
///     .with_required("post.title", "title");
/// let transformer = Transformer::new(mapping).unwrap();
///
/// let post = transformer.forward(&json!({"title": "Hello", "internal": 1})).unwrap();
/// assert_eq!(post, json!({"post": {"title": "Hello"}}));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformMapping {
    pub name: String,
    pub forward: DirectionSettings,
    pub backward: DirectionSettings,
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

impl TransformMapping {
    pub fn new(
        name: impl Into<String>,
        forward_name: impl Into<String>,
        backward_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            forward: DirectionSettings {
                name: forward_name.into(),
                ..Default::default()
            },
            backward: DirectionSettings {
                name: backward_name.into(),
                ..Default::default()
            },
            fields: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Set the forward status table; the backward table becomes its inverse.
    pub fn with_status_table(mut self, forward: StatusTable) -> Self {
        self.backward.status = forward.inverted();
        self.forward.status = forward;
        self
    }

    pub fn with_backward_status_table(mut self, backward: StatusTable) -> Self {
        self.backward.status = backward;
        self
    }

    /// Add a required output field for each direction
    pub fn with_required(
        mut self,
        forward_path: impl Into<String>,
        backward_path: impl Into<String>,
    ) -> Self {
        self.forward.required.push(forward_path.into());
        self.backward.required.push(backward_path.into());
        self
    }

    /// Parse a mapping from YAML (JSON is valid YAML)
    pub fn from_yaml(source: &str) -> Result<Self, TransformError> {
        serde_yaml::from_str(source).map_err(|e| TransformError::InvalidMapping {
            mapping: "<unparsed>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn settings(&self, direction: Direction) -> &DirectionSettings {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    /// Resolve a direction by its configured name
    pub fn direction_named(&self, name: &str) -> Result<Direction, TransformError> {
        if name == self.forward.name {
            Ok(Direction::Forward)
        } else if name == self.backward.name {
            Ok(Direction::Backward)
        } else {
            Err(TransformError::UnknownDirection {
                mapping: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    /// Check the mapping is internally consistent
    pub fn validate(&self) -> Result<(), TransformError> {
        let invalid = |message: String| TransformError::InvalidMapping {
            mapping: self.name.clone(),
            message,
        };

        if self.forward.name.is_empty() || self.backward.name.is_empty() {
            return Err(invalid("direction names must not be empty".to_string()));
        }

        if self.forward.name == self.backward.name {
            return Err(invalid(format!(
                "direction names must differ, both are '{}'",
                self.forward.name
            )));
        }

        for direction in [Direction::Forward, Direction::Backward] {
            let settings = self.settings(direction);
            if settings.required.is_empty() {
                return Err(invalid(format!(
                    "direction '{}' must require at least one field, such as the title",
                    settings.name
                )));
            }
        }

        for rule in &self.fields {
            for p in [&rule.cms, &rule.platform] {
                if segments(p).is_none() {
                    return Err(invalid(format!("field path '{}' is not a valid dot path", p)));
                }
            }
        }

        for direction in [Direction::Forward, Direction::Backward] {
            for p in &self.settings(direction).required {
                if segments(p).is_none() {
                    return Err(invalid(format!("required path '{}' is not a valid dot path", p)));
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Transformer
// ============================================================================

/// Applies a validated [`TransformMapping`] to documents
#[derive(Debug, Clone)]
pub struct Transformer {
    mapping: TransformMapping,
}

impl Transformer {
    /// Create a transformer, rejecting inconsistent mappings
    pub fn new(mapping: TransformMapping) -> Result<Self, TransformError> {
        mapping.validate()?;
        Ok(Self { mapping })
    }

    /// Create a transformer from a built-in preset (`wordpress`, `shopify`, `drupal`)
    pub fn preset(name: &str) -> Result<Self, TransformError> {
        Self::new(presets::by_name(name)?)
    }

    pub fn mapping(&self) -> &TransformMapping {
        &self.mapping
    }

    /// Map a CMS document to the platform shape
    pub fn forward(&self, source: &Value) -> Result<Value, TransformError> {
        self.apply(Direction::Forward, source)
    }

    /// Map a platform document back to the CMS shape
    pub fn backward(&self, target: &Value) -> Result<Value, TransformError> {
        self.apply(Direction::Backward, target)
    }

    /// Map a CMS document onto an existing platform document
    pub fn forward_into(&self, source: &Value, existing: &mut Value) -> Result<(), TransformError> {
        self.apply_into(Direction::Forward, source, existing)
    }

    /// Map a platform document onto an existing CMS document
    pub fn backward_into(&self, target: &Value, existing: &mut Value) -> Result<(), TransformError> {
        self.apply_into(Direction::Backward, target, existing)
    }

    /// Map `input` in `direction` into a fresh document
    pub fn apply(&self, direction: Direction, input: &Value) -> Result<Value, TransformError> {
        let mut output = Value::Object(Map::new());
        self.apply_into(direction, input, &mut output)?;
        Ok(output)
    }

    /// Map `input` in `direction` onto `output`.
    ///
    /// Only paths named by the mapping are written; everything else already in
    /// `output` is kept. `output` is left unchanged when an error is returned.
    pub fn apply_into(
        &self,
        direction: Direction,
        input: &Value,
        output: &mut Value,
    ) -> Result<(), TransformError> {
        let settings = self.mapping.settings(direction);
        let mut staged = output.clone();

        for rule in &self.mapping.fields {
            let Some(value) = get_path(input, rule.input_path(direction)) else {
                continue;
            };

            let converted = self.convert(rule, direction, value)?;
            set_path(&mut staged, rule.output_path(direction), converted);
        }

        let missing: Vec<String> = settings
            .required
            .iter()
            .filter(|p| is_blank(get_path(&staged, p)))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing }.into());
        }

        *output = staged;
        Ok(())
    }

    /// Translate a status value through the table of the named direction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cms_bridge_core::transform::Transformer;
    ///
    /// let wordpress = Transformer::preset("wordpress").unwrap();
    ///
    /// assert_eq!(wordpress.transform_status("published", "cms_to_wp").unwrap(), "publish");
    /// assert_eq!(wordpress.transform_status("weird_status", "cms_to_wp").unwrap(), "draft");
    /// ```
    pub fn transform_status(&self, status: &str, direction_name: &str) -> Result<String, TransformError> {
        let direction = self.mapping.direction_named(direction_name)?;
        Ok(self.status_for(direction, status))
    }

    /// Translate a status value in `direction`
    pub fn status_for(&self, direction: Direction, status: &str) -> String {
        self.mapping.settings(direction).status.translate(status)
    }

    fn convert(
        &self,
        rule: &FieldRule,
        direction: Direction,
        value: &Value,
    ) -> Result<Value, TransformError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match &rule.conversion {
            Conversion::None => Ok(value.clone()),
            Conversion::Status => {
                let status = match value {
                    Value::String(s) => self.status_for(direction, s),
                    _ => self.mapping.settings(direction).status.fallback.clone(),
                };
                Ok(Value::String(status))
            }
            Conversion::DateTime { format } => {
                let field = rule.input_path(direction);
                let raw = value.as_str().ok_or_else(|| ValidationError::InvalidFormat {
                    field: field.to_string(),
                    message: "expected a date string".to_string(),
                })?;

                let converted = match direction {
                    Direction::Forward => cms_date_to_platform(raw, format),
                    Direction::Backward => platform_date_to_cms(raw, format),
                }
                .ok_or_else(|| ValidationError::InvalidFormat {
                    field: field.to_string(),
                    message: format!("'{}' is not a valid date", raw),
                })?;

                Ok(Value::String(converted))
            }
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// chrono specifiers that print a UTC offset
const OFFSET_SPECIFIERS: &[&str] = &["%z", "%:z", "%::z", "%:::z", "%#z"];

fn has_offset(format: &str) -> bool {
    OFFSET_SPECIFIERS.iter().any(|spec| format.contains(spec))
}

/// Formats with an offset keep the source offset; others are written in UTC.
fn cms_date_to_platform(raw: &str, format: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    if has_offset(format) {
        Some(parsed.format(format).to_string())
    } else {
        Some(parsed.with_timezone(&Utc).format(format).to_string())
    }
}

/// Fractional seconds survive as 3, 6 or 9 digits; a zero offset becomes `Z`.
fn platform_date_to_cms(raw: &str, format: &str) -> Option<String> {
    let parsed = DateTime::parse_from_str(raw, format)
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, format).map(|naive| naive.and_utc().fixed_offset())
        })
        .ok()?;

    Some(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
