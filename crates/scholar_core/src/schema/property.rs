//! Property metadata: primitive types, validation rules and type coercion.

use crate::model::value::{Value, DATETIME_FORMAT, DATE_FORMAT};
use crate::schema::{SchemaError, SchemaResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Primitive type declared for one schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    String,
    Date,
    Object,
    Array,
}

impl PropertyType {
    /// Parses a schema type name, accepting the long aliases used by
    /// JSON-schema documents (`boolean`, `integer`, `number`).
    pub fn parse(value: &str) -> SchemaResult<Self> {
        match value.trim() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "string" => Ok(Self::String),
            "date" => Ok(Self::Date),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            other => Err(SchemaError::UnsupportedType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "number",
            Self::String => "string",
            Self::Date => "date",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Coerces a loosely typed value into this type.
    ///
    /// Returns `None` when the value cannot represent this type. `Null` is
    /// preserved for every type; an empty string becomes `Null` for dates.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        if let Value::Json(json) = value {
            if !json.is_array() && !json.is_object() {
                return self.coerce(&Value::from_json(json.clone()));
            }
        }
        if value.is_null() {
            return Some(Value::Null);
        }

        match self {
            Self::Bool => match value {
                Value::Bool(flag) => Some(Value::Bool(*flag)),
                Value::Int(_) | Value::Float(_) | Value::String(_) => {
                    Some(Value::Bool(value.is_truthy()))
                }
                _ => None,
            },
            Self::Int => match value {
                Value::Int(int) => Some(Value::Int(*int)),
                Value::Float(float) => Some(Value::Int(float.trunc() as i64)),
                Value::Bool(flag) => Some(Value::Int(i64::from(*flag))),
                Value::String(text) => parse_int(text).map(Value::Int),
                _ => None,
            },
            Self::Float => match value {
                Value::Float(float) => Some(Value::Float(*float)),
                Value::Int(int) => Some(Value::Float(*int as f64)),
                Value::Bool(flag) => Some(Value::Float(if *flag { 1.0 } else { 0.0 })),
                Value::String(text) => text.trim().parse::<f64>().ok().map(Value::Float),
                _ => None,
            },
            Self::String => match value {
                Value::String(text) => Some(Value::String(text.clone())),
                Value::Int(int) => Some(Value::String(int.to_string())),
                Value::Float(float) => Some(Value::String(float.to_string())),
                Value::Bool(flag) => Some(Value::String(if *flag { "1" } else { "" }.to_string())),
                Value::Date(date) => Some(Value::String(date.format(DATETIME_FORMAT).to_string())),
                _ => None,
            },
            Self::Date => match value {
                Value::Date(date) => Some(Value::Date(*date)),
                Value::String(text) if text.trim().is_empty() => Some(Value::Null),
                Value::String(text) => parse_datetime(text).map(Value::Date),
                Value::Int(timestamp) => {
                    DateTime::<Utc>::from_timestamp(*timestamp, 0)
                        .map(|date| Value::Date(date.naive_utc()))
                }
                _ => None,
            },
            Self::Object | Self::Array => match value {
                Value::Json(json) => Some(Value::Json(json.clone())),
                Value::Localized(_) => Some(Value::Json(value.to_json())),
                _ => None,
            },
        }
    }
}

/// Parses the timestamp formats accepted from storage and API callers.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(|float| float.trunc() as i64))
}

/// One validation rule attached to a property.
#[derive(Debug, Clone)]
pub enum ValidationRule {
    Nullable,
    Required,
    Min(f64),
    Max(f64),
    /// Expected date layout; keeps the declared form for messages.
    DateFormat { declared: String, pattern: String },
    In(Vec<String>),
    Regex(Regex),
    Url,
    Email,
    Locale,
}

impl ValidationRule {
    /// Parses a rule string such as `max:255` or `date_format:Y-m-d`.
    pub fn parse(rule: &str) -> SchemaResult<Self> {
        let (name, argument) = match rule.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument)),
            None => (rule.trim(), None),
        };

        match (name, argument) {
            ("nullable", None) => Ok(Self::Nullable),
            ("required", None) => Ok(Self::Required),
            ("url", None) => Ok(Self::Url),
            ("email" | "email_or_localhost", None) => Ok(Self::Email),
            ("locale", None) => Ok(Self::Locale),
            ("min", Some(argument)) => parse_bound(rule, argument).map(Self::Min),
            ("max", Some(argument)) => parse_bound(rule, argument).map(Self::Max),
            ("date_format", Some(argument)) => Ok(Self::DateFormat {
                declared: argument.to_string(),
                pattern: date_format_to_chrono(argument),
            }),
            ("in", Some(argument)) => Ok(Self::In(
                argument.split(',').map(|item| item.trim().to_string()).collect(),
            )),
            ("regex", Some(argument)) => {
                let pattern = strip_regex_delimiters(argument);
                Regex::new(&pattern)
                    .map(Self::Regex)
                    .map_err(|err| SchemaError::InvalidRule {
                        rule: rule.to_string(),
                        message: err.to_string(),
                    })
            }
            _ => Err(SchemaError::InvalidRule {
                rule: rule.to_string(),
                message: "unsupported validation rule".to_string(),
            }),
        }
    }
}

fn parse_bound(rule: &str, argument: &str) -> SchemaResult<f64> {
    argument
        .trim()
        .parse::<f64>()
        .map_err(|err| SchemaError::InvalidRule {
            rule: rule.to_string(),
            message: err.to_string(),
        })
}

/// Translates `Y-m-d H:i:s` style layouts to chrono format strings.
fn date_format_to_chrono(format: &str) -> String {
    let mut translated = String::with_capacity(format.len() * 2);
    for ch in format.chars() {
        match ch {
            'Y' => translated.push_str("%Y"),
            'm' => translated.push_str("%m"),
            'd' => translated.push_str("%d"),
            'H' => translated.push_str("%H"),
            'i' => translated.push_str("%M"),
            's' => translated.push_str("%S"),
            '%' => translated.push_str("%%"),
            other => translated.push(other),
        }
    }
    translated
}

/// Removes `/.../flags` delimiters; an `i` flag becomes `(?i)`.
fn strip_regex_delimiters(pattern: &str) -> String {
    let trimmed = pattern.trim();
    if let Some(body) = trimmed.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            let flags = &body[end + 1..];
            let inner = &body[..end];
            if flags.contains('i') {
                return format!("(?i){inner}");
            }
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

/// Metadata for one schema property.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    pub name: String,
    pub kind: PropertyType,
    pub multilingual: bool,
    /// Included in summary API output.
    pub api_summary: bool,
    pub read_only: bool,
    /// Derived at mapping time and never persisted.
    pub is_virtual: bool,
    pub default: Option<serde_json::Value>,
    pub validation: Vec<ValidationRule>,
}

impl PropertySchema {
    pub fn is_nullable(&self) -> bool {
        self.validation
            .iter()
            .any(|rule| matches!(rule, ValidationRule::Nullable))
    }
}
