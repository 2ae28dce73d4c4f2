//! Tagged attribute value.
//!
//! # Responsibility
//! - Represent every value an entity attribute can hold.
//! - Convert between attribute values and JSON at the API boundary.
//!
//! # Invariants
//! - `Localized` is only produced for schema-multilingual properties.
//! - A `Null` entry inside `Localized` means "remove this locale" on update.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Storage/wire format used for timestamps (`Y-m-d H:i:s`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Date-only format (`Y-m-d`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One entity attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDateTime),
    /// Structured object/array payload.
    Json(serde_json::Value),
    /// Locale code -> value map for multilingual properties.
    Localized(BTreeMap<String, Value>),
}

/// Attribute bag keyed by schema property name.
pub type Props = BTreeMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for null, empty strings and empty collections.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(value) => value.trim().is_empty(),
            Self::Json(serde_json::Value::Null) => true,
            Self::Json(serde_json::Value::Array(items)) => items.is_empty(),
            Self::Json(serde_json::Value::Object(map)) => map.is_empty(),
            Self::Json(serde_json::Value::String(value)) => value.trim().is_empty(),
            Self::Localized(map) => map.values().all(Value::is_empty),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_localized(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Localized(map) => Some(map),
            _ => None,
        }
    }

    /// Loose truthiness used for flags supplied by API callers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::String(value) => !(value.is_empty() || value == "0" || value == "false"),
            Self::Date(_) => true,
            Self::Json(value) => !value.is_null(),
            Self::Localized(map) => !map.is_empty(),
        }
    }

    /// Builds a localized value from `(locale, text)` pairs.
    pub fn localized<L, V>(entries: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<Value>,
    {
        Self::Localized(
            entries
                .into_iter()
                .map(|(locale, value)| (locale.into(), value.into()))
                .collect(),
        )
    }

    /// Converts an API payload value into an attribute value.
    ///
    /// Scalars map onto their tagged variants; arrays and objects stay `Json`
    /// until schema sanitization decides whether they are localized maps.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(text) => Self::String(text),
            other => Self::Json(other),
        }
    }

    /// Renders the value in its API representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(flag) => serde_json::Value::Bool(*flag),
            Self::Int(int) => serde_json::Value::from(*int),
            Self::Float(float) => serde_json::Number::from_f64(*float)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(text) => serde_json::Value::String(text.clone()),
            Self::Date(date) => serde_json::Value::String(date.format(DATETIME_FORMAT).to_string()),
            Self::Json(value) => value.clone(),
            Self::Localized(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(locale, value)| (locale.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Converts a JSON object payload into an attribute bag.
pub fn props_from_json(object: serde_json::Map<String, serde_json::Value>) -> Props {
    object
        .into_iter()
        .map(|(key, value)| (key, Value::from_json(value)))
        .collect()
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
