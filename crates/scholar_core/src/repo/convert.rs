//! Conversion between attribute values and SQLite storage values.
//!
//! # Invariants
//! - Booleans are stored as `0`/`1`.
//! - Dates are stored as `Y-m-d H:i:s` text; an empty date becomes `NULL`.
//! - Objects and arrays are stored as unescaped UTF-8 JSON text.
//! - Settings values are always stored as text.

use super::legacy::unserialize;
use crate::model::value::{Value, DATETIME_FORMAT};
use crate::schema::property::PropertyType;
use rusqlite::types::Value as SqlValue;

/// Converts a value for a primary-table column.
///
/// Values that cannot represent `kind` are stored as `NULL`.
pub fn to_column(value: &Value, kind: PropertyType) -> SqlValue {
    match kind.coerce(value) {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(flag)) => SqlValue::Integer(i64::from(flag)),
        Some(Value::Int(int)) => SqlValue::Integer(int),
        Some(Value::Float(float)) => SqlValue::Real(float),
        Some(Value::String(text)) => SqlValue::Text(text),
        Some(other) => to_setting(&other, kind).map_or(SqlValue::Null, SqlValue::Text),
    }
}

/// Converts a value for the settings table `setting_value` column.
///
/// Returns `None` when the value is null and no row should be kept.
pub fn to_setting(value: &Value, kind: PropertyType) -> Option<String> {
    match kind.coerce(value)? {
        Value::Null => None,
        Value::Bool(flag) => Some(if flag { "1" } else { "0" }.to_string()),
        Value::Int(int) => Some(int.to_string()),
        Value::Float(float) => Some(float.to_string()),
        Value::String(text) => Some(text),
        Value::Date(date) => Some(date.format(DATETIME_FORMAT).to_string()),
        Value::Json(json) => serde_json::to_string(&json).ok(),
        localized @ Value::Localized(_) => serde_json::to_string(&localized.to_json()).ok(),
    }
}

/// Converts a stored value back to `kind`.
///
/// Returns `None` when the stored value cannot be read as `kind`.
pub fn from_db(raw: SqlValue, kind: PropertyType) -> Option<Value> {
    let value = match raw {
        SqlValue::Null => return Some(Value::Null),
        SqlValue::Integer(int) => Value::Int(int),
        SqlValue::Real(float) => Value::Float(float),
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8(bytes).ok()?),
    };

    match (kind, value) {
        (PropertyType::Object | PropertyType::Array, Value::String(text)) => {
            decode_structured(&text)
        }
        (kind, value) => kind.coerce(&value),
    }
}

fn decode_structured(text: &str) -> Option<Value> {
    if text.is_empty() {
        return Some(Value::Null);
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .or_else(|| unserialize(text))
        .map(|json| match json {
            serde_json::Value::Null => Value::Null,
            other => Value::Json(other),
        })
}
