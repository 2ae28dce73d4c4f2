//! Schema-driven validation checks.

use super::{ValidationAction, ValidationErrors, ValidationInput};
use crate::model::value::Value;
use crate::schema::property::{PropertySchema, PropertyType, ValidationRule};
use crate::schema::EntitySchema;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

const REQUIRED_MESSAGE: &str = "This field is required.";

static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(_[A-Z]{2})?(@[a-z]+)?$").expect("locale pattern must compile")
});
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?|ftp)://[^\s/?#]+\.?[^\s/?#]*(:\d+)?([/?#]\S*)?$")
        .expect("url pattern must compile")
});
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@([^@\s.]+\.)*[^@\s.]+$").expect("email pattern must compile")
});

/// Validates raw request props against `schema`.
///
/// Read-only and undeclared props are ignored; `null` locale entries are
/// accepted because they delete the stored locale.
pub fn validate_props(schema: &EntitySchema, input: &ValidationInput<'_>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let required = schema.required_props();

    check_required(schema, input, &mut errors);

    for (name, value) in input.props {
        let Some(property) = schema.property(name) else {
            continue;
        };
        if property.read_only || property.is_virtual {
            continue;
        }
        let is_required = required.contains(&name.as_str());
        if property.multilingual {
            check_localized(property, value, is_required, input.allowed_locales, &mut errors);
        } else {
            check_value(property, value, name, is_required, &mut errors);
        }
    }

    errors
}

fn check_required(schema: &EntitySchema, input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
    let primary = input.primary_locale;
    for name in schema.required_props() {
        let Some(property) = schema.property(name) else {
            continue;
        };
        if property.read_only {
            continue;
        }
        let supplied = input.props.get(name);

        match input.action {
            ValidationAction::Add => {
                if property.multilingual {
                    let filled = supplied
                        .and_then(|value| locale_entry(value, primary))
                        .is_some_and(|entry| !entry.is_empty());
                    if !filled {
                        errors.add_localized(name, primary, REQUIRED_MESSAGE);
                    }
                } else if supplied.map_or(true, Value::is_empty) {
                    errors.add(name, REQUIRED_MESSAGE);
                }
            }
            ValidationAction::Edit(_) => {
                let Some(value) = supplied else {
                    continue;
                };
                if property.multilingual {
                    let cleared = value.is_null()
                        || locale_entry(value, primary).is_some_and(|entry| entry.is_empty());
                    if cleared {
                        errors.add_localized(name, primary, REQUIRED_MESSAGE);
                    }
                } else if value.is_empty() {
                    errors.add(name, REQUIRED_MESSAGE);
                }
            }
        }
    }
}

fn check_localized(
    property: &PropertySchema,
    value: &Value,
    is_required: bool,
    allowed_locales: &[String],
    errors: &mut ValidationErrors,
) {
    let name = property.name.as_str();
    if value.is_null() {
        if !is_required && !property.is_nullable() {
            errors.add(name, "This field may not be null.");
        }
        return;
    }

    let Some(entries) = locale_entries(value) else {
        errors.add(name, "Must be an object keyed by locale.");
        return;
    };

    for (locale, entry) in entries {
        if !allowed_locales.iter().any(|allowed| *allowed == locale) {
            errors.add(name, format!("The locale `{locale}` is not supported."));
            continue;
        }
        if entry.is_null() {
            continue;
        }
        check_value(property, &entry, &format!("{name}.{locale}"), true, errors);
    }
}

fn check_value(
    property: &PropertySchema,
    value: &Value,
    field: &str,
    is_required: bool,
    errors: &mut ValidationErrors,
) {
    if value.is_null() {
        if !is_required && !property.is_nullable() {
            errors.add(field, "This field may not be null.");
        }
        return;
    }

    let Some(typed) = property.kind.coerce(value) else {
        errors.add(field, type_message(property.kind));
        return;
    };
    if typed.is_null() {
        return;
    }

    for rule in &property.validation {
        if let Some(message) = check_rule(rule, value, &typed) {
            errors.add(field, message);
        }
    }
}

fn check_rule(rule: &ValidationRule, raw: &Value, typed: &Value) -> Option<String> {
    match rule {
        ValidationRule::Nullable | ValidationRule::Required => None,
        ValidationRule::Min(bound) => {
            let (size, unit) = measure(typed)?;
            (size < *bound).then(|| match unit {
                Unit::Characters => format!("Must be at least {bound} characters."),
                Unit::Number => format!("Must be at least {bound}."),
                Unit::Items => format!("Must have at least {bound} items."),
            })
        }
        ValidationRule::Max(bound) => {
            let (size, unit) = measure(typed)?;
            (size > *bound).then(|| match unit {
                Unit::Characters => format!("Must not be greater than {bound} characters."),
                Unit::Number => format!("Must not be greater than {bound}."),
                Unit::Items => format!("Must not have more than {bound} items."),
            })
        }
        ValidationRule::DateFormat { declared, pattern } => {
            let Value::String(text) = raw else {
                return None;
            };
            (!matches_date_format(text.trim(), pattern))
                .then(|| format!("Does not match the format {declared}."))
        }
        ValidationRule::In(allowed) => {
            let repr = scalar_repr(typed)?;
            (!allowed.contains(&repr)).then(|| "The selected value is invalid.".to_string())
        }
        ValidationRule::Regex(pattern) => {
            let text = typed.as_str()?;
            (!pattern.is_match(text)).then(|| "The format is invalid.".to_string())
        }
        ValidationRule::Url => {
            let text = typed.as_str()?;
            (!URL_PATTERN.is_match(text)).then(|| "Must be a valid URL.".to_string())
        }
        ValidationRule::Email => {
            let text = typed.as_str()?;
            (!EMAIL_PATTERN.is_match(text)).then(|| "Must be a valid email address.".to_string())
        }
        ValidationRule::Locale => {
            let text = typed.as_str()?;
            (!is_locale(text)).then(|| "Must be a valid locale code.".to_string())
        }
    }
}

/// Returns `true` when `text` looks like a locale code such as `en_US`.
pub(crate) fn is_locale(text: &str) -> bool {
    LOCALE_PATTERN.is_match(text)
}

enum Unit {
    Characters,
    Number,
    Items,
}

fn measure(value: &Value) -> Option<(f64, Unit)> {
    match value {
        Value::Int(int) => Some((*int as f64, Unit::Number)),
        Value::Float(float) => Some((*float, Unit::Number)),
        Value::String(text) => Some((text.chars().count() as f64, Unit::Characters)),
        Value::Json(serde_json::Value::Array(items)) => Some((items.len() as f64, Unit::Items)),
        Value::Json(serde_json::Value::Object(map)) => Some((map.len() as f64, Unit::Items)),
        _ => None,
    }
}

fn scalar_repr(value: &Value) -> Option<String> {
    match value {
        Value::Int(int) => Some(int.to_string()),
        Value::Float(float) => Some(float.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn matches_date_format(text: &str, pattern: &str) -> bool {
    NaiveDateTime::parse_from_str(text, pattern).is_ok()
        || NaiveDate::parse_from_str(text, pattern).is_ok()
}

fn type_message(kind: PropertyType) -> &'static str {
    match kind {
        PropertyType::Bool => "Must be true or false.",
        PropertyType::Int => "Must be an integer.",
        PropertyType::Float => "Must be a number.",
        PropertyType::String => "Must be a string.",
        PropertyType::Date => "Must be a valid date.",
        PropertyType::Object => "Must be an object.",
        PropertyType::Array => "Must be an array.",
    }
}

/// Locale entries of a multilingual request value.
fn locale_entries(value: &Value) -> Option<Vec<(String, Value)>> {
    match value {
        Value::Localized(map) => Some(
            map.iter()
                .map(|(locale, entry)| (locale.clone(), entry.clone()))
                .collect(),
        ),
        Value::Json(serde_json::Value::Object(map)) => Some(
            map.iter()
                .map(|(locale, entry)| (locale.clone(), Value::from_json(entry.clone())))
                .collect(),
        ),
        _ => None,
    }
}

fn locale_entry(value: &Value, locale: &str) -> Option<Value> {
    match value {
        Value::Localized(map) => map.get(locale).cloned(),
        Value::Json(serde_json::Value::Object(map)) => {
            map.get(locale).cloned().map(Value::from_json)
        }
        _ => None,
    }
}
