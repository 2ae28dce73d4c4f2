//! Entity schema registry.
//!
//! # Responsibility
//! - Load per-entity property metadata from embedded JSON documents.
//! - Sanitize attribute bags against the declared properties and types.
//! - Fill missing locale entries in mapped output.
//!
//! # Invariants
//! - A property absent from the schema is never persisted.
//! - `virtual` properties are computed at mapping time and never persisted.

pub mod property;

use crate::model::entity::EntityKind;
use crate::model::value::{Props, Value};
use log::debug;
use property::{PropertySchema, PropertyType, ValidationRule};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema loading and lookup errors.
#[derive(Debug)]
pub enum SchemaError {
    Parse {
        schema: String,
        source: serde_json::Error,
    },
    UnsupportedType(String),
    InvalidRule {
        rule: String,
        message: String,
    },
    UnknownRequiredProperty {
        schema: String,
        property: String,
    },
    NotRegistered(EntityKind),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { schema, source } => write!(f, "failed to parse schema `{schema}`: {source}"),
            Self::UnsupportedType(value) => write!(f, "unsupported property type `{value}`"),
            Self::InvalidRule { rule, message } => {
                write!(f, "invalid validation rule `{rule}`: {message}")
            }
            Self::UnknownRequiredProperty { schema, property } => write!(
                f,
                "schema `{schema}` requires undeclared property `{property}`"
            ),
            Self::NotRegistered(kind) => write!(f, "no schema registered for `{kind}`"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    title: String,
    #[serde(default)]
    required: Vec<String>,
    properties: BTreeMap<String, RawProperty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProperty {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    multilingual: bool,
    #[serde(default)]
    api_summary: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default, rename = "virtual")]
    is_virtual: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    validation: Vec<String>,
}

/// Property metadata for one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    kind: EntityKind,
    title: String,
    required: Vec<String>,
    properties: BTreeMap<String, PropertySchema>,
}

impl EntitySchema {
    /// Parses a schema document.
    pub fn from_json_str(kind: EntityKind, source: &str) -> SchemaResult<Self> {
        let raw: RawSchema = serde_json::from_str(source).map_err(|err| SchemaError::Parse {
            schema: kind.as_str().to_string(),
            source: err,
        })?;

        let mut properties = BTreeMap::new();
        for (name, raw_property) in raw.properties {
            let validation = raw_property
                .validation
                .iter()
                .map(|rule| ValidationRule::parse(rule))
                .collect::<SchemaResult<Vec<_>>>()?;
            properties.insert(
                name.clone(),
                PropertySchema {
                    name,
                    kind: PropertyType::parse(&raw_property.kind)?,
                    multilingual: raw_property.multilingual,
                    api_summary: raw_property.api_summary,
                    read_only: raw_property.read_only,
                    is_virtual: raw_property.is_virtual,
                    default: raw_property.default,
                    validation,
                },
            );
        }

        let mut required = raw.required;
        for (name, property) in &properties {
            let flagged = property
                .validation
                .iter()
                .any(|rule| matches!(rule, ValidationRule::Required));
            if flagged && !required.contains(name) {
                required.push(name.clone());
            }
        }
        for name in &required {
            if !properties.contains_key(name) {
                return Err(SchemaError::UnknownRequiredProperty {
                    schema: kind.as_str().to_string(),
                    property: name.clone(),
                });
            }
        }

        Ok(Self {
            kind,
            title: raw.title,
            required,
            properties,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    /// Iterates properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties.values()
    }

    pub fn required_props(&self) -> Vec<&str> {
        self.required.iter().map(String::as_str).collect()
    }

    pub fn multilingual_props(&self) -> Vec<&str> {
        self.properties()
            .filter(|property| property.multilingual)
            .map(|property| property.name.as_str())
            .collect()
    }

    /// Properties included in summary output.
    pub fn summary_props(&self) -> Vec<&str> {
        self.properties()
            .filter(|property| property.api_summary)
            .map(|property| property.name.as_str())
            .collect()
    }

    /// Every declared property; full output is built from this list.
    pub fn full_props(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    /// Returns `true` when the property is declared and stored.
    pub fn is_persisted(&self, name: &str) -> bool {
        self.property(name)
            .is_some_and(|property| !property.is_virtual)
    }

    /// Default values declared by the schema, typed per property.
    pub fn defaults(&self) -> Props {
        self.properties()
            .filter_map(|property| {
                let default = property.default.clone()?;
                property
                    .kind
                    .coerce(&Value::from_json(default))
                    .filter(|value| !value.is_null())
                    .map(|value| (property.name.clone(), value))
            })
            .collect()
    }

    /// Drops undeclared or virtual properties and coerces the rest.
    ///
    /// Multilingual properties become `Value::Localized`; `Null` locale
    /// entries are kept so an update can delete them.
    pub fn sanitize(&self, data: &Props) -> Props {
        let mut sanitized = Props::new();
        for (name, value) in data {
            let Some(property) = self.property(name) else {
                debug!(
                    "event=schema_sanitize module=schema status=dropped schema={} prop={} reason=undeclared",
                    self.kind, name
                );
                continue;
            };
            if property.is_virtual {
                continue;
            }

            let coerced = if property.multilingual {
                sanitize_localized(property.kind, value)
            } else {
                property.kind.coerce(value)
            };

            match coerced {
                Some(value) => {
                    sanitized.insert(name.clone(), value);
                }
                None => debug!(
                    "event=schema_sanitize module=schema status=dropped schema={} prop={} reason=type_mismatch",
                    self.kind, name
                ),
            }
        }
        sanitized
    }

    /// Adds an entry for every locale missing from multilingual output values.
    ///
    /// Strings fall back to `""`, arrays to `[]`, anything else to `null`.
    pub fn add_missing_multilingual_values(
        &self,
        output: &mut BTreeMap<String, serde_json::Value>,
        locales: &[String],
    ) {
        for property in self.properties().filter(|property| property.multilingual) {
            let Some(entry) = output.get_mut(&property.name) else {
                continue;
            };
            if entry.is_null() {
                *entry = serde_json::Value::Object(serde_json::Map::new());
            }
            let Some(map) = entry.as_object_mut() else {
                continue;
            };
            for locale in locales {
                if map.contains_key(locale) {
                    continue;
                }
                let fallback = match property.kind {
                    PropertyType::String => serde_json::Value::String(String::new()),
                    PropertyType::Array => serde_json::Value::Array(Vec::new()),
                    _ => serde_json::Value::Null,
                };
                map.insert(locale.clone(), fallback);
            }
        }
    }
}

fn sanitize_localized(kind: PropertyType, value: &Value) -> Option<Value> {
    let entries: Vec<(String, Value)> = match value {
        Value::Null => return Some(Value::Null),
        Value::Localized(map) => map
            .iter()
            .map(|(locale, value)| (locale.clone(), value.clone()))
            .collect(),
        Value::Json(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(locale, value)| (locale.clone(), Value::from_json(value.clone())))
            .collect(),
        _ => return None,
    };

    let mut localized = BTreeMap::new();
    for (locale, value) in entries {
        if let Some(coerced) = kind.coerce(&value) {
            localized.insert(locale, coerced);
        }
    }
    Some(Value::Localized(localized))
}

const ANNOUNCEMENT_SCHEMA: &str = include_str!("definitions/announcement.json");
const CONTEXT_SCHEMA: &str = include_str!("definitions/context.json");
const GALLEY_SCHEMA: &str = include_str!("definitions/galley.json");
const DECISION_SCHEMA: &str = include_str!("definitions/decision.json");

/// Registry of entity schemas, constructed once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<EntityKind, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the schemas shipped with the crate.
    pub fn builtin() -> SchemaResult<Self> {
        let mut registry = Self::new();
        for kind in EntityKind::ALL {
            let source = match kind {
                EntityKind::Announcement => ANNOUNCEMENT_SCHEMA,
                EntityKind::Context => CONTEXT_SCHEMA,
                EntityKind::Galley => GALLEY_SCHEMA,
                EntityKind::Decision => DECISION_SCHEMA,
            };
            registry.register(EntitySchema::from_json_str(kind, source)?);
        }
        Ok(registry)
    }

    /// Registers or replaces the schema for its entity kind.
    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.kind(), schema);
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntitySchema> {
        self.schemas.get(&kind)
    }

    pub fn require(&self, kind: EntityKind) -> SchemaResult<&EntitySchema> {
        self.get(kind).ok_or(SchemaError::NotRegistered(kind))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
