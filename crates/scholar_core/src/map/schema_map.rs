//! Generic schema mapper.

use super::MappedEntity;
use crate::extension::ExtensionRegistry;
use crate::model::entity::Entity;
use crate::schema::EntitySchema;
use chrono::NaiveDateTime;

/// Request-scoped values the mapper needs to build URLs and fill locales.
#[derive(Debug, Clone, PartialEq)]
pub struct MapContext {
    /// Installation base URL without trailing slash.
    pub base_url: String,
    /// URL path of the journal the request runs in.
    pub context_path: String,
    /// Locales every multilingual output value is filled for.
    pub supported_locales: Vec<String>,
    pub now: NaiveDateTime,
}

impl MapContext {
    /// REST API URL for `endpoint` under the current journal.
    pub fn api_url(&self, endpoint: &str) -> String {
        self.api_url_in(&self.context_path, endpoint)
    }

    /// REST API URL for `endpoint` under an explicit context path.
    pub fn api_url_in(&self, context_path: &str, endpoint: &str) -> String {
        format!(
            "{}/{}/api/v1/{}",
            self.base_url.trim_end_matches('/'),
            context_path,
            endpoint.trim_start_matches('/')
        )
    }

    /// Public page URL for `path` under the current journal.
    pub fn page_url(&self, path: &str) -> String {
        self.page_url_in(&self.context_path, path)
    }

    pub fn page_url_in(&self, context_path: &str, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{base}/{context_path}")
        } else {
            format!("{base}/{context_path}/{path}")
        }
    }
}

/// Computes properties that are not stored on the entity.
pub trait PropertyProjector {
    /// Returns the value for `prop`, or `None` to use the stored value.
    fn project(&self, prop: &str, entity: &Entity, context: &MapContext) -> Option<serde_json::Value>;
}

/// Maps entities of one kind using its schema and a projector.
pub struct SchemaMapper<'a, P: PropertyProjector> {
    schema: &'a EntitySchema,
    context: &'a MapContext,
    extensions: &'a ExtensionRegistry,
    projector: P,
}

impl<'a, P: PropertyProjector> SchemaMapper<'a, P> {
    pub fn new(
        schema: &'a EntitySchema,
        context: &'a MapContext,
        extensions: &'a ExtensionRegistry,
        projector: P,
    ) -> Self {
        Self {
            schema,
            context,
            extensions,
            projector,
        }
    }

    /// Maps the summary property set.
    pub fn summarize(&self, entity: &Entity) -> MappedEntity {
        let output = self.summary_pass(entity);
        self.finish(output, entity)
    }

    /// Maps every schema property.
    pub fn map(&self, entity: &Entity) -> MappedEntity {
        let mut output = self.summary_pass(entity);
        for prop in self.schema.full_props() {
            if output.contains_key(prop) {
                continue;
            }
            let value = self.value_of(prop, entity);
            output.insert(prop.to_string(), value);
        }
        self.finish(output, entity)
    }

    pub fn summarize_many<'e>(&self, entities: impl IntoIterator<Item = &'e Entity>) -> Vec<MappedEntity> {
        entities.into_iter().map(|entity| self.summarize(entity)).collect()
    }

    pub fn map_many<'e>(&self, entities: impl IntoIterator<Item = &'e Entity>) -> Vec<MappedEntity> {
        entities.into_iter().map(|entity| self.map(entity)).collect()
    }

    /// Runs registered map extensions in registration order.
    pub fn extend(&self, output: MappedEntity, entity: &Entity) -> MappedEntity {
        self.extensions
            .map_extensions(entity.kind())
            .fold(output, |output, extension| extension.extend(output, entity))
    }

    fn summary_pass(&self, entity: &Entity) -> MappedEntity {
        self.schema
            .summary_props()
            .into_iter()
            .map(|prop| (prop.to_string(), self.value_of(prop, entity)))
            .collect()
    }

    fn value_of(&self, prop: &str, entity: &Entity) -> serde_json::Value {
        if let Some(value) = self.projector.project(prop, entity, self.context) {
            return value;
        }
        entity
            .get_data(prop)
            .map_or(serde_json::Value::Null, |value| value.to_json())
    }

    fn finish(&self, mut output: MappedEntity, entity: &Entity) -> MappedEntity {
        self.schema
            .add_missing_multilingual_values(&mut output, &self.context.supported_locales);
        self.extend(output, entity)
    }
}
