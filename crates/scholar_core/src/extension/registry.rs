//! Ordered registry of extension point implementations.
//!
//! # Invariants
//! - Extension ids are unique across every extension point.
//! - Extensions run in registration order.

use super::points::{CollectorExtension, EntityHook, MapExtension};
use crate::model::entity::EntityKind;
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Extension registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidId(String),
    DuplicateExtensionId(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => write!(f, "extension id is invalid: {value}"),
            Self::DuplicateExtensionId(value) => {
                write!(f, "extension id already registered: {value}")
            }
        }
    }
}

impl Error for RegistryError {}

struct Registered<T: ?Sized> {
    id: String,
    kind: EntityKind,
    extension: Arc<T>,
}

impl<T: ?Sized> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            extension: Arc::clone(&self.extension),
        }
    }
}

/// Extension points registered at construction and passed into services.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    ids: BTreeSet<String>,
    collectors: Vec<Registered<dyn CollectorExtension>>,
    hooks: Vec<Registered<dyn EntityHook>>,
    maps: Vec<Registered<dyn MapExtension>>,
}

impl Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("ids", &self.ids)
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_collector_extension(
        &mut self,
        id: &str,
        kind: EntityKind,
        extension: impl CollectorExtension + 'static,
    ) -> Result<(), RegistryError> {
        let id = self.claim_id(id, kind, "collector")?;
        self.collectors.push(Registered {
            id,
            kind,
            extension: Arc::new(extension),
        });
        Ok(())
    }

    pub fn register_entity_hook(
        &mut self,
        id: &str,
        kind: EntityKind,
        hook: impl EntityHook + 'static,
    ) -> Result<(), RegistryError> {
        let id = self.claim_id(id, kind, "entity_hook")?;
        self.hooks.push(Registered {
            id,
            kind,
            extension: Arc::new(hook),
        });
        Ok(())
    }

    pub fn register_map_extension(
        &mut self,
        id: &str,
        kind: EntityKind,
        extension: impl MapExtension + 'static,
    ) -> Result<(), RegistryError> {
        let id = self.claim_id(id, kind, "map")?;
        self.maps.push(Registered {
            id,
            kind,
            extension: Arc::new(extension),
        });
        Ok(())
    }

    pub fn collector_extensions(
        &self,
        kind: EntityKind,
    ) -> impl Iterator<Item = &dyn CollectorExtension> + '_ {
        self.collectors
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.extension.as_ref())
    }

    pub fn entity_hooks(&self, kind: EntityKind) -> impl Iterator<Item = &dyn EntityHook> + '_ {
        self.hooks
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.extension.as_ref())
    }

    pub fn map_extensions(&self, kind: EntityKind) -> impl Iterator<Item = &dyn MapExtension> + '_ {
        self.maps
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.extension.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn claim_id(&mut self, id: &str, kind: EntityKind, point: &str) -> Result<String, RegistryError> {
        let id = id.trim();
        if !is_valid_extension_id(id) {
            return Err(RegistryError::InvalidId(id.to_string()));
        }
        if !self.ids.insert(id.to_string()) {
            return Err(RegistryError::DuplicateExtensionId(id.to_string()));
        }
        info!("event=extension_register module=extension status=ok id={id} kind={kind} point={point}");
        Ok(id.to_string())
    }
}

/// Lowercase ASCII segments separated by single `.`, `_` or `-`.
fn is_valid_extension_id(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
            continue;
        }
        if c == '.' || c == '_' || c == '-' {
            if prev_separator {
                return false;
            }
            prev_separator = true;
            continue;
        }
        return false;
    }
    !prev_separator
}

#[cfg(test)]
mod tests {
    use super::{ExtensionRegistry, RegistryError};
    use crate::map::MappedEntity;
    use crate::model::entity::{Entity, EntityKind};
    use crate::repo::query::SelectQuery;

    #[test]
    fn rejects_duplicate_and_malformed_ids() {
        let mut registry = ExtensionRegistry::new();
        registry
            .register_collector_extension(
                "plugins.featured",
                EntityKind::Announcement,
                |_query: &mut SelectQuery| {},
            )
            .expect("first registration should succeed");

        let duplicate = registry
            .register_map_extension(
                "plugins.featured",
                EntityKind::Context,
                |output: MappedEntity, _entity: &Entity| output,
            )
            .expect_err("duplicate id must fail");
        assert!(matches!(duplicate, RegistryError::DuplicateExtensionId(_)));

        let invalid = registry
            .register_collector_extension(
                "Plugins Featured",
                EntityKind::Announcement,
                |_query: &mut SelectQuery| {},
            )
            .expect_err("invalid id must fail");
        assert!(matches!(invalid, RegistryError::InvalidId(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn filters_extensions_by_kind_in_registration_order() {
        let mut registry = ExtensionRegistry::new();
        for (id, kind, column) in [
            ("one", EntityKind::Announcement, "a.one"),
            ("two", EntityKind::Context, "c.two"),
            ("three", EntityKind::Announcement, "a.three"),
        ] {
            registry
                .register_collector_extension(id, kind, move |query: &mut SelectQuery| {
                    query.where_eq(column, 1_i64);
                })
                .unwrap();
        }

        let mut query = SelectQuery::table("announcements", "a");
        for extension in registry.collector_extensions(EntityKind::Announcement) {
            extension.extend_query(&mut query);
        }
        let (sql, _) = query.to_sql();
        assert!(sql.ends_with("WHERE a.one = ? AND a.three = ?"));
    }
}
