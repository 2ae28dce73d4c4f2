//! Entity attribute bag.
//!
//! # Responsibility
//! - Hold one domain object as an ordered map of property name -> value.
//! - Provide locale-aware accessors for multilingual properties.
//!
//! # Invariants
//! - The primary key lives in the bag under `id`, never anywhere else.
//! - An entity without `id` has not been persisted yet.

use crate::model::value::{Props, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Integer primary key shared by every entity type.
pub type EntityId = i64;

/// Property name holding the primary key.
pub const ID_PROP: &str = "id";

/// Entity types managed by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Announcement,
    Context,
    Galley,
    Decision,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Announcement,
        EntityKind::Context,
        EntityKind::Galley,
        EntityKind::Decision,
    ];

    /// Stable schema name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::Context => "context",
            Self::Galley => "galley",
            Self::Decision => "decision",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema-described domain object.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    data: Props,
}

impl Entity {
    /// Creates an empty, unsaved entity.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            data: BTreeMap::new(),
        }
    }

    /// Creates an entity from an existing attribute bag.
    pub fn with_data(kind: EntityKind, data: Props) -> Self {
        Self { kind, data }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> Option<EntityId> {
        self.data.get(ID_PROP).and_then(Value::as_i64)
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.data.insert(ID_PROP.to_string(), Value::Int(id));
    }

    pub fn get_data(&self, prop: &str) -> Option<&Value> {
        self.data.get(prop)
    }

    /// Returns one locale entry of a multilingual property.
    pub fn get_localized_data(&self, prop: &str, locale: &str) -> Option<&Value> {
        self.data
            .get(prop)
            .and_then(Value::as_localized)
            .and_then(|map| map.get(locale))
    }

    pub fn set_data(&mut self, prop: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(prop.into(), value.into());
    }

    /// Sets one locale entry, converting the property into a localized map
    /// when it currently holds anything else.
    pub fn set_localized_data(
        &mut self,
        prop: impl Into<String>,
        locale: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let entry = self
            .data
            .entry(prop.into())
            .or_insert_with(|| Value::Localized(BTreeMap::new()));
        if !matches!(entry, Value::Localized(_)) {
            *entry = Value::Localized(BTreeMap::new());
        }
        if let Value::Localized(map) = entry {
            map.insert(locale.into(), value.into());
        }
    }

    pub fn unset_data(&mut self, prop: &str) -> Option<Value> {
        self.data.remove(prop)
    }

    pub fn data(&self) -> &Props {
        &self.data
    }

    pub fn set_all_data(&mut self, data: Props) {
        self.data = data;
    }

    pub fn into_data(self) -> Props {
        self.data
    }

    /// Returns a shallow copy with `params` merged over the current bag.
    ///
    /// Keys absent from `params` keep their current value. A multilingual key
    /// present in `params` replaces the whole locale map.
    pub fn merged_with(&self, params: &Props) -> Self {
        let mut data = self.data.clone();
        for (key, value) in params {
            data.insert(key.clone(), value.clone());
        }
        Self {
            kind: self.kind,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityKind};
    use crate::model::value::{Props, Value};

    #[test]
    fn id_round_trips_through_data_bag() {
        let mut entity = Entity::new(EntityKind::Announcement);
        assert_eq!(entity.id(), None);
        entity.set_id(42);
        assert_eq!(entity.id(), Some(42));
        assert_eq!(entity.get_data("id"), Some(&Value::Int(42)));
    }

    #[test]
    fn localized_accessors_build_locale_maps() {
        let mut entity = Entity::new(EntityKind::Announcement);
        entity.set_localized_data("title", "en_US", "Hello");
        entity.set_localized_data("title", "fr_CA", "Bonjour");
        assert_eq!(
            entity.get_localized_data("title", "fr_CA"),
            Some(&Value::from("Bonjour"))
        );
        assert_eq!(entity.get_localized_data("title", "de_DE"), None);
    }

    #[test]
    fn merge_preserves_unspecified_keys() {
        let mut entity = Entity::new(EntityKind::Announcement);
        entity.set_data("typeId", 1);
        entity.set_data("assocId", 5);

        let mut params = Props::new();
        params.insert("typeId".to_string(), Value::Int(2));
        let merged = entity.merged_with(&params);

        assert_eq!(merged.get_data("typeId"), Some(&Value::Int(2)));
        assert_eq!(merged.get_data("assocId"), Some(&Value::Int(5)));
        assert_eq!(entity.get_data("typeId"), Some(&Value::Int(1)));
    }
}
