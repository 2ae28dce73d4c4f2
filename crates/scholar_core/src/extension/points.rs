//! Typed extension point contracts.
//!
//! Each trait is one seam where registered code may observe or alter
//! behavior. Closures implement the single-method seams directly.

use crate::map::MappedEntity;
use crate::model::entity::Entity;
use crate::model::value::Props;
use crate::repo::query::SelectQuery;
use crate::validation::{ValidationErrors, ValidationInput};

/// Alters a collector query after the collector applied its own filters.
pub trait CollectorExtension: Send + Sync {
    fn extend_query(&self, query: &mut SelectQuery);
}

impl<F> CollectorExtension for F
where
    F: Fn(&mut SelectQuery) + Send + Sync,
{
    fn extend_query(&self, query: &mut SelectQuery) {
        self(query)
    }
}

/// Observes or adjusts entity lifecycle steps in a domain service.
///
/// Every method has an empty default so hooks implement only what they need.
pub trait EntityHook: Send + Sync {
    /// Runs after built-in validation; may add errors.
    fn validate(&self, _input: &ValidationInput<'_>, _errors: &mut ValidationErrors) {}

    /// Runs after a new entity was inserted.
    fn added(&self, _entity: &Entity) {}

    /// Runs before an update with the merged entity, the stored entity and
    /// the request params. The merged entity may be modified.
    fn editing(&self, _updated: &mut Entity, _current: &Entity, _params: &Props) {}

    /// Runs after an update was written.
    fn edited(&self, _updated: &Entity, _current: &Entity) {}

    fn deleting(&self, _entity: &Entity) {}

    fn deleted(&self, _entity: &Entity) {}
}

/// Post-processes mapped output for one entity.
pub trait MapExtension: Send + Sync {
    fn extend(&self, output: MappedEntity, entity: &Entity) -> MappedEntity;
}

impl<F> MapExtension for F
where
    F: Fn(MappedEntity, &Entity) -> MappedEntity + Send + Sync,
{
    fn extend(&self, output: MappedEntity, entity: &Entity) -> MappedEntity {
        self(output, entity)
    }
}
