//! Entity -> API representation mapping.
//!
//! # Responsibility
//! - Project entities into summary or full key-ordered maps.
//! - Compute virtual properties through per-kind projectors.
//! - Give every multilingual property a uniform locale key set.
//!
//! # Invariants
//! - Full output is a superset of summary output and never overwrites a
//!   value produced by the summary pass.
//! - Map extensions run exactly once per mapped entity, last.

mod projectors;
mod schema_map;

pub use projectors::{AnnouncementProjector, ContextProjector, DecisionProjector, GalleyProjector};
pub use schema_map::{MapContext, PropertyProjector, SchemaMapper};

use std::collections::BTreeMap;

/// Mapped entity output; keys are sorted by construction.
pub type MappedEntity = BTreeMap<String, serde_json::Value>;
