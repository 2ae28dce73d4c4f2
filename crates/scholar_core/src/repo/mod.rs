//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define entity data access contracts shared by every entity kind.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes persist schema-sanitized data only.
//! - Repository APIs return semantic errors (`NotFound`, `ContractViolation`)
//!   in addition to DB transport errors.

pub mod collector;
pub mod convert;
pub mod entity_repo;
pub mod legacy;
pub mod query;
pub mod tables;

pub use collector::{
    AnnouncementCollector, ContextCollector, DecisionCollector, EntityCollector, GalleyCollector,
};
pub use entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use query::{CompareOp, Condition, SelectQuery, SortDirection};
