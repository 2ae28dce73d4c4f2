//! Core entity persistence layer for scholarly publishing data.
//! This crate is the single source of truth for entity storage invariants.

pub mod config;
pub mod db;
pub mod extension;
pub mod logging;
pub mod map;
pub mod model;
pub mod repo;
pub mod schema;
pub mod search;
pub mod service;
pub mod validation;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use extension::{ExtensionRegistry, RegistryError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use map::{MapContext, MappedEntity, SchemaMapper};
pub use model::entity::{Entity, EntityId, EntityKind};
pub use model::value::{Props, Value};
pub use repo::{
    EntityCollector, EntityRepository, RepoError, RepoResult, SelectQuery,
    SqliteEntityRepository,
};
pub use schema::{EntitySchema, SchemaError, SchemaRegistry};
pub use service::{EntityService, ServiceError, ServiceResult};
pub use validation::{ValidationAction, ValidationErrors, ValidationInput};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
