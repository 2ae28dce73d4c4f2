//! Extension points.
//!
//! Third-party code registers typed implementations in an
//! `ExtensionRegistry`, which is then passed into collectors, services and
//! mappers. Nothing is dispatched through global state.

pub mod points;
pub mod registry;

pub use points::{CollectorExtension, EntityHook, MapExtension};
pub use registry::{ExtensionRegistry, RegistryError};
