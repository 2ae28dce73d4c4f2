//! Entity domain model.
//!
//! # Responsibility
//! - Define the attribute bag every persisted domain object uses.
//! - Keep values typed through a tagged union instead of loose strings.
//!
//! # Invariants
//! - Every persisted entity is identified by an integer `EntityId`.
//! - Property names are validated against a schema at the repository boundary.

pub mod entity;
pub mod value;
