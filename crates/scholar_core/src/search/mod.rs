//! Collector search support.
//!
//! # Responsibility
//! - Turn a free-text phrase into per-token LIKE predicates over settings.
//! - Keep escaping rules in one place for every collector.

pub mod phrase;
