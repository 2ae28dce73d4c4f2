//! Input validation for entity add/edit requests.
//!
//! # Responsibility
//! - Check raw request props against schema types and rules.
//! - Check required props per action and locale allow-lists.
//! - Collect failures as a field -> messages map instead of failing fast.
//!
//! # Invariants
//! - Validation never returns `Err`; callers inspect `ValidationErrors`.
//! - Locale-specific failures are keyed `prop.locale`, others `prop`.

mod rules;

use crate::model::entity::Entity;
use crate::model::value::Props;
use serde::Serialize;
use std::collections::BTreeMap;

pub use rules::validate_props;

/// Whether props describe a new entity or changes to an existing one.
#[derive(Debug, Clone, Copy)]
pub enum ValidationAction<'a> {
    Add,
    /// Carries the currently stored entity.
    Edit(&'a Entity),
}

impl<'a> ValidationAction<'a> {
    pub fn is_add(&self) -> bool {
        matches!(self, Self::Add)
    }

    pub fn current(&self) -> Option<&'a Entity> {
        match *self {
            Self::Add => None,
            Self::Edit(entity) => Some(entity),
        }
    }
}

/// One validation request.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub action: ValidationAction<'a>,
    pub props: &'a Props,
    /// Locales multilingual values may be supplied in.
    pub allowed_locales: &'a [String],
    pub primary_locale: &'a str,
}

/// Field -> messages map. Empty when the input is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Adds a message keyed `prop.locale`.
    pub fn add_localized(&mut self, prop: &str, locale: &str, message: impl Into<String>) {
        self.add(format!("{prop}.{locale}"), message);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }
}
