//! Per-entity collectors: fluent filter/pagination builders.
//!
//! # Responsibility
//! - Accumulate filters, a search phrase, limit and offset for one kind.
//! - Emit one `SelectQuery` over the kind's primary table.
//!
//! # Invariants
//! - `limit(0)` means unlimited.
//! - Registered collector extensions run after every built-in predicate.

use super::query::{SelectQuery, SortDirection};
use super::tables::{EntityTable, ANNOUNCEMENTS, CONTEXTS, DECISIONS, GALLEYS};
use crate::extension::ExtensionRegistry;
use crate::model::entity::{EntityId, EntityKind};
use crate::search::phrase::{phrase_condition, SearchTarget};

/// Query description for one entity kind.
pub trait EntityCollector {
    fn kind(&self) -> EntityKind;

    /// Builds the query from the configured filters.
    fn query_builder(&self) -> SelectQuery;

    /// Builds the query and lets registered extensions alter it.
    fn extended_query(&self, extensions: &ExtensionRegistry) -> SelectQuery {
        let mut query = self.query_builder();
        for extension in extensions.collector_extensions(self.kind()) {
            extension.extend_query(&mut query);
        }
        query
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Pagination {
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Pagination {
    fn set_limit(&mut self, count: u32) {
        self.limit = (count > 0).then_some(count);
    }

    fn set_offset(&mut self, offset: u32) {
        self.offset = (offset > 0).then_some(offset);
    }

    fn apply(&self, query: &mut SelectQuery) {
        query.limit(self.limit).offset(self.offset);
    }
}

fn apply_search(query: &mut SelectQuery, table: &EntityTable, fields: &[&str], phrase: &str) {
    let Some(settings_table) = table.settings_table else {
        return;
    };
    let outer_key = table.qualified_primary_key();
    let target = SearchTarget {
        outer_key: &outer_key,
        settings_table,
        key_column: table.primary_key_column,
        fields,
    };
    if let Some(condition) = phrase_condition(target, phrase) {
        query.where_condition(condition);
    }
}

fn base_query(table: &EntityTable) -> SelectQuery {
    SelectQuery::table(table.table, table.alias)
}

/// Announcement collector.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementCollector {
    context_ids: Vec<EntityId>,
    type_ids: Vec<i64>,
    search_phrase: String,
    pagination: Pagination,
}

impl AnnouncementCollector {
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "descriptionShort", "description"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_by_context_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.context_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_type_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.type_ids = ids.into_iter().collect();
        self
    }

    pub fn search_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.search_phrase = phrase.into();
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.pagination.set_limit(count);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.pagination.set_offset(offset);
        self
    }
}

impl EntityCollector for AnnouncementCollector {
    fn kind(&self) -> EntityKind {
        EntityKind::Announcement
    }

    fn query_builder(&self) -> SelectQuery {
        let table = &ANNOUNCEMENTS;
        let mut query = base_query(table);

        if !self.context_ids.is_empty() {
            query.where_in(&table.qualified("assoc_id"), self.context_ids.iter().copied());
        }
        if !self.type_ids.is_empty() {
            query.where_in(&table.qualified("type_id"), self.type_ids.iter().copied());
        }
        apply_search(&mut query, table, Self::SEARCH_FIELDS, &self.search_phrase);

        query
            .order_by(&table.qualified("date_posted"), SortDirection::Desc)
            .order_by(&table.qualified_primary_key(), SortDirection::Desc);
        self.pagination.apply(&mut query);
        query
    }
}

/// Context (journal) collector.
#[derive(Debug, Clone, Default)]
pub struct ContextCollector {
    is_enabled: Option<bool>,
    url_paths: Vec<String>,
    search_phrase: String,
    pagination: Pagination,
}

impl ContextCollector {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description", "acronym", "abbreviation"];

    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(true)` keeps enabled contexts, `Some(false)` disabled ones.
    pub fn filter_by_is_enabled(mut self, enabled: Option<bool>) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn filter_by_url_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn search_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.search_phrase = phrase.into();
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.pagination.set_limit(count);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.pagination.set_offset(offset);
        self
    }
}

impl EntityCollector for ContextCollector {
    fn kind(&self) -> EntityKind {
        EntityKind::Context
    }

    fn query_builder(&self) -> SelectQuery {
        let table = &CONTEXTS;
        let mut query = base_query(table);

        if let Some(enabled) = self.is_enabled {
            query.where_eq(&table.qualified("enabled"), i64::from(enabled));
        }
        if !self.url_paths.is_empty() {
            query.where_in(&table.qualified("path"), self.url_paths.iter().cloned());
        }
        apply_search(&mut query, table, Self::SEARCH_FIELDS, &self.search_phrase);

        query
            .order_by(&table.qualified("seq"), SortDirection::Asc)
            .order_by(&table.qualified_primary_key(), SortDirection::Asc);
        self.pagination.apply(&mut query);
        query
    }
}

/// Publication galley collector.
#[derive(Debug, Clone, Default)]
pub struct GalleyCollector {
    publication_ids: Vec<EntityId>,
    url_path: Option<String>,
    pagination: Pagination,
}

impl GalleyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_by_publication_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.publication_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_url_path(mut self, url_path: impl Into<String>) -> Self {
        self.url_path = Some(url_path.into());
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.pagination.set_limit(count);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.pagination.set_offset(offset);
        self
    }
}

impl EntityCollector for GalleyCollector {
    fn kind(&self) -> EntityKind {
        EntityKind::Galley
    }

    fn query_builder(&self) -> SelectQuery {
        let table = &GALLEYS;
        let mut query = base_query(table);

        if !self.publication_ids.is_empty() {
            query.where_in(
                &table.qualified("publication_id"),
                self.publication_ids.iter().copied(),
            );
        }
        if let Some(url_path) = &self.url_path {
            query.where_eq(&table.qualified("url_path"), url_path.clone());
        }

        query
            .order_by(&table.qualified("seq"), SortDirection::Asc)
            .order_by(&table.qualified_primary_key(), SortDirection::Asc);
        self.pagination.apply(&mut query);
        query
    }
}

/// Editorial decision collector.
#[derive(Debug, Clone, Default)]
pub struct DecisionCollector {
    submission_ids: Vec<EntityId>,
    editor_ids: Vec<EntityId>,
    stage_ids: Vec<i64>,
    review_round_ids: Vec<EntityId>,
    rounds: Vec<i64>,
    decision_types: Vec<i64>,
    pagination: Pagination,
}

impl DecisionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_by_submission_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.submission_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_editor_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.editor_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_stage_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.stage_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_review_round_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.review_round_ids = ids.into_iter().collect();
        self
    }

    pub fn filter_by_rounds(mut self, rounds: impl IntoIterator<Item = i64>) -> Self {
        self.rounds = rounds.into_iter().collect();
        self
    }

    pub fn filter_by_decision_types(mut self, types: impl IntoIterator<Item = i64>) -> Self {
        self.decision_types = types.into_iter().collect();
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.pagination.set_limit(count);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.pagination.set_offset(offset);
        self
    }
}

impl EntityCollector for DecisionCollector {
    fn kind(&self) -> EntityKind {
        EntityKind::Decision
    }

    fn query_builder(&self) -> SelectQuery {
        let table = &DECISIONS;
        let mut query = base_query(table);

        for (column, values) in [
            ("submission_id", &self.submission_ids),
            ("editor_id", &self.editor_ids),
            ("stage_id", &self.stage_ids),
            ("review_round_id", &self.review_round_ids),
            ("round", &self.rounds),
            ("decision", &self.decision_types),
        ] {
            if !values.is_empty() {
                query.where_in(&table.qualified(column), values.iter().copied());
            }
        }

        query
            .order_by(&table.qualified("date_decided"), SortDirection::Asc)
            .order_by(&table.qualified_primary_key(), SortDirection::Asc);
        self.pagination.apply(&mut query);
        query
    }
}

#[cfg(test)]
mod tests {
    use super::{AnnouncementCollector, ContextCollector, DecisionCollector, EntityCollector};
    use crate::extension::ExtensionRegistry;
    use crate::model::entity::EntityKind;
    use crate::repo::query::SelectQuery;

    #[test]
    fn announcement_query_applies_filters_and_order() {
        let (sql, params) = AnnouncementCollector::new()
            .filter_by_context_ids([5])
            .filter_by_type_ids([1, 2])
            .limit(10)
            .offset(20)
            .query_builder()
            .to_sql();
        assert_eq!(
            sql,
            "SELECT a.* FROM announcements AS a WHERE a.assoc_id IN (?) AND a.type_id IN (?, ?) \
             ORDER BY a.date_posted DESC, a.announcement_id DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let (sql, params) = ContextCollector::new().limit(0).offset(0).query_builder().to_sql();
        assert!(!sql.contains("LIMIT"));
        assert!(params.is_empty());
    }

    #[test]
    fn search_phrase_adds_one_clause_per_token() {
        let (sql, _) = ContextCollector::new()
            .search_phrase("open access")
            .query_builder()
            .to_sql();
        assert_eq!(sql.matches("EXISTS").count(), 2);
        assert!(sql.contains("journal_settings"));
    }

    #[test]
    fn extensions_run_after_builtin_filters() {
        let mut registry = ExtensionRegistry::new();
        registry
            .register_collector_extension(
                "tests.editor-filter",
                EntityKind::Decision,
                |query: &mut SelectQuery| {
                    query.where_eq("ed.editor_id", 7_i64);
                },
            )
            .unwrap();

        let (sql, _) = DecisionCollector::new()
            .filter_by_submission_ids([3])
            .extended_query(&registry)
            .to_sql();
        assert!(sql.contains("WHERE ed.submission_id IN (?) AND ed.editor_id = ?"));
    }
}
