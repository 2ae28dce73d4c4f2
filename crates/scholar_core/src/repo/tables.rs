//! Storage layout per entity kind.
//!
//! # Invariants
//! - `primary_columns` always starts with the `id` -> primary key mapping.
//! - Properties not listed in `primary_columns` live in the settings table;
//!   kinds without a settings table silently drop them.

use crate::model::entity::{EntityKind, ID_PROP};

/// Context association type stored on announcements.
pub const ASSOC_TYPE_JOURNAL: i64 = 256;

/// Table names and property -> column mapping for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTable {
    pub kind: EntityKind,
    pub table: &'static str,
    pub alias: &'static str,
    pub primary_key_column: &'static str,
    pub settings_table: Option<&'static str>,
    /// `(property, column)` pairs stored on the primary row.
    pub primary_columns: &'static [(&'static str, &'static str)],
}

pub const ANNOUNCEMENTS: EntityTable = EntityTable {
    kind: EntityKind::Announcement,
    table: "announcements",
    alias: "a",
    primary_key_column: "announcement_id",
    settings_table: Some("announcement_settings"),
    primary_columns: &[
        (ID_PROP, "announcement_id"),
        ("assocId", "assoc_id"),
        ("assocType", "assoc_type"),
        ("typeId", "type_id"),
        ("dateExpire", "date_expire"),
        ("datePosted", "date_posted"),
    ],
};

pub const CONTEXTS: EntityTable = EntityTable {
    kind: EntityKind::Context,
    table: "journals",
    alias: "c",
    primary_key_column: "journal_id",
    settings_table: Some("journal_settings"),
    primary_columns: &[
        (ID_PROP, "journal_id"),
        ("urlPath", "path"),
        ("seq", "seq"),
        ("primaryLocale", "primary_locale"),
        ("enabled", "enabled"),
    ],
};

pub const GALLEYS: EntityTable = EntityTable {
    kind: EntityKind::Galley,
    table: "publication_galleys",
    alias: "g",
    primary_key_column: "galley_id",
    settings_table: Some("publication_galley_settings"),
    primary_columns: &[
        (ID_PROP, "galley_id"),
        ("locale", "locale"),
        ("publicationId", "publication_id"),
        ("label", "label"),
        ("submissionFileId", "submission_file_id"),
        ("seq", "seq"),
        ("urlRemote", "remote_url"),
        ("isApproved", "is_approved"),
        ("urlPath", "url_path"),
        ("isRemote", "is_remote"),
    ],
};

pub const DECISIONS: EntityTable = EntityTable {
    kind: EntityKind::Decision,
    table: "edit_decisions",
    alias: "ed",
    primary_key_column: "edit_decision_id",
    settings_table: None,
    primary_columns: &[
        (ID_PROP, "edit_decision_id"),
        ("dateDecided", "date_decided"),
        ("decision", "decision"),
        ("editorId", "editor_id"),
        ("reviewRoundId", "review_round_id"),
        ("round", "round"),
        ("stageId", "stage_id"),
        ("submissionId", "submission_id"),
    ],
};

impl EntityTable {
    pub fn for_kind(kind: EntityKind) -> &'static EntityTable {
        match kind {
            EntityKind::Announcement => &ANNOUNCEMENTS,
            EntityKind::Context => &CONTEXTS,
            EntityKind::Galley => &GALLEYS,
            EntityKind::Decision => &DECISIONS,
        }
    }

    /// Column backing `prop` on the primary row, if any.
    pub fn column_for(&self, prop: &str) -> Option<&'static str> {
        self.primary_columns
            .iter()
            .find(|(name, _)| *name == prop)
            .map(|(_, column)| *column)
    }

    pub fn is_primary(&self, prop: &str) -> bool {
        self.column_for(prop).is_some()
    }

    /// `alias.column` for use in collector predicates.
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }

    pub fn qualified_primary_key(&self) -> String {
        self.qualified(self.primary_key_column)
    }
}

#[cfg(test)]
mod tests {
    use super::EntityTable;
    use crate::model::entity::{EntityKind, ID_PROP};

    #[test]
    fn every_kind_maps_id_to_its_primary_key() {
        for kind in EntityKind::ALL {
            let table = EntityTable::for_kind(kind);
            assert_eq!(table.kind, kind);
            assert_eq!(table.primary_columns[0], (ID_PROP, table.primary_key_column));
        }
    }

    #[test]
    fn resolves_renamed_columns() {
        let contexts = EntityTable::for_kind(EntityKind::Context);
        assert_eq!(contexts.column_for("urlPath"), Some("path"));
        assert!(!contexts.is_primary("name"));
        assert_eq!(contexts.qualified_primary_key(), "c.journal_id");
    }
}
