//! Galley rules.
//!
//! Galleys reference publications and submission files that live outside
//! this crate; `GalleyReferences` is the seam to reach them.
//!
//! # Invariants
//! - Galleys of a published or scheduled publication cannot be changed.
//! - A remote galley carries `urlRemote`; a local one carries a file.
//! - Deleting a galley deletes the submission files attached to it.

use super::entity_service::{EntityPolicy, EntityService, ServiceError, ServiceResult};
use crate::model::entity::{Entity, EntityId, EntityKind};
use crate::model::value::Value;
use crate::repo::collector::GalleyCollector;
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use crate::validation::{ValidationErrors, ValidationInput};
use log::info;

/// Association type of files attached to a galley.
pub const ASSOC_TYPE_GALLEY: i64 = 514;

const REQUIRED: &str = "This field is required.";
const PUBLICATION_NOT_FOUND: &str = "The publication could not be found.";
const EDIT_PUBLISHED_DISABLED: &str =
    "This publication has been published or scheduled and can not be edited.";
const TEMPORARY_FILE_NOT_FOUND: &str = "The uploaded file could not be found.";
const FILE_NOT_FOUND: &str = "The file could not be found.";
const FILE_NOT_VALID: &str = "The file does not belong to this galley.";
const FILE_REQUIRED: &str = "A file must be uploaded for a local galley.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    Queued,
    Scheduled,
    Published,
    Declined,
}

impl PublicationStatus {
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Scheduled | Self::Published)
    }
}

/// Where a submission file is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAssoc {
    pub assoc_type: i64,
    pub assoc_id: EntityId,
}

/// Lookups and side effects on records owned by other subsystems.
pub trait GalleyReferences {
    fn publication_status(&self, publication_id: EntityId) -> Option<PublicationStatus>;

    fn temporary_file_exists(&self, temporary_file_id: EntityId) -> bool;

    fn submission_file(&self, submission_file_id: EntityId) -> Option<FileAssoc>;

    /// Deletes every submission file attached to the galley and returns
    /// how many were removed.
    fn delete_galley_files(&self, galley_id: EntityId) -> Result<usize, String>;
}

pub struct GalleyPolicy<G: GalleyReferences> {
    references: G,
}

impl<G: GalleyReferences> GalleyPolicy<G> {
    pub fn new(references: G) -> Self {
        Self { references }
    }

    pub fn references(&self) -> &G {
        &self.references
    }

    fn check_publication(&self, input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
        let Some(publication_id) = prop_or_current(input, "publicationId").and_then(Value::as_i64)
        else {
            return;
        };
        match self.references.publication_status(publication_id) {
            None => errors.add("publicationId", PUBLICATION_NOT_FOUND),
            Some(status) if status.is_locked() => {
                errors.add("publicationId", EDIT_PUBLISHED_DISABLED)
            }
            Some(_) => {}
        }
    }

    fn check_file(&self, input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
        let is_remote = prop_or_current(input, "isRemote").is_some_and(Value::is_truthy);
        if is_remote {
            let has_url = prop_or_current(input, "urlRemote").is_some_and(|url| !url.is_empty());
            if !has_url {
                errors.add("urlRemote", REQUIRED);
            }
            return;
        }

        if let Some(temporary_file_id) = input
            .props
            .get("temporaryFileId")
            .and_then(Value::as_i64)
        {
            if !self.references.temporary_file_exists(temporary_file_id) {
                errors.add("temporaryFileId", TEMPORARY_FILE_NOT_FOUND);
            }
            return;
        }

        if let Some(file_id) = input.props.get("submissionFileId").and_then(Value::as_i64) {
            match self.references.submission_file(file_id) {
                None => errors.add("submissionFileId", FILE_NOT_FOUND),
                Some(assoc) => {
                    let galley_id = input.action.current().and_then(Entity::id);
                    let owned = assoc.assoc_type == ASSOC_TYPE_GALLEY
                        && galley_id.map_or(true, |id| id == assoc.assoc_id);
                    if !owned {
                        errors.add("submissionFileId", FILE_NOT_VALID);
                    }
                }
            }
            return;
        }

        let has_stored_file = input
            .action
            .current()
            .and_then(|galley| galley.get_data("submissionFileId"))
            .is_some_and(|file| !file.is_null());
        if !input.action.is_add() && !has_stored_file {
            errors.add("isRemote", FILE_REQUIRED);
        }
    }
}

impl<G: GalleyReferences> EntityPolicy for GalleyPolicy<G> {
    type Collector = GalleyCollector;

    fn kind(&self) -> EntityKind {
        EntityKind::Galley
    }

    fn validate(
        &self,
        _repo: &dyn EntityRepository,
        input: &ValidationInput<'_>,
        errors: &mut ValidationErrors,
    ) -> RepoResult<()> {
        self.check_publication(input, errors);
        self.check_file(input, errors);
        Ok(())
    }

    fn after_delete(&self, galley: &Entity) -> ServiceResult<()> {
        let Some(galley_id) = galley.id() else {
            return Ok(());
        };
        let removed = self
            .references
            .delete_galley_files(galley_id)
            .map_err(ServiceError::Collaborator)?;
        info!(
            "event=galley_files_delete module=service status=ok galley_id={} files={}",
            galley_id, removed
        );
        Ok(())
    }
}

pub type GalleyService<'a, R, G> = EntityService<'a, R, GalleyPolicy<G>>;

impl<R: EntityRepository, G: GalleyReferences> EntityService<'_, R, GalleyPolicy<G>> {
    /// Galleys of one publication in display order.
    pub fn get_by_publication(&self, publication_id: EntityId) -> RepoResult<Vec<Entity>> {
        self.get_many(&self.get_collector().filter_by_publication_ids([publication_id]))
    }
}

/// Suggests a galley label from an uploaded file name.
pub fn label_from_file(filename: &str) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    let label = match extension.as_str() {
        "pdf" => "PDF",
        "epub" => "ePub",
        "csv" => "CSV",
        ext if ext.starts_with("htm") => "HTML",
        ext if ext.starts_with("doc") => "Word",
        ext if ext.starts_with("xls") => "Excel",
        _ => return filename.to_string(),
    };
    label.to_string()
}

fn prop_or_current<'v>(input: &ValidationInput<'v>, prop: &str) -> Option<&'v Value> {
    input
        .props
        .get(prop)
        .or_else(|| input.action.current().and_then(|current| current.get_data(prop)))
}
