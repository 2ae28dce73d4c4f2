//! Announcement rules.
//!
//! # Invariants
//! - `datePosted` is stamped by the service on add.
//! - Announcements without an `assocType` belong to a journal.

use super::entity_service::{EntityPolicy, EntityService};
use crate::model::entity::{Entity, EntityId, EntityKind};
use crate::repo::collector::AnnouncementCollector;
use crate::repo::entity_repo::EntityRepository;
use crate::repo::tables::ASSOC_TYPE_JOURNAL;
use crate::schema::EntitySchema;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnouncementPolicy;

impl EntityPolicy for AnnouncementPolicy {
    type Collector = AnnouncementCollector;

    fn kind(&self) -> EntityKind {
        EntityKind::Announcement
    }

    fn prepare_add(&self, _schema: &EntitySchema, entity: &mut Entity, now: NaiveDateTime) {
        entity.set_data("datePosted", now);
        if entity.get_data("assocType").map_or(true, |value| value.is_null()) {
            entity.set_data("assocType", ASSOC_TYPE_JOURNAL);
        }
    }
}

pub type AnnouncementService<'a, R> = EntityService<'a, R, AnnouncementPolicy>;

impl<R: EntityRepository> EntityService<'_, R, AnnouncementPolicy> {
    /// Creates an unsaved announcement attached to a journal.
    pub fn new_in_context(&self, context_id: EntityId) -> Entity {
        let mut announcement = self.new_entity();
        announcement.set_data("assocType", ASSOC_TYPE_JOURNAL);
        announcement.set_data("assocId", context_id);
        announcement
    }
}
