//! Editorial decision rules.

use super::entity_service::{EntityPolicy, EntityService, ServiceError, ServiceResult};
use crate::model::entity::{Entity, EntityId, EntityKind};
use crate::model::value::{Props, Value};
use crate::repo::collector::DecisionCollector;
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use crate::schema::EntitySchema;
use chrono::NaiveDateTime;
use log::{error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPolicy;

impl EntityPolicy for DecisionPolicy {
    type Collector = DecisionCollector;

    fn kind(&self) -> EntityKind {
        EntityKind::Decision
    }

    fn prepare_add(&self, _schema: &EntitySchema, entity: &mut Entity, now: NaiveDateTime) {
        entity.set_data("dateDecided", now);
    }
}

pub type DecisionService<'a, R> = EntityService<'a, R, DecisionPolicy>;

impl<R: EntityRepository> EntityService<'_, R, DecisionPolicy> {
    /// Decisions recorded for one submission, oldest first.
    pub fn get_by_submission(&self, submission_id: EntityId) -> RepoResult<Vec<Entity>> {
        self.get_many(&self.get_collector().filter_by_submission_ids([submission_id]))
    }

    /// Moves every decision of `from_editor` to `to_editor`.
    ///
    /// Each decision goes through the edit pipeline, so entity hooks see the
    /// change. All updates commit together; a failure leaves every decision
    /// with its original editor. Returns the number of reassigned decisions.
    pub fn reassign_decisions(
        &self,
        from_editor: EntityId,
        to_editor: EntityId,
    ) -> ServiceResult<usize> {
        if from_editor == to_editor {
            return Ok(0);
        }

        let decisions = self.get_many(&self.get_collector().filter_by_editor_ids([from_editor]))?;
        let mut params = Props::new();
        params.insert("editorId".to_string(), Value::Int(to_editor));

        let result = self.repo().atomically(|| {
            for decision in &decisions {
                self.write_edit(decision, &params)?;
            }
            Ok::<_, ServiceError>(decisions.len())
        });

        match &result {
            Ok(count) => info!(
                "event=decision_reassign module=service status=ok from_editor={} to_editor={} count={}",
                from_editor, to_editor, count
            ),
            Err(err) => error!(
                "event=decision_reassign module=service status=error from_editor={} to_editor={} error={}",
                from_editor, to_editor, err
            ),
        }
        result
    }
}
