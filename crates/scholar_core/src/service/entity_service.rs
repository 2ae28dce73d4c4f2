//! Generic entity use-case service.
//!
//! # Responsibility
//! - Orchestrate validation, add/edit/delete and extension hooks around a
//!   repository.
//! - Delegate kind-specific rules to an `EntityPolicy`.
//!
//! # Invariants
//! - Authorization is the caller's responsibility; no checks happen here.
//! - `edit` merges params over the stored entity; absent keys are preserved.
//! - Validation failures are returned as data, never as `Err`.

use crate::extension::ExtensionRegistry;
use crate::map::{MapContext, PropertyProjector, SchemaMapper};
use crate::model::entity::{Entity, EntityId, EntityKind};
use crate::model::value::Props;
use crate::repo::collector::EntityCollector;
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};
use crate::schema::EntitySchema;
use crate::validation::{validate_props, ValidationErrors, ValidationInput};
use chrono::{NaiveDateTime, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for entity use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Target entity does not exist.
    NotFound(EntityKind, EntityId),
    /// An external collaborator (file store, publication lookup) failed.
    Collaborator(String),
    /// Service was wired with a repository of another kind.
    KindMismatch {
        repository: EntityKind,
        policy: EntityKind,
    },
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            Self::Collaborator(message) => write!(f, "collaborator failed: {message}"),
            Self::KindMismatch { repository, policy } => write!(
                f,
                "repository for `{repository}` cannot serve a `{policy}` service"
            ),
            Self::InconsistentState(details) => write!(f, "inconsistent entity state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(kind, id) => Self::NotFound(kind, id),
            other => Self::Repo(other),
        }
    }
}

/// Kind-specific rules plugged into `EntityService`.
pub trait EntityPolicy {
    type Collector: EntityCollector + Default;

    fn kind(&self) -> EntityKind;

    /// Adds kind-specific validation errors after the schema checks.
    fn validate(
        &self,
        _repo: &dyn EntityRepository,
        _input: &ValidationInput<'_>,
        _errors: &mut ValidationErrors,
    ) -> RepoResult<()> {
        Ok(())
    }

    /// Stamps system fields on a new entity before insert.
    fn prepare_add(&self, _schema: &EntitySchema, _entity: &mut Entity, _now: NaiveDateTime) {}

    /// Adjusts the merged entity before update.
    fn prepare_edit(&self, _updated: &mut Entity, _current: &Entity, _now: NaiveDateTime) {}

    /// Cleans up dependent resources after the entity was deleted.
    fn after_delete(&self, _entity: &Entity) -> ServiceResult<()> {
        Ok(())
    }
}

fn system_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Service facade over one entity repository.
pub struct EntityService<'a, R: EntityRepository, P: EntityPolicy> {
    repo: R,
    policy: P,
    extensions: &'a ExtensionRegistry,
    clock: fn() -> NaiveDateTime,
}

impl<'a, R: EntityRepository, P: EntityPolicy> EntityService<'a, R, P> {
    /// Creates a service; the repository and policy must serve the same kind.
    pub fn new(repo: R, policy: P, extensions: &'a ExtensionRegistry) -> ServiceResult<Self> {
        if repo.kind() != policy.kind() {
            return Err(ServiceError::KindMismatch {
                repository: repo.kind(),
                policy: policy.kind(),
            });
        }
        Ok(Self {
            repo,
            policy,
            extensions,
            clock: system_now,
        })
    }

    /// Replaces the clock used for system timestamps.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.policy.kind()
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn schema(&self) -> &EntitySchema {
        self.repo.schema()
    }

    /// Creates an unsaved entity with schema defaults.
    pub fn new_entity(&self) -> Entity {
        self.repo.new_entity()
    }

    pub fn get(&self, id: EntityId) -> RepoResult<Option<Entity>> {
        self.repo.get(id)
    }

    pub fn exists(&self, id: EntityId) -> RepoResult<bool> {
        self.repo.exists(id)
    }

    pub fn get_collector(&self) -> P::Collector {
        P::Collector::default()
    }

    pub fn get_many(&self, collector: &P::Collector) -> RepoResult<Vec<Entity>> {
        self.repo.get_many(&collector.extended_query(self.extensions))
    }

    /// Total matching entities; limit and offset are ignored.
    pub fn get_count(&self, collector: &P::Collector) -> RepoResult<u64> {
        self.repo.get_count(&collector.extended_query(self.extensions))
    }

    pub fn get_ids(&self, collector: &P::Collector) -> RepoResult<Vec<EntityId>> {
        self.repo.get_ids(&collector.extended_query(self.extensions))
    }

    /// Validates request props for an add or edit.
    ///
    /// Returns an empty map when the props are valid. `Err` is reserved for
    /// storage failures during lookups.
    pub fn validate(&self, input: &ValidationInput<'_>) -> RepoResult<ValidationErrors> {
        let mut errors = validate_props(self.repo.schema(), input);
        self.policy.validate(&self.repo, input, &mut errors)?;
        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.validate(input, &mut errors);
        }

        if !errors.is_empty() {
            warn!(
                "event=entity_validate module=service status=invalid kind={} fields={}",
                self.kind(),
                errors.fields().collect::<Vec<_>>().join(",")
            );
        }
        Ok(errors)
    }

    /// Inserts a new entity and returns it as read back from storage.
    pub fn add(&self, mut entity: Entity) -> ServiceResult<Entity> {
        let now = (self.clock)();
        self.policy.prepare_add(self.repo.schema(), &mut entity, now);
        let id = self.repo.insert(&mut entity)?;

        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.added(&entity);
        }
        info!(
            "event=entity_add module=service status=ok kind={} id={}",
            self.kind(),
            id
        );

        self.repo
            .get(id)?
            .ok_or(ServiceError::InconsistentState("added entity not found in read-back"))
    }

    /// Merges `params` over `current`, writes the result and returns the
    /// entity as read back from storage.
    pub fn edit(&self, current: &Entity, params: &Props) -> ServiceResult<Entity> {
        let id = self.write_edit(current, params)?;
        self.repo
            .get(id)?
            .ok_or(ServiceError::InconsistentState("edited entity not found in read-back"))
    }

    /// Edit pipeline without the read-back: merge, policy, hooks, update.
    pub(super) fn write_edit(&self, current: &Entity, params: &Props) -> ServiceResult<EntityId> {
        let id = current.id().ok_or_else(|| {
            ServiceError::Repo(RepoError::ContractViolation(format!(
                "cannot edit an unsaved {}",
                self.kind()
            )))
        })?;

        let mut updated = current.merged_with(params);
        updated.set_id(id);
        self.policy.prepare_edit(&mut updated, current, (self.clock)());
        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.editing(&mut updated, current, params);
        }

        self.repo.update(&updated)?;
        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.edited(&updated, current);
        }
        info!(
            "event=entity_edit module=service status=ok kind={} id={} props={}",
            self.kind(),
            id,
            params.keys().cloned().collect::<Vec<_>>().join(",")
        );
        Ok(id)
    }

    /// Deletes the entity, then lets the policy remove dependent resources.
    pub fn delete(&self, entity: &Entity) -> ServiceResult<()> {
        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.deleting(entity);
        }
        self.repo.delete(entity)?;
        self.policy.after_delete(entity)?;
        for hook in self.extensions.entity_hooks(self.kind()) {
            hook.deleted(entity);
        }
        info!(
            "event=entity_delete module=service status=ok kind={} id={}",
            self.kind(),
            entity.id().unwrap_or_default()
        );
        Ok(())
    }

    /// Builds a mapper for this kind.
    pub fn schema_map<'m, M: PropertyProjector>(
        &'m self,
        context: &'m MapContext,
        projector: M,
    ) -> SchemaMapper<'m, M> {
        SchemaMapper::new(self.repo.schema(), context, self.extensions, projector)
    }
}
