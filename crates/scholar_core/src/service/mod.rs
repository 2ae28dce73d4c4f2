//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep kind-specific rules in small policies over one generic service.

pub mod announcement;
pub mod context;
pub mod decision;
pub mod entity_service;
pub mod galley;

pub use announcement::{AnnouncementPolicy, AnnouncementService};
pub use context::{ContextPolicy, ContextService};
pub use decision::{DecisionPolicy, DecisionService};
pub use entity_service::{EntityPolicy, EntityService, ServiceError, ServiceResult};
pub use galley::{
    label_from_file, FileAssoc, GalleyPolicy, GalleyReferences, GalleyService, PublicationStatus,
    ASSOC_TYPE_GALLEY,
};
