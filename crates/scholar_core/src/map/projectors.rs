//! Virtual property projectors per entity kind.

use super::schema_map::{MapContext, PropertyProjector};
use crate::model::entity::{Entity, EntityId};
use serde_json::Value as Json;

fn entity_id(entity: &Entity) -> Json {
    entity.id().map_or(Json::Null, Json::from)
}

/// Announcements: `_href`, `url` and `age` in days.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnouncementProjector;

impl PropertyProjector for AnnouncementProjector {
    fn project(&self, prop: &str, entity: &Entity, context: &MapContext) -> Option<Json> {
        let id = entity.id()?;
        match prop {
            "_href" => Some(Json::from(context.api_url(&format!("announcements/{id}")))),
            "url" => Some(Json::from(context.page_url(&format!("announcement/view/{id}")))),
            "age" => {
                let posted = entity.get_data("datePosted").and_then(|value| value.as_date());
                Some(posted.map_or(Json::Null, |posted| {
                    Json::from((context.now - posted).num_days().abs())
                }))
            }
            _ => None,
        }
    }
}

/// Contexts: `_href` and the public `url`, both built from the context's own path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextProjector;

impl PropertyProjector for ContextProjector {
    fn project(&self, prop: &str, entity: &Entity, context: &MapContext) -> Option<Json> {
        match prop {
            "_href" => {
                let id = entity.id()?;
                Some(Json::from(context.api_url_in("_", &format!("contexts/{id}"))))
            }
            "url" => {
                let path = entity.get_data("urlPath").and_then(|value| value.as_str())?;
                Some(Json::from(context.page_url_in(path, "")))
            }
            _ => None,
        }
    }
}

/// Galleys are addressed through their submission and publication.
#[derive(Debug, Clone, Copy)]
pub struct GalleyProjector {
    pub submission_id: EntityId,
    pub publication_id: EntityId,
}

impl GalleyProjector {
    /// `urlPath` when set, otherwise the numeric id.
    fn best_galley_id(entity: &Entity) -> Json {
        match entity.get_data("urlPath").and_then(|value| value.as_str()) {
            Some(path) if !path.trim().is_empty() => Json::from(path),
            _ => entity_id(entity),
        }
    }
}

impl PropertyProjector for GalleyProjector {
    fn project(&self, prop: &str, entity: &Entity, context: &MapContext) -> Option<Json> {
        let id = entity.id()?;
        match prop {
            "_href" => Some(Json::from(context.api_url(&format!(
                "submissions/{}/publications/{}/galleys/{id}",
                self.submission_id, self.publication_id
            )))),
            "urlPublished" => {
                let best_id = match Self::best_galley_id(entity) {
                    Json::String(path) => path,
                    other => other.to_string(),
                };
                Some(Json::from(context.page_url(&format!(
                    "article/view/{}/version/{}/{best_id}",
                    self.submission_id, self.publication_id
                ))))
            }
            _ => None,
        }
    }
}

/// Decisions are addressed through their submission.
#[derive(Debug, Clone, Copy)]
pub struct DecisionProjector {
    pub submission_id: EntityId,
}

impl PropertyProjector for DecisionProjector {
    fn project(&self, prop: &str, entity: &Entity, context: &MapContext) -> Option<Json> {
        match prop {
            "_href" => {
                let id = entity.id()?;
                Some(Json::from(context.api_url(&format!(
                    "submissions/{}/decisions/{id}",
                    self.submission_id
                ))))
            }
            _ => None,
        }
    }
}
