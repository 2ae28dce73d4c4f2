//! Journal (context) rules.
//!
//! # Invariants
//! - `urlPath` is unique across journals and is never `"0"`.
//! - `primaryLocale` is one of the journal's supported locales.
//! - Supported locales are a subset of the site's installed locales, and
//!   form locales a subset of supported locales.

use super::entity_service::{EntityPolicy, EntityService};
use crate::model::entity::{Entity, EntityKind};
use crate::model::value::{Props, Value};
use crate::repo::collector::{ContextCollector, EntityCollector};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use crate::schema::EntitySchema;
use crate::validation::{ValidationErrors, ValidationInput};
use chrono::NaiveDateTime;

const PATH_EXISTS: &str = "A journal with this path already exists.";
const PATH_ZERO: &str = "The path cannot be 0.";
const PRIMARY_LOCALE_UNSUPPORTED: &str = "The primary locale must be one of the supported locales.";

#[derive(Debug, Clone, Default)]
pub struct ContextPolicy {
    site_locales: Vec<String>,
}

impl ContextPolicy {
    /// `site_locales` are the locales installed for the whole site.
    pub fn new(site_locales: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            site_locales: site_locales.into_iter().map(Into::into).collect(),
        }
    }

    pub fn site_locales(&self) -> &[String] {
        &self.site_locales
    }

    fn check_url_path(
        &self,
        repo: &dyn EntityRepository,
        input: &ValidationInput<'_>,
        errors: &mut ValidationErrors,
    ) -> RepoResult<()> {
        let Some(url_path) = input.props.get("urlPath").and_then(Value::as_str) else {
            return Ok(());
        };
        if url_path == "0" {
            errors.add("urlPath", PATH_ZERO);
            return Ok(());
        }

        let current_id = input.action.current().and_then(Entity::id);
        let query = ContextCollector::new()
            .filter_by_url_paths([url_path])
            .query_builder();
        let taken = repo
            .get_ids(&query)?
            .into_iter()
            .any(|id| Some(id) != current_id);
        if taken {
            errors.add("urlPath", PATH_EXISTS);
        }
        Ok(())
    }

    fn check_locales(&self, input: &ValidationInput<'_>, errors: &mut ValidationErrors) {
        let current = input.action.current();
        let supported = locale_list(input.props, current, "supportedLocales");

        for prop in ["supportedLocales", "supportedFormLocales"] {
            let Some(value) = input.props.get(prop) else {
                continue;
            };
            for locale in string_list(value) {
                if !self.site_locales.contains(&locale) {
                    errors.add(prop, format!("The locale `{locale}` is not supported."));
                }
            }
        }

        if let (Some(form_locales), Some(supported)) =
            (input.props.get("supportedFormLocales"), supported.as_ref())
        {
            for locale in string_list(form_locales) {
                if !supported.contains(&locale) {
                    errors.add(
                        "supportedFormLocales",
                        format!("The locale `{locale}` is not one of the supported locales."),
                    );
                }
            }
        }

        let touches_locales =
            input.props.contains_key("primaryLocale") || input.props.contains_key("supportedLocales");
        if !touches_locales {
            return;
        }
        let primary = input
            .props
            .get("primaryLocale")
            .or_else(|| current.and_then(|entity| entity.get_data("primaryLocale")))
            .and_then(Value::as_str);
        let Some(primary) = primary else {
            return;
        };
        let allowed = supported.unwrap_or_else(|| input.allowed_locales.to_vec());
        if !allowed.iter().any(|locale| locale == primary) {
            errors.add("primaryLocale", PRIMARY_LOCALE_UNSUPPORTED);
        }
    }
}

impl EntityPolicy for ContextPolicy {
    type Collector = ContextCollector;

    fn kind(&self) -> EntityKind {
        EntityKind::Context
    }

    fn validate(
        &self,
        repo: &dyn EntityRepository,
        input: &ValidationInput<'_>,
        errors: &mut ValidationErrors,
    ) -> RepoResult<()> {
        self.check_url_path(repo, input, errors)?;
        self.check_locales(input, errors);
        Ok(())
    }

    fn prepare_add(&self, schema: &EntitySchema, entity: &mut Entity, _now: NaiveDateTime) {
        for (name, value) in schema.defaults() {
            if entity.get_data(&name).is_none() {
                entity.set_data(name, value);
            }
        }
    }
}

pub type ContextService<'a, R> = EntityService<'a, R, ContextPolicy>;

impl<R: EntityRepository> EntityService<'_, R, ContextPolicy> {
    /// Looks up a journal by its URL path.
    pub fn get_by_url_path(&self, url_path: &str) -> RepoResult<Option<Entity>> {
        let collector = self.get_collector().filter_by_url_paths([url_path]).limit(1);
        Ok(self.get_many(&collector)?.into_iter().next())
    }
}

fn locale_list(
    props: &Props,
    current: Option<&Entity>,
    prop: &str,
) -> Option<Vec<String>> {
    props
        .get(prop)
        .or_else(|| current.and_then(|entity| entity.get_data(prop)))
        .map(string_list)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Json(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::String(single) => vec![single.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{string_list, ContextPolicy};
    use crate::model::entity::{Entity, EntityKind};
    use crate::model::value::{Props, Value};
    use crate::validation::{ValidationAction, ValidationErrors, ValidationInput};
    use serde_json::json;

    fn check(policy: &ContextPolicy, action: ValidationAction<'_>, props: &Props) -> ValidationErrors {
        let allowed = vec!["en_US".to_string()];
        let input = ValidationInput {
            action,
            props,
            allowed_locales: &allowed,
            primary_locale: "en_US",
        };
        let mut errors = ValidationErrors::new();
        policy.check_locales(&input, &mut errors);
        errors
    }

    #[test]
    fn string_list_reads_json_arrays() {
        assert_eq!(
            string_list(&Value::Json(json!(["en_US", 3, "fr_CA"]))),
            vec!["en_US".to_string(), "fr_CA".to_string()]
        );
        assert!(string_list(&Value::Null).is_empty());
    }

    #[test]
    fn primary_locale_must_be_supported() {
        let policy = ContextPolicy::new(["en_US", "fr_CA"]);
        let mut props = Props::new();
        props.insert("primaryLocale".to_string(), Value::from("fr_CA"));
        props.insert(
            "supportedLocales".to_string(),
            Value::Json(json!(["en_US"])),
        );

        let errors = check(&policy, ValidationAction::Add, &props);
        assert!(errors.contains("primaryLocale"));
    }

    #[test]
    fn supported_locales_must_be_installed_on_site() {
        let policy = ContextPolicy::new(["en_US"]);
        let mut props = Props::new();
        props.insert(
            "supportedLocales".to_string(),
            Value::Json(json!(["en_US", "de_DE"])),
        );

        let errors = check(&policy, ValidationAction::Add, &props);
        assert_eq!(
            errors.get("supportedLocales"),
            Some(&["The locale `de_DE` is not supported.".to_string()][..])
        );
    }

    #[test]
    fn form_locales_fall_back_to_stored_supported_locales() {
        let policy = ContextPolicy::new(["en_US", "fr_CA"]);
        let mut current = Entity::new(EntityKind::Context);
        current.set_id(1);
        current.set_data("primaryLocale", "en_US");
        current.set_data("supportedLocales", Value::Json(json!(["en_US"])));
        let mut props = Props::new();
        props.insert(
            "supportedFormLocales".to_string(),
            Value::Json(json!(["fr_CA"])),
        );

        let errors = check(&policy, ValidationAction::Edit(&current), &props);
        assert!(errors.contains("supportedFormLocales"));
        assert!(!errors.contains("primaryLocale"));
    }

    #[test]
    fn dropping_the_primary_locale_from_supported_is_rejected() {
        let policy = ContextPolicy::new(["en_US", "fr_CA"]);
        let mut current = Entity::new(EntityKind::Context);
        current.set_id(1);
        current.set_data("primaryLocale", "en_US");
        let mut props = Props::new();
        props.insert(
            "supportedLocales".to_string(),
            Value::Json(json!(["fr_CA"])),
        );

        let errors = check(&policy, ValidationAction::Edit(&current), &props);
        assert!(errors.contains("primaryLocale"));
    }
}
