use rusqlite::Connection;
use scholar_core::map::GalleyProjector;
use scholar_core::schema::property::parse_datetime;
use scholar_core::service::{
    label_from_file, FileAssoc, GalleyPolicy, GalleyReferences, GalleyService, PublicationStatus,
    ASSOC_TYPE_GALLEY,
};
use scholar_core::{
    open_db_in_memory, Entity, EntityId, EntityKind, EntityService, ExtensionRegistry, MapContext,
    Props, SchemaRegistry, ServiceError, SqliteEntityRepository, ValidationAction,
    ValidationErrors, ValidationInput, Value,
};
use std::cell::RefCell;
use std::collections::HashMap;

const QUEUED_PUBLICATION: EntityId = 10;
const PUBLISHED_PUBLICATION: EntityId = 11;

#[derive(Default)]
struct FakeReferences {
    temporary_files: Vec<EntityId>,
    submission_files: HashMap<EntityId, FileAssoc>,
    deleted_for: RefCell<Vec<EntityId>>,
    fail_deletes: bool,
}

impl GalleyReferences for FakeReferences {
    fn publication_status(&self, publication_id: EntityId) -> Option<PublicationStatus> {
        match publication_id {
            QUEUED_PUBLICATION => Some(PublicationStatus::Queued),
            PUBLISHED_PUBLICATION => Some(PublicationStatus::Published),
            _ => None,
        }
    }

    fn temporary_file_exists(&self, temporary_file_id: EntityId) -> bool {
        self.temporary_files.contains(&temporary_file_id)
    }

    fn submission_file(&self, submission_file_id: EntityId) -> Option<FileAssoc> {
        self.submission_files.get(&submission_file_id).copied()
    }

    fn delete_galley_files(&self, galley_id: EntityId) -> Result<usize, String> {
        if self.fail_deletes {
            return Err("file store offline".to_string());
        }
        self.deleted_for.borrow_mut().push(galley_id);
        Ok(1)
    }
}

type Service<'a> = GalleyService<'a, SqliteEntityRepository<'a>, FakeReferences>;

fn service<'a>(
    conn: &'a Connection,
    schemas: &'a SchemaRegistry,
    extensions: &'a ExtensionRegistry,
    references: FakeReferences,
) -> Service<'a> {
    let repo = SqliteEntityRepository::try_new(conn, schemas, EntityKind::Galley).unwrap();
    EntityService::new(repo, GalleyPolicy::new(references), extensions).unwrap()
}

fn validate(service: &Service<'_>, action: ValidationAction<'_>, props: &Props) -> ValidationErrors {
    let locales = vec!["en_US".to_string()];
    service
        .validate(&ValidationInput {
            action,
            props,
            allowed_locales: &locales,
            primary_locale: "en_US",
        })
        .unwrap()
}

fn galley_props(publication_id: EntityId) -> Props {
    let mut props = Props::new();
    props.insert("publicationId".to_string(), Value::Int(publication_id));
    props.insert("label".to_string(), Value::from("PDF"));
    props.insert("locale".to_string(), Value::from("en_US"));
    props
}

fn add_galley(service: &Service<'_>, props: Props) -> Entity {
    service
        .add(Entity::with_data(EntityKind::Galley, props))
        .unwrap()
}

#[test]
fn publication_must_exist_and_be_editable() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());

    let errors = validate(&service, ValidationAction::Add, &galley_props(99));
    assert!(errors.contains("publicationId"));

    let errors = validate(&service, ValidationAction::Add, &galley_props(PUBLISHED_PUBLICATION));
    assert_eq!(
        errors.get("publicationId"),
        Some(
            &["This publication has been published or scheduled and can not be edited."
                .to_string()][..]
        )
    );

    let errors = validate(&service, ValidationAction::Add, &galley_props(QUEUED_PUBLICATION));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn remote_galley_requires_remote_url() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());

    let mut props = galley_props(QUEUED_PUBLICATION);
    props.insert("isRemote".to_string(), Value::Bool(true));
    let errors = validate(&service, ValidationAction::Add, &props);
    assert_eq!(
        errors.get("urlRemote"),
        Some(&["This field is required.".to_string()][..])
    );

    props.insert(
        "urlRemote".to_string(),
        Value::from("https://example.org/article.pdf"),
    );
    assert!(validate(&service, ValidationAction::Add, &props).is_empty());
}

#[test]
fn local_galley_files_are_checked() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let mut references = FakeReferences {
        temporary_files: vec![7],
        ..FakeReferences::default()
    };
    references.submission_files.insert(
        30,
        FileAssoc {
            assoc_type: ASSOC_TYPE_GALLEY,
            assoc_id: 1,
        },
    );
    let service = service(&conn, &schemas, &extensions, references);

    let mut props = galley_props(QUEUED_PUBLICATION);
    props.insert("temporaryFileId".to_string(), Value::Int(8));
    assert!(validate(&service, ValidationAction::Add, &props).contains("temporaryFileId"));

    props.insert("temporaryFileId".to_string(), Value::Int(7));
    assert!(validate(&service, ValidationAction::Add, &props).is_empty());

    let galley = add_galley(&service, galley_props(QUEUED_PUBLICATION));
    assert_eq!(galley.id(), Some(1));

    let mut edit = Props::new();
    edit.insert("submissionFileId".to_string(), Value::Int(31));
    assert_eq!(
        validate(&service, ValidationAction::Edit(&galley), &edit).get("submissionFileId"),
        Some(&["The file could not be found.".to_string()][..])
    );

    edit.insert("submissionFileId".to_string(), Value::Int(30));
    assert!(validate(&service, ValidationAction::Edit(&galley), &edit).is_empty());
}

#[test]
fn file_attached_to_another_galley_is_not_valid() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let mut references = FakeReferences::default();
    references.submission_files.insert(
        40,
        FileAssoc {
            assoc_type: ASSOC_TYPE_GALLEY,
            assoc_id: 99,
        },
    );
    let service = service(&conn, &schemas, &extensions, references);
    let galley = add_galley(&service, galley_props(QUEUED_PUBLICATION));

    let mut edit = Props::new();
    edit.insert("submissionFileId".to_string(), Value::Int(40));
    assert_eq!(
        validate(&service, ValidationAction::Edit(&galley), &edit).get("submissionFileId"),
        Some(&["The file does not belong to this galley.".to_string()][..])
    );
}

#[test]
fn editing_a_local_galley_without_any_file_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());
    let galley = add_galley(&service, galley_props(QUEUED_PUBLICATION));

    let mut edit = Props::new();
    edit.insert("label".to_string(), Value::from("HTML"));
    assert!(validate(&service, ValidationAction::Edit(&galley), &edit).contains("isRemote"));
}

#[test]
fn delete_removes_galley_files() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());
    let galley = add_galley(&service, galley_props(QUEUED_PUBLICATION));
    let id = galley.id().unwrap();

    service.delete(&galley).unwrap();

    assert!(service.get(id).unwrap().is_none());
    assert_eq!(*service.policy().references().deleted_for.borrow(), vec![id]);
}

#[test]
fn failing_file_cleanup_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let references = FakeReferences {
        fail_deletes: true,
        ..FakeReferences::default()
    };
    let service = service(&conn, &schemas, &extensions, references);
    let galley = add_galley(&service, galley_props(QUEUED_PUBLICATION));

    let err = service.delete(&galley).unwrap_err();
    assert!(matches!(err, ServiceError::Collaborator(message) if message.contains("offline")));
}

#[test]
fn galleys_are_listed_per_publication_in_sequence_order() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());

    for (label, seq, publication_id) in [("HTML", 2, QUEUED_PUBLICATION), ("PDF", 1, QUEUED_PUBLICATION), ("XML", 0, 12)] {
        let mut props = galley_props(publication_id);
        props.insert("label".to_string(), Value::from(label));
        props.insert("seq".to_string(), Value::Int(seq));
        add_galley(&service, props);
    }

    let labels = service
        .get_by_publication(QUEUED_PUBLICATION)
        .unwrap()
        .iter()
        .filter_map(|galley| galley.get_data("label").and_then(Value::as_str).map(str::to_string))
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["PDF", "HTML"]);
}

#[test]
fn published_url_prefers_url_path() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions, FakeReferences::default());

    let mut props = galley_props(QUEUED_PUBLICATION);
    props.insert("urlPath".to_string(), Value::from("full-text"));
    let galley = add_galley(&service, props);
    let id = galley.id().unwrap();

    let context = MapContext {
        base_url: "https://journals.example.org".to_string(),
        context_path: "jpk".to_string(),
        supported_locales: vec!["en_US".to_string()],
        now: parse_datetime("2024-06-11 12:00:00").unwrap(),
    };
    let projector = GalleyProjector {
        submission_id: 3,
        publication_id: QUEUED_PUBLICATION,
    };
    let output = service.schema_map(&context, projector).map(&galley);

    assert_eq!(
        output["_href"],
        format!("https://journals.example.org/jpk/api/v1/submissions/3/publications/10/galleys/{id}")
    );
    assert_eq!(
        output["urlPublished"],
        "https://journals.example.org/jpk/article/view/3/version/10/full-text"
    );
    assert_eq!(label_from_file("article.pdf"), "PDF");
}
