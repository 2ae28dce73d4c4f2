use chrono::NaiveDateTime;
use rusqlite::Connection;
use scholar_core::extension::EntityHook;
use scholar_core::map::DecisionProjector;
use scholar_core::schema::property::parse_datetime;
use scholar_core::service::{DecisionPolicy, DecisionService};
use scholar_core::{
    open_db_in_memory, Entity, EntityId, EntityKind, EntityService, ExtensionRegistry, MapContext,
    Props, SchemaRegistry, SqliteEntityRepository, Value,
};
use std::sync::{Arc, Mutex};

const EDITOR_A: EntityId = 7;
const EDITOR_B: EntityId = 8;
const EDITOR_C: EntityId = 9;

fn fixed_now() -> NaiveDateTime {
    parse_datetime("2024-05-20 09:30:00").unwrap()
}

fn service<'a>(
    conn: &'a Connection,
    schemas: &'a SchemaRegistry,
    extensions: &'a ExtensionRegistry,
) -> DecisionService<'a, SqliteEntityRepository<'a>> {
    let repo = SqliteEntityRepository::try_new(conn, schemas, EntityKind::Decision).unwrap();
    EntityService::new(repo, DecisionPolicy, extensions)
        .unwrap()
        .with_clock(fixed_now)
}

fn record(
    service: &DecisionService<'_, SqliteEntityRepository<'_>>,
    submission_id: EntityId,
    editor_id: EntityId,
    decision: i64,
) -> Entity {
    let mut entity = Entity::new(EntityKind::Decision);
    entity.set_data("submissionId", submission_id);
    entity.set_data("editorId", editor_id);
    entity.set_data("decision", decision);
    entity.set_data("stageId", 3_i64);
    service.add(entity).unwrap()
}

fn editor_of(decision: &Entity) -> Option<i64> {
    decision.get_data("editorId").and_then(Value::as_i64)
}

#[test]
fn add_records_decision_date_from_clock() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);

    let decision = record(&service, 1, EDITOR_A, 2);

    assert_eq!(decision.get_data("dateDecided"), Some(&Value::Date(fixed_now())));
    let stored: String = conn
        .query_row(
            "SELECT date_decided FROM edit_decisions WHERE edit_decision_id = ?1;",
            [decision.id().unwrap()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "2024-05-20 09:30:00");
}

#[test]
fn decisions_are_listed_per_submission() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);

    let first = record(&service, 1, EDITOR_A, 2);
    record(&service, 2, EDITOR_A, 3);
    let second = record(&service, 1, EDITOR_B, 4);

    let ids = service
        .get_by_submission(1)
        .unwrap()
        .iter()
        .filter_map(Entity::id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![first.id().unwrap(), second.id().unwrap()]);
    assert!(service.get_by_submission(3).unwrap().is_empty());
}

#[test]
fn reassign_moves_only_the_editors_decisions() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);

    record(&service, 1, EDITOR_A, 2);
    record(&service, 2, EDITOR_A, 3);
    let untouched = record(&service, 3, EDITOR_B, 4);

    assert_eq!(service.reassign_decisions(EDITOR_A, EDITOR_C).unwrap(), 2);

    let moved = service.get_collector().filter_by_editor_ids([EDITOR_C]);
    assert_eq!(service.get_count(&moved).unwrap(), 2);
    let left = service.get_collector().filter_by_editor_ids([EDITOR_A]);
    assert_eq!(service.get_count(&left).unwrap(), 0);

    let reloaded = service.get(untouched.id().unwrap()).unwrap().unwrap();
    assert_eq!(editor_of(&reloaded), Some(EDITOR_B));
    assert_eq!(reloaded.get_data("decision"), Some(&Value::Int(4)));
}

#[derive(Default)]
struct EditorLog {
    moves: Arc<Mutex<Vec<(Option<i64>, Option<i64>)>>>,
}

impl EntityHook for EditorLog {
    fn edited(&self, updated: &Entity, current: &Entity) {
        self.moves
            .lock()
            .unwrap()
            .push((editor_of(current), editor_of(updated)));
    }
}

#[test]
fn reassign_runs_edit_hooks_for_each_decision() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let moves = Arc::new(Mutex::new(Vec::new()));
    let mut extensions = ExtensionRegistry::new();
    extensions
        .register_entity_hook(
            "tests.editor-log",
            EntityKind::Decision,
            EditorLog {
                moves: Arc::clone(&moves),
            },
        )
        .unwrap();
    let service = service(&conn, &schemas, &extensions);
    record(&service, 1, EDITOR_A, 2);
    record(&service, 2, EDITOR_A, 3);
    record(&service, 3, EDITOR_B, 4);

    assert_eq!(service.reassign_decisions(EDITOR_A, EDITOR_C).unwrap(), 2);
    assert_eq!(
        *moves.lock().unwrap(),
        vec![
            (Some(EDITOR_A), Some(EDITOR_C)),
            (Some(EDITOR_A), Some(EDITOR_C)),
        ]
    );
}

#[test]
fn failed_reassign_leaves_every_decision_untouched() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);
    let first = record(&service, 1, EDITOR_A, 2);
    let second = record(&service, 2, EDITOR_A, 3);
    conn.execute_batch(
        "CREATE TRIGGER lock_submission_two BEFORE UPDATE ON edit_decisions
         WHEN NEW.submission_id = 2
         BEGIN SELECT RAISE(ABORT, 'submission 2 is locked'); END;",
    )
    .unwrap();

    assert!(service.reassign_decisions(EDITOR_A, EDITOR_C).is_err());

    for decision in [first, second] {
        let reloaded = service.get(decision.id().unwrap()).unwrap().unwrap();
        assert_eq!(editor_of(&reloaded), Some(EDITOR_A));
    }
    assert!(conn.is_autocommit());
}

#[test]
fn reassign_joins_an_open_transaction() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);
    let decision = record(&service, 1, EDITOR_A, 2);

    conn.execute_batch("BEGIN;").unwrap();
    assert_eq!(service.reassign_decisions(EDITOR_A, EDITOR_B).unwrap(), 1);
    conn.execute_batch("ROLLBACK;").unwrap();

    let reloaded = service.get(decision.id().unwrap()).unwrap().unwrap();
    assert_eq!(editor_of(&reloaded), Some(EDITOR_A));
    assert!(service.edit(&reloaded, &Props::new()).is_ok());
}

#[test]
fn reassign_to_same_editor_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);
    record(&service, 1, EDITOR_A, 2);

    assert_eq!(service.reassign_decisions(EDITOR_A, EDITOR_A).unwrap(), 0);
    assert_eq!(service.reassign_decisions(EDITOR_C, EDITOR_B).unwrap(), 0);
}

#[test]
fn mapped_decision_links_through_its_submission() {
    let conn = open_db_in_memory().unwrap();
    let schemas = SchemaRegistry::builtin().unwrap();
    let extensions = ExtensionRegistry::new();
    let service = service(&conn, &schemas, &extensions);
    let decision = record(&service, 4, EDITOR_A, 2);
    let id = decision.id().unwrap();

    let context = MapContext {
        base_url: "https://journals.example.org".to_string(),
        context_path: "jpk".to_string(),
        supported_locales: vec!["en_US".to_string()],
        now: fixed_now(),
    };
    let summary = service
        .schema_map(&context, DecisionProjector { submission_id: 4 })
        .summarize(&decision);

    assert_eq!(
        summary["_href"],
        format!("https://journals.example.org/jpk/api/v1/submissions/4/decisions/{id}")
    );
    assert_eq!(summary["dateDecided"], "2024-05-20 09:30:00");
    assert_eq!(summary["editorId"], EDITOR_A);
}
