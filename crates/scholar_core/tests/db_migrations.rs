use scholar_core::db::migrations::latest_version;
use scholar_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "announcements",
        "announcement_settings",
        "journals",
        "journal_settings",
        "publication_galleys",
        "publication_galley_settings",
        "edit_decisions",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scholar.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "journals");
}

#[test]
fn settings_rows_are_unique_per_entity_locale_and_name() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO announcement_settings (announcement_id, locale, setting_name, setting_value)
         VALUES (1, 'en_US', 'title', 'first');",
        [],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO announcement_settings (announcement_id, locale, setting_name, setting_value)
         VALUES (1, 'en_US', 'title', 'second');",
        [],
    );
    assert!(duplicate.is_err());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_migration_step_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clash.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_announcements.sql"))
        .unwrap();
    conn.execute_batch("CREATE TABLE journals (journal_id INTEGER PRIMARY KEY); PRAGMA user_version = 1;")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(
        matches!(err, DbError::Migration { version: 2, name: "contexts", .. }),
        "unexpected error: {err}"
    );
    assert!(err.to_string().contains("migration 0002 (contexts)"));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 1);
    let galleys: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'publication_galleys';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(galleys, 0);
}

#[test]
fn current_version_without_entity_tables_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hollow.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::MissingTables { version, tables } => {
            assert_eq!(version, 1);
            assert_eq!(tables, vec!["announcements", "announcement_settings"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
