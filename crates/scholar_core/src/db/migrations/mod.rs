//! Entity-table migrations.
//!
//! Each step creates the primary and settings tables of one entity kind.
//! The applied step is mirrored to `PRAGMA user_version`; all pending steps
//! run in a single transaction, so a failing step leaves the file at its
//! previous version.

use crate::db::{DbError, DbResult};
use crate::model::entity::EntityKind;
use crate::repo::tables::EntityTable;
use log::{debug, error, info};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    kind: EntityKind,
    sql: &'static str,
}

impl Migration {
    /// Tables this step is expected to leave behind.
    fn tables(&self) -> Vec<&'static str> {
        let table = EntityTable::for_kind(self.kind);
        std::iter::once(table.table)
            .chain(table.settings_table)
            .collect()
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "announcements",
        kind: EntityKind::Announcement,
        sql: include_str!("0001_announcements.sql"),
    },
    Migration {
        version: 2,
        name: "contexts",
        kind: EntityKind::Context,
        sql: include_str!("0002_contexts.sql"),
    },
    Migration {
        version: 3,
        name: "galleys",
        kind: EntityKind::Galley,
        sql: include_str!("0003_galleys.sql"),
    },
    Migration {
        version: 4,
        name: "decisions",
        kind: EntityKind::Decision,
        sql: include_str!("0004_decisions.sql"),
    },
];

/// Latest entity-table layout this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` to [`latest_version`] and checks every entity table exists.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = recorded_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version < latest {
        let tx = conn.transaction()?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
            apply_step(&tx, migration)?;
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            current_version, latest
        );
    }

    for migration in MIGRATIONS {
        let missing = missing_tables(conn, migration)?;
        if !missing.is_empty() {
            error!(
                "event=db_migrate module=db status=error version={} error_code=missing_tables tables={}",
                migration.version,
                missing.join(",")
            );
            return Err(DbError::MissingTables {
                version: migration.version,
                tables: missing,
            });
        }
    }
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    tx.execute_batch(migration.sql)
        .and_then(|()| tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version)))
        .map_err(|source| {
            error!(
                "event=db_migrate module=db status=error version={} name={} error={}",
                migration.version, migration.name, source
            );
            DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            }
        })?;
    debug!(
        "event=db_migrate module=db status=applied version={} name={} kind={}",
        migration.version, migration.name, migration.kind
    );
    Ok(())
}

fn missing_tables(conn: &Connection, migration: &Migration) -> DbResult<Vec<&'static str>> {
    let mut stmt =
        conn.prepare("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);")?;
    let mut missing = Vec::new();
    for table in migration.tables() {
        let exists: bool = stmt.query_row([table], |row| row.get(0))?;
        if !exists {
            missing.push(table);
        }
    }
    Ok(missing)
}

fn recorded_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
