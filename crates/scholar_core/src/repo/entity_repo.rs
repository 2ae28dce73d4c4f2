//! Entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Map schema-described entities onto a primary table plus a key/value
//!   settings table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Only schema-declared, non-virtual properties are persisted.
//! - At most one settings row exists per `(id, locale, setting_name)`.
//! - Insert and update write both tables inside one transaction.
//! - Read paths reject persisted values that cannot be read as their
//!   declared type instead of masking them.

use super::convert::{from_db, to_column, to_setting};
use super::query::SelectQuery;
use super::tables::EntityTable;
use crate::db::DbError;
use crate::model::entity::{Entity, EntityId, EntityKind, ID_PROP};
use crate::model::value::{Props, Value};
use crate::schema::{EntitySchema, SchemaError, SchemaRegistry};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Schema(SchemaError),
    NotFound(EntityKind, EntityId),
    /// Persisted data cannot be read back as its declared type.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Caller broke a repository contract.
    ContractViolation(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "entity repository requires column `{column}` in table `{table}`"
            ),
            Self::ContractViolation(message) => {
                write!(f, "entity repository contract violated: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Repository interface for one entity kind.
pub trait EntityRepository {
    fn kind(&self) -> EntityKind;
    fn schema(&self) -> &EntitySchema;

    /// Creates an unsaved entity carrying the schema defaults.
    fn new_entity(&self) -> Entity {
        Entity::with_data(self.kind(), self.schema().defaults())
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Entity>>;
    fn exists(&self, id: EntityId) -> RepoResult<bool>;
    fn get_many(&self, query: &SelectQuery) -> RepoResult<Vec<Entity>>;
    /// Counts matching rows, ignoring the query's limit and offset.
    fn get_count(&self, query: &SelectQuery) -> RepoResult<u64>;
    fn get_ids(&self, query: &SelectQuery) -> RepoResult<Vec<EntityId>>;
    /// Inserts a new entity and stores the assigned id on it.
    fn insert(&self, entity: &mut Entity) -> RepoResult<EntityId>;
    fn update(&self, entity: &Entity) -> RepoResult<()>;
    fn delete_by_id(&self, id: EntityId) -> RepoResult<()>;

    fn delete(&self, entity: &Entity) -> RepoResult<()> {
        let id = entity.id().ok_or_else(|| {
            RepoError::ContractViolation(format!("cannot delete an unsaved {}", self.kind()))
        })?;
        self.delete_by_id(id)
    }

    /// Runs `op` as one unit of work. Writes made through this repository
    /// inside `op` commit together or not at all.
    fn atomically<T, E>(&self, op: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
        Self: Sized;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
    schema: &'conn EntitySchema,
    table: &'static EntityTable,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates a repository after checking the kind's tables exist.
    pub fn try_new(
        conn: &'conn Connection,
        registry: &'conn SchemaRegistry,
        kind: EntityKind,
    ) -> RepoResult<Self> {
        let schema = registry.require(kind)?;
        let table = EntityTable::for_kind(kind);
        ensure_tables_ready(conn, table)?;
        Ok(Self {
            conn,
            schema,
            table,
        })
    }

    pub fn table(&self) -> &'static EntityTable {
        self.table
    }

    /// Runs `op` in a transaction, or inside the caller's open transaction.
    fn write_atomically<T>(&self, op: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        if !self.conn.is_autocommit() {
            return op(self.conn);
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let result = op(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    fn entity_from_row(&self, row: &Row<'_>) -> RepoResult<Entity> {
        let mut entity = Entity::new(self.table.kind);
        for (prop, column) in self.table.primary_columns {
            let Some(property) = self.schema.property(prop) else {
                continue;
            };
            let raw: SqlValue = row.get(*column)?;
            let value = from_db(raw, property.kind).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "column {}.{} cannot be read as {}",
                    self.table.table,
                    column,
                    property.kind.as_str()
                ))
            })?;
            if !value.is_null() {
                entity.set_data(*prop, value);
            }
        }

        let id = entity.id().ok_or_else(|| {
            RepoError::InvalidData(format!(
                "row in {} has no {}",
                self.table.table, self.table.primary_key_column
            ))
        })?;
        self.load_settings(id, &mut entity)?;
        Ok(entity)
    }

    fn load_settings(&self, id: EntityId, entity: &mut Entity) -> RepoResult<()> {
        let Some(settings_table) = self.table.settings_table else {
            return Ok(());
        };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT locale, setting_name, setting_value
             FROM {settings_table}
             WHERE {} = ?1
             ORDER BY setting_name ASC, locale ASC;",
            self.table.primary_key_column
        ))?;
        let mut rows = stmt.query([id])?;

        while let Some(row) = rows.next()? {
            let locale: String = row.get("locale")?;
            let name: String = row.get("setting_name")?;
            let raw: SqlValue = row.get("setting_value")?;

            let Some(property) = self.schema.property(&name) else {
                debug!(
                    "event=entity_read module=repo status=skipped kind={} id={} setting={} reason=undeclared",
                    self.table.kind, id, name
                );
                continue;
            };
            let value = from_db(raw, property.kind).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "setting `{name}` of {} {id} cannot be read as {}",
                    self.table.kind,
                    property.kind.as_str()
                ))
            })?;
            if value.is_null() {
                continue;
            }

            if property.multilingual {
                entity.set_localized_data(name, locale, value);
            } else {
                entity.set_data(name, value);
            }
        }

        Ok(())
    }

    fn upsert_setting(
        &self,
        conn: &Connection,
        id: EntityId,
        locale: &str,
        name: &str,
        value: &str,
    ) -> RepoResult<()> {
        let Some(settings_table) = self.table.settings_table else {
            return Ok(());
        };
        let key = self.table.primary_key_column;
        conn.execute(
            &format!(
                "INSERT INTO {settings_table} ({key}, locale, setting_name, setting_value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT ({key}, locale, setting_name)
                 DO UPDATE SET setting_value = excluded.setting_value;"
            ),
            params![id, locale, name, value],
        )?;
        Ok(())
    }

    fn delete_setting(
        &self,
        conn: &Connection,
        id: EntityId,
        name: &str,
        locale: Option<&str>,
    ) -> RepoResult<()> {
        let Some(settings_table) = self.table.settings_table else {
            return Ok(());
        };
        let key = self.table.primary_key_column;
        match locale {
            Some(locale) => conn.execute(
                &format!(
                    "DELETE FROM {settings_table}
                     WHERE {key} = ?1 AND setting_name = ?2 AND locale = ?3;"
                ),
                params![id, name, locale],
            )?,
            None => conn.execute(
                &format!("DELETE FROM {settings_table} WHERE {key} = ?1 AND setting_name = ?2;"),
                params![id, name],
            )?,
        };
        Ok(())
    }

    /// Writes one non-primary property. Null or absent values delete rows.
    fn write_setting(
        &self,
        conn: &Connection,
        id: EntityId,
        name: &str,
        value: Option<&Value>,
    ) -> RepoResult<()> {
        let Some(property) = self.schema.property(name) else {
            return Ok(());
        };

        if property.multilingual {
            let Some(Value::Localized(entries)) = value else {
                return self.delete_setting(conn, id, name, None);
            };
            for (locale, entry) in entries {
                match to_setting(entry, property.kind) {
                    Some(text) => self.upsert_setting(conn, id, locale, name, &text)?,
                    None => self.delete_setting(conn, id, name, Some(locale))?,
                }
            }
            return Ok(());
        }

        match value.and_then(|value| to_setting(value, property.kind)) {
            Some(text) => self.upsert_setting(conn, id, "", name, &text),
            None => self.delete_setting(conn, id, name, Some("")),
        }
    }

    /// Primary-row values for the props present in `sanitized`.
    ///
    /// Absent props never produce a column, so updates leave them as stored.
    /// Explicit nulls are kept only when `include_nulls` is set.
    fn primary_values(&self, sanitized: &Props, include_nulls: bool) -> Vec<(&'static str, SqlValue)> {
        self.table
            .primary_columns
            .iter()
            .filter(|(prop, _)| *prop != ID_PROP)
            .filter_map(|(prop, column)| {
                let property = self.schema.property(prop)?;
                let value = to_column(sanitized.get(*prop)?, property.kind);
                if value == SqlValue::Null && !include_nulls {
                    return None;
                }
                Some((*column, value))
            })
            .collect()
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn kind(&self) -> EntityKind {
        self.table.kind
    }

    fn schema(&self) -> &EntitySchema {
        self.schema
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ?1;",
            self.table.table, self.table.primary_key_column
        ))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.entity_from_row(row)?));
        }
        Ok(None)
    }

    fn exists(&self, id: EntityId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
                self.table.table, self.table.primary_key_column
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_many(&self, query: &SelectQuery) -> RepoResult<Vec<Entity>> {
        let (sql, bind_values) = query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            entities.push(self.entity_from_row(row)?);
        }

        Ok(entities)
    }

    fn get_count(&self, query: &SelectQuery) -> RepoResult<u64> {
        let mut unpaged = query.clone();
        unpaged.limit(None).offset(None).clear_order();
        let (sql, bind_values) = unpaged.to_count_sql();
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn get_ids(&self, query: &SelectQuery) -> RepoResult<Vec<EntityId>> {
        let mut ids_query = query.clone();
        ids_query.select([self.table.qualified_primary_key()]);
        let (sql, bind_values) = ids_query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();

        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }

        Ok(ids)
    }

    fn insert(&self, entity: &mut Entity) -> RepoResult<EntityId> {
        let sanitized = self.schema.sanitize(entity.data());
        let primary = self.primary_values(&sanitized, false);
        if primary.is_empty() {
            return Err(RepoError::ContractViolation(format!(
                "cannot insert a {} without any primary-table properties",
                self.table.kind
            )));
        }

        let id = self.write_atomically(|conn| {
            let columns = primary
                .iter()
                .map(|(column, _)| *column)
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; primary.len()].join(", ");
            conn.execute(
                &format!(
                    "INSERT INTO {} ({columns}) VALUES ({placeholders});",
                    self.table.table
                ),
                params_from_iter(primary.iter().map(|(_, value)| value)),
            )?;
            let id = conn.last_insert_rowid();

            for (name, value) in &sanitized {
                if self.table.is_primary(name) {
                    continue;
                }
                self.write_setting(conn, id, name, Some(value))?;
            }
            Ok(id)
        })?;

        entity.set_id(id);
        debug!(
            "event=entity_insert module=repo status=ok kind={} id={}",
            self.table.kind, id
        );
        Ok(id)
    }

    fn update(&self, entity: &Entity) -> RepoResult<()> {
        let id = entity.id().ok_or_else(|| {
            RepoError::ContractViolation(format!("cannot update an unsaved {}", self.table.kind))
        })?;
        let sanitized = self.schema.sanitize(entity.data());
        let primary = self.primary_values(&sanitized, true);

        self.write_atomically(|conn| {
            let mut bind_values: Vec<SqlValue> = Vec::with_capacity(primary.len() + 1);
            let assignments = primary
                .iter()
                .map(|(column, value)| {
                    bind_values.push(value.clone());
                    format!("{column} = ?")
                })
                .collect::<Vec<_>>()
                .join(", ");
            bind_values.push(SqlValue::Integer(id));

            let changed = if assignments.is_empty() {
                usize::from(self.exists(id)?)
            } else {
                conn.execute(
                    &format!(
                        "UPDATE {} SET {assignments} WHERE {} = ?;",
                        self.table.table, self.table.primary_key_column
                    ),
                    params_from_iter(bind_values),
                )?
            };
            if changed == 0 {
                return Err(RepoError::NotFound(self.table.kind, id));
            }

            for property in self.schema.properties() {
                if property.is_virtual || self.table.is_primary(&property.name) {
                    continue;
                }
                self.write_setting(conn, id, &property.name, sanitized.get(&property.name))?;
            }
            Ok(())
        })?;

        debug!(
            "event=entity_update module=repo status=ok kind={} id={}",
            self.table.kind, id
        );
        Ok(())
    }

    fn atomically<T, E>(&self, op: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return op();
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let result = op()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(result)
    }

    fn delete_by_id(&self, id: EntityId) -> RepoResult<()> {
        self.write_atomically(|conn| {
            if let Some(settings_table) = self.table.settings_table {
                conn.execute(
                    &format!(
                        "DELETE FROM {settings_table} WHERE {} = ?1;",
                        self.table.primary_key_column
                    ),
                    [id],
                )?;
            }
            let changed = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1;",
                    self.table.table, self.table.primary_key_column
                ),
                [id],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(self.table.kind, id));
            }
            Ok(())
        })?;

        debug!(
            "event=entity_delete module=repo status=ok kind={} id={}",
            self.table.kind, id
        );
        Ok(())
    }
}

fn ensure_tables_ready(conn: &Connection, table: &'static EntityTable) -> RepoResult<()> {
    if !table_exists(conn, table.table)? {
        return Err(RepoError::MissingRequiredTable(table.table));
    }
    for (_, column) in table.primary_columns {
        if !table_has_column(conn, table.table, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: table.table,
                column,
            });
        }
    }

    if let Some(settings_table) = table.settings_table {
        if !table_exists(conn, settings_table)? {
            return Err(RepoError::MissingRequiredTable(settings_table));
        }
        for column in [table.primary_key_column, "locale", "setting_name", "setting_value"] {
            if !table_has_column(conn, settings_table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: settings_table,
                    column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
