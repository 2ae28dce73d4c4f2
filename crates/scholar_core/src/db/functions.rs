//! Application-defined SQL functions.
//!
//! SQLite's built-in `LOWER()` and `LIKE` fold ASCII only, so "Émile" would
//! never match a lower-cased search token. Search predicates call
//! [`UNICODE_LOWER`] instead.

use super::{DbError, DbResult};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;

/// Name of the Unicode-aware lower-casing function.
pub const UNICODE_LOWER: &str = "unicode_lower";

/// Registers every application function on `conn`.
///
/// Connections from [`super::open_db`] already have them; call this for
/// connections opened elsewhere before running collector searches.
pub fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let lowered = match ctx.get_raw(0) {
                ValueRef::Null | ValueRef::Blob(_) => None,
                ValueRef::Integer(int) => Some(int.to_string()),
                ValueRef::Real(real) => Some(real.to_string()),
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
            };
            Ok(lowered)
        },
    )
    .map_err(|source| DbError::Function {
        name: UNICODE_LOWER,
        source,
    })
}
