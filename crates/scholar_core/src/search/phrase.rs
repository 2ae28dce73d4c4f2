//! Search-phrase tokenizing and LIKE predicate building.
//!
//! # Invariants
//! - Tokens are split on single spaces; empty tokens are skipped.
//! - Tokens are lower-cased with Unicode rules and `\`, `%`, `_` are
//!   escaped with `\`. Stored values go through the matching
//!   `unicode_lower` SQL function, so non-ASCII text compares equal.
//! - Tokens are AND-ed; the searchable fields within one token are OR-ed.

use crate::db::UNICODE_LOWER;
use crate::repo::query::Condition;
use rusqlite::types::Value as SqlValue;

/// Settings-table location of the searchable fields.
#[derive(Debug, Clone, Copy)]
pub struct SearchTarget<'a> {
    /// Qualified primary key of the outer query, e.g. `a.announcement_id`.
    pub outer_key: &'a str,
    pub settings_table: &'a str,
    pub key_column: &'a str,
    pub fields: &'a [&'a str],
}

/// Splits a phrase into lower-cased tokens.
pub fn tokenize_phrase(phrase: &str) -> Vec<String> {
    phrase
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Escapes LIKE wildcards with `\`.
pub fn escape_like(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for ch in token.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Builds the predicate for `phrase`, or `None` when it holds no tokens.
pub fn phrase_condition(target: SearchTarget<'_>, phrase: &str) -> Option<Condition> {
    let tokens = tokenize_phrase(phrase);
    if tokens.is_empty() || target.fields.is_empty() {
        return None;
    }

    let field_placeholders = vec!["?"; target.fields.len()].join(", ");
    let sql = format!(
        "EXISTS (SELECT 1 FROM {settings} AS ss WHERE ss.{key} = {outer} \
         AND ss.setting_name IN ({field_placeholders}) \
         AND {UNICODE_LOWER}(ss.setting_value) LIKE ? ESCAPE '\\')",
        settings = target.settings_table,
        key = target.key_column,
        outer = target.outer_key,
    );

    let conditions = tokens
        .iter()
        .map(|token| {
            let mut params: Vec<SqlValue> = target
                .fields
                .iter()
                .map(|field| SqlValue::Text((*field).to_string()))
                .collect();
            params.push(SqlValue::Text(format!("%{}%", escape_like(token))));
            Condition::Raw {
                sql: sql.clone(),
                params,
            }
        })
        .collect();

    Some(Condition::AllOf(conditions))
}
