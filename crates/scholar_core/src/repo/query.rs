//! Minimal SELECT builder used by collectors.
//!
//! # Responsibility
//! - Accumulate predicates, ordering and pagination for one entity table.
//! - Render SQL with positional `?` placeholders and ordered bind values.
//!
//! # Invariants
//! - Bind values are emitted in the same order their placeholders appear.
//! - An empty `IN` list matches nothing; an empty condition group matches all.

use rusqlite::types::Value as SqlValue;

/// Comparison operators supported by `Condition::Compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    /// Predicates joined with `OR`.
    AnyOf(Vec<Condition>),
    /// Predicates joined with `AND`.
    AllOf(Vec<Condition>),
    /// Pre-rendered SQL fragment with its own bind values.
    Raw { sql: String, params: Vec<SqlValue> },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    fn render(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Self::Compare { column, op, value } => {
                sql.push_str(&format!("{column} {} ?", op.as_sql()));
                params.push(value.clone());
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    sql.push_str("0 = 1");
                    return;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("{column} IN ({placeholders})"));
                params.extend(values.iter().cloned());
            }
            Self::IsNull { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                sql.push_str(&format!("{column} IS{not} NULL"));
            }
            Self::AnyOf(conditions) => render_group(conditions, " OR ", "0 = 1", sql, params),
            Self::AllOf(conditions) => render_group(conditions, " AND ", "1 = 1", sql, params),
            Self::Raw { sql: fragment, params: bound } => {
                sql.push_str(fragment);
                params.extend(bound.iter().cloned());
            }
        }
    }
}

fn render_group(
    conditions: &[Condition],
    separator: &str,
    empty: &str,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    if conditions.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        condition.render(sql, params);
    }
    sql.push(')');
}

/// Fluent SELECT builder over one aliased table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    alias: String,
    columns: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<Condition>,
    group_by: Vec<String>,
    order_by: Vec<(String, SortDirection)>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SelectQuery {
    pub fn table(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Replaces the selected columns. An empty list selects `alias.*`.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a `LEFT JOIN table AS alias ON on`.
    pub fn left_join(&mut self, table: &str, alias: &str, on: &str) -> &mut Self {
        self.joins
            .push(format!("LEFT JOIN {table} AS {alias} ON {on}"));
        self
    }

    pub fn where_condition(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.where_condition(Condition::eq(column, value))
    }

    pub fn where_op(&mut self, column: &str, op: CompareOp, value: impl Into<SqlValue>) -> &mut Self {
        self.where_condition(Condition::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        })
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.where_condition(Condition::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn order_by(&mut self, column: &str, direction: SortDirection) -> &mut Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn clear_order(&mut self) -> &mut Self {
        self.order_by.clear();
        self
    }

    /// Sets `LIMIT`; `None` removes it.
    pub fn limit(&mut self, limit: Option<u32>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Sets `OFFSET`; `None` removes it.
    pub fn offset(&mut self, offset: Option<u32>) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Renders the full SELECT statement.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let columns = if self.columns.is_empty() {
            format!("{}.*", self.alias)
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {} AS {}", self.table, self.alias);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            for (index, condition) in self.conditions.iter().enumerate() {
                if index > 0 {
                    sql.push_str(" AND ");
                }
                condition.render(&mut sql, &mut params);
            }
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ?");
                params.push(SqlValue::Integer(i64::from(limit)));
                if let Some(offset) = offset.filter(|value| *value > 0) {
                    sql.push_str(" OFFSET ?");
                    params.push(SqlValue::Integer(i64::from(offset)));
                }
            }
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(SqlValue::Integer(i64::from(offset)));
            }
            _ => {}
        }

        (sql, params)
    }

    /// Renders `SELECT COUNT(*)` over this query, pagination included.
    pub fn to_count_sql(&self) -> (String, Vec<SqlValue>) {
        let (inner, params) = self.to_sql();
        (format!("SELECT COUNT(*) FROM ({inner}) AS counted"), params)
    }
}

#[cfg(test)]
mod tests {
    use super::{CompareOp, Condition, SelectQuery, SortDirection};
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn renders_filters_order_and_pagination() {
        let mut query = SelectQuery::table("announcements", "a");
        query
            .where_in("a.assoc_id", [5_i64, 6])
            .where_op("a.type_id", CompareOp::Gt, 1_i64)
            .order_by("a.date_posted", SortDirection::Desc)
            .limit(Some(10))
            .offset(Some(20));

        let (sql, params) = query.to_sql();
        assert_eq!(
            sql,
            "SELECT a.* FROM announcements AS a WHERE a.assoc_id IN (?, ?) AND a.type_id > ? \
             ORDER BY a.date_posted DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            params,
            vec![
                SqlValue::Integer(5),
                SqlValue::Integer(6),
                SqlValue::Integer(1),
                SqlValue::Integer(10),
                SqlValue::Integer(20),
            ]
        );
    }

    #[test]
    fn offset_without_limit_uses_unbounded_limit() {
        let mut query = SelectQuery::table("journals", "c");
        query.offset(Some(3));
        let (sql, _) = query.to_sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET ?"));
    }

    #[test]
    fn empty_groups_render_constants() {
        let mut query = SelectQuery::table("journals", "c");
        query
            .where_condition(Condition::AnyOf(Vec::new()))
            .where_in("c.journal_id", Vec::<i64>::new());
        let (sql, params) = query.to_sql();
        assert!(sql.ends_with("WHERE 0 = 1 AND 0 = 1"));
        assert!(params.is_empty());
    }

    #[test]
    fn count_wraps_inner_select() {
        let mut query = SelectQuery::table("journals", "c");
        query.select(["c.journal_id"]).where_eq("c.enabled", 1_i64);
        let (sql, params) = query.to_count_sql();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM (SELECT c.journal_id FROM journals AS c WHERE c.enabled = ?) AS counted"
        );
        assert_eq!(params, vec![SqlValue::Integer(1)]);
    }
}
