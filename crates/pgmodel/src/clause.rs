//! Query descriptor and SQL rendering.
//!
//! [`Query`] accumulates the shape of one pending statement against a single
//! table. It renders into SQL text plus positional parameter references
//! ([`Rendered`]) for each statement kind:
//!
//! ```text
//! SELECT cols FROM t [JOIN ...] [WHERE ...] [GROUP BY ...] [HAVING ...]
//!        [ORDER BY ...] [LIMIT n] [OFFSET n]
//! INSERT INTO t (cols) VALUES ($1, ...) RETURNING *
//! UPDATE t SET a = $1, ... [WHERE ...]
//! DELETE FROM t [WHERE ...]
//! ```
//!
//! Placeholders are numbered once across the whole statement, in emission order.
//! Rendering is a pure function of the descriptor.

use crate::condition::Operator;
use crate::error::{OrmError, OrmResult};
use crate::ident::{sanitize_ident, sanitize_idents};
use crate::value::{Fields, Param};
use std::fmt::{self, Write};
use tokio_postgres::types::ToSql;

/// Reference to a bound parameter.
pub type ParamRef<'a> = &'a (dyn ToSql + Sync);

/// A single `column <op> value` predicate.
#[derive(Debug)]
pub struct Predicate {
    column: String,
    op: Operator,
    value: Param,
}

impl Predicate {
    /// Build a predicate; `column` is sanitized and `op` is checked against the
    /// allow-list.
    pub fn new<T>(column: &str, op: &str, value: T) -> OrmResult<Self>
    where
        T: ToSql + Sync + Send + 'static,
    {
        let op = Operator::parse(op)?;
        Ok(Self {
            column: sanitize_ident(column),
            op,
            value: Box::new(value),
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    fn write<'a>(&'a self, out: &mut String, params: &mut Vec<ParamRef<'a>>) {
        self.op.write_predicate(out, &self.column, params.len() + 1);
        if self.op.binds_value() {
            params.push(&*self.value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// A join against another table.
///
/// The condition is caller-written SQL and is embedded as is; its placeholders
/// are numbered by the caller, starting from `$1` (joins render before any
/// other parameterized clause).
#[derive(Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub condition: String,
    pub args: Vec<Param>,
}

/// A HAVING condition.
#[derive(Debug)]
pub enum Having {
    /// `column <op> $n`
    Predicate(Predicate),
    /// Caller-written condition with `?` placeholders, renumbered at render time.
    Raw { condition: String, args: Vec<Param> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered SQL and the parameters it references, in placeholder order.
pub struct Rendered<'a> {
    sql: String,
    params: Vec<ParamRef<'a>>,
}

impl<'a> Rendered<'a> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[ParamRef<'a>] {
        &self.params
    }

    /// Parameters rendered with `Debug`, for logging and assertions.
    pub fn params_debug(&self) -> Vec<String> {
        self.params.iter().map(|p| format!("{p:?}")).collect()
    }
}

impl fmt::Debug for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendered")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .finish()
    }
}

/// Accumulated shape of a pending statement.
#[derive(Debug)]
pub struct Query {
    table: String,
    selections: Vec<String>,
    wheres: Vec<Predicate>,
    or_wheres: Vec<Predicate>,
    joins: Vec<Join>,
    group_by: Vec<String>,
    having: Vec<Having>,
    order_by: Option<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    /// Start a query against `table`, selecting `table.*`.
    pub fn new(table: &str) -> Self {
        let table = sanitize_ident(table);
        Self {
            selections: vec![format!("{table}.*")],
            table,
            wheres: Vec::new(),
            or_wheres: Vec::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn has_filters(&self) -> bool {
        !self.wheres.is_empty() || !self.or_wheres.is_empty()
    }

    pub fn set_selections(&mut self, columns: &[&str]) {
        self.selections = sanitize_idents(columns);
    }

    pub fn push_where(&mut self, predicate: Predicate) {
        self.wheres.push(predicate);
    }

    pub fn push_or_where(&mut self, predicate: Predicate) {
        self.or_wheres.push(predicate);
    }

    pub fn push_join(&mut self, kind: JoinKind, table: &str, condition: &str, args: Vec<Param>) {
        self.joins.push(Join {
            kind,
            table: sanitize_ident(table),
            condition: condition.to_string(),
            args,
        });
    }

    pub fn set_group_by(&mut self, columns: &[&str]) {
        self.group_by = sanitize_idents(columns);
    }

    pub fn push_having(&mut self, having: Having) {
        self.having.push(having);
    }

    pub fn set_order_by(&mut self, column: &str, direction: Direction) {
        self.order_by = Some((sanitize_ident(column), direction));
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    /// Render the WHERE clause with placeholders starting at `$start`.
    ///
    /// Returns an empty string (and no params) when there are no predicates;
    /// otherwise the text starts with ` WHERE `. AND predicates come first,
    /// then OR predicates.
    pub fn render_where(&self, start: usize) -> (String, Vec<ParamRef<'_>>) {
        let mut out = String::new();
        let mut params = Vec::new();
        self.write_where(&mut out, &mut params, start.saturating_sub(1));
        (out, params)
    }

    /// Placeholders continue from `offset + params.len()`.
    fn write_where<'a>(&'a self, out: &mut String, params: &mut Vec<ParamRef<'a>>, offset: usize) {
        if !self.has_filters() {
            return;
        }

        out.push_str(" WHERE ");
        let predicates = self
            .wheres
            .iter()
            .map(|p| (" AND ", p))
            .chain(self.or_wheres.iter().map(|p| (" OR ", p)));
        for (i, (connective, predicate)) in predicates.enumerate() {
            if i > 0 {
                out.push_str(connective);
            }
            predicate
                .op
                .write_predicate(out, &predicate.column, offset + params.len() + 1);
            if predicate.op.binds_value() {
                params.push(&*predicate.value);
            }
        }
    }

    fn write_joins<'a>(&'a self, out: &mut String, params: &mut Vec<ParamRef<'a>>) {
        for join in &self.joins {
            out.push(' ');
            out.push_str(join.kind.as_str());
            out.push(' ');
            out.push_str(&join.table);
            if join.kind != JoinKind::Cross && !join.condition.is_empty() {
                out.push_str(" ON ");
                out.push_str(&join.condition);
                params.extend(join.args.iter().map(|a| &**a as ParamRef<'a>));
            }
        }
    }

    fn write_having<'a>(&'a self, out: &mut String, params: &mut Vec<ParamRef<'a>>) {
        if self.having.is_empty() {
            return;
        }
        out.push_str(" HAVING ");
        for (i, having) in self.having.iter().enumerate() {
            if i > 0 {
                out.push_str(" AND ");
            }
            match having {
                Having::Predicate(predicate) => predicate.write(out, params),
                Having::Raw { condition, args } => {
                    let mut args = args.iter();
                    for ch in condition.chars() {
                        if ch == '?' {
                            if let Some(arg) = args.next() {
                                params.push(&**arg);
                                let _ = write!(out, "${}", params.len());
                                continue;
                            }
                        }
                        out.push(ch);
                    }
                }
            }
        }
    }

    /// Render the SELECT statement.
    pub fn render_select(&self) -> Rendered<'_> {
        let mut sql = format!("SELECT {} FROM {}", self.selections.join(", "), self.table);
        let mut params = Vec::new();

        self.write_joins(&mut sql, &mut params);
        self.write_where(&mut sql, &mut params, 0);
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        self.write_having(&mut sql, &mut params);
        if let Some((column, direction)) = &self.order_by {
            let _ = write!(sql, " ORDER BY {column} {direction}");
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }

        Rendered { sql, params }
    }

    /// Render `SELECT COUNT(*)` over the joined and filtered rows.
    ///
    /// Grouping, ordering and pagination are ignored.
    pub fn render_count(&self) -> Rendered<'_> {
        let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.table);
        let mut params = Vec::new();
        self.write_joins(&mut sql, &mut params);
        self.write_where(&mut sql, &mut params, 0);
        Rendered { sql, params }
    }

    /// Render `INSERT ... RETURNING *` for `fields`.
    pub fn render_insert<'a>(&self, fields: &'a Fields) -> OrmResult<Rendered<'a>> {
        if fields.is_empty() {
            return Err(OrmError::invalid_argument("insert requires at least one field"));
        }

        let mut columns = Vec::with_capacity(fields.len());
        let mut placeholders = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len());
        for (i, (column, value)) in fields.iter().enumerate() {
            columns.push(sanitize_ident(column));
            placeholders.push(format!("${}", i + 1));
            params.push(value);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Rendered { sql, params })
    }

    /// Render `UPDATE ... SET` for `fields`, followed by the WHERE clause.
    pub fn render_update<'a>(&'a self, fields: &'a Fields) -> OrmResult<Rendered<'a>> {
        if fields.is_empty() {
            return Err(OrmError::invalid_argument("update requires at least one field"));
        }

        let mut params: Vec<ParamRef<'a>> = Vec::with_capacity(fields.len());
        let mut sets = Vec::with_capacity(fields.len());
        for (column, value) in fields.iter() {
            params.push(value);
            sets.push(format!("{} = ${}", sanitize_ident(column), params.len()));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, sets.join(", "));
        self.write_where(&mut sql, &mut params, 0);
        Ok(Rendered { sql, params })
    }

    /// Render `DELETE FROM` with the WHERE clause.
    pub fn render_delete(&self) -> Rendered<'_> {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, 0);
        Rendered { sql, params }
    }
}
