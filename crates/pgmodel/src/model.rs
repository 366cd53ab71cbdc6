//! The fluent query builder.
//!
//! A [`Model`] accumulates clauses against one table and finishes with a
//! terminal operation that renders, compiles (through the pool's statement
//! cache) and executes a single statement.
//!
//! Configuration methods take `&mut self` and return `&mut Self`, so calls chain
//! on a temporary or on a binding. Methods that validate input return
//! `OrmResult<&mut Self>`; chain them with `?`.
//!
//! ```ignore
//! let rows = orm
//!     .table("users")
//!     .select(&["id", "username"])
//!     .and_where("age", ">=", 18)?
//!     .or_where("role", "=", "admin")?
//!     .order_by("id", Direction::Desc)
//!     .limit(20)
//!     .get()
//!     .await?;
//! ```
//!
//! A builder belongs to one caller: it is never shared between tasks, so it
//! carries no synchronization of its own.

use crate::backend::Backend;
use crate::clause::{Direction, Having, JoinKind, Predicate, Query, Rendered};
use crate::context::ExecContext;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, Operation};
use crate::orm::Orm;
use crate::value::{Fields, Param, Record, Value};
use tokio_postgres::types::ToSql;

/// Columns stamped with the current time by [`Model::create`] when absent.
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

pub struct Model<'a, B: Backend> {
    orm: &'a Orm<B>,
    query: Query,
    ctx: ExecContext,
}

impl<'a, B: Backend> Model<'a, B> {
    pub(crate) fn new(orm: &'a Orm<B>, table: &str) -> Self {
        Self {
            orm,
            query: Query::new(table),
            ctx: ExecContext::default(),
        }
    }

    pub fn table_name(&self) -> &str {
        self.query.table()
    }

    // ==================== Configuration ====================

    /// Replace the selected columns. Without a call the builder selects `table.*`.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.query.set_selections(columns);
        self
    }

    /// Add an AND-ed `column <op> value` predicate.
    ///
    /// Fails with [`OrmError::InvalidOperator`] when `op` is not one of
    /// `=, <>, >, <, >=, <=, LIKE, NOT LIKE, IN, NOT IN, IS NULL, IS NOT NULL`.
    /// For `IN`/`NOT IN` pass an array (`Vec<T>`); for the null checks the value
    /// is ignored.
    pub fn and_where<T>(&mut self, column: &str, op: &str, value: T) -> OrmResult<&mut Self>
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.query.push_where(Predicate::new(column, op, value)?);
        Ok(self)
    }

    /// Add an OR-ed predicate. OR predicates render after every AND predicate.
    pub fn or_where<T>(&mut self, column: &str, op: &str, value: T) -> OrmResult<&mut Self>
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.query.push_or_where(Predicate::new(column, op, value)?);
        Ok(self)
    }

    /// `INNER JOIN table ON condition`.
    ///
    /// `condition` is embedded verbatim. Joins render before WHERE, so its
    /// placeholders are numbered from `$1` across all joins in call order.
    pub fn join(&mut self, table: &str, condition: &str, args: Vec<Param>) -> &mut Self {
        self.query.push_join(JoinKind::Inner, table, condition, args);
        self
    }

    pub fn left_join(&mut self, table: &str, condition: &str, args: Vec<Param>) -> &mut Self {
        self.query.push_join(JoinKind::Left, table, condition, args);
        self
    }

    pub fn right_join(&mut self, table: &str, condition: &str, args: Vec<Param>) -> &mut Self {
        self.query.push_join(JoinKind::Right, table, condition, args);
        self
    }

    pub fn cross_join(&mut self, table: &str) -> &mut Self {
        self.query.push_join(JoinKind::Cross, table, "", Vec::new());
        self
    }

    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.query.set_group_by(columns);
        self
    }

    /// Add a `column <op> value` HAVING predicate. Multiple calls are AND-ed.
    pub fn having<T>(&mut self, column: &str, op: &str, value: T) -> OrmResult<&mut Self>
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.query
            .push_having(Having::Predicate(Predicate::new(column, op, value)?));
        Ok(self)
    }

    /// Add a raw HAVING condition such as `SUM(total) > ?`.
    ///
    /// Each `?` is replaced by the next positional placeholder. The number of
    /// `?` must match `args`, otherwise [`OrmError::InvalidArgument`].
    ///
    /// Every `?` counts, including one inside a quoted literal and the jsonb
    /// operators `?`, `?|` and `?&`. Write those conditions with the function
    /// forms (`jsonb_exists`, `jsonb_exists_any`, `jsonb_exists_all`) and pass
    /// literals as arguments.
    pub fn having_raw(&mut self, condition: &str, args: Vec<Param>) -> OrmResult<&mut Self> {
        let expected = condition.matches('?').count();
        if expected != args.len() {
            return Err(OrmError::invalid_argument(format!(
                "having condition has {expected} placeholders but {} args were given",
                args.len()
            )));
        }
        self.query.push_having(Having::Raw {
            condition: condition.to_string(),
            args,
        });
        Ok(self)
    }

    pub fn order_by(&mut self, column: &str, direction: Direction) -> &mut Self {
        self.query.set_order_by(column, direction);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.query.set_limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.query.set_offset(offset);
        self
    }

    /// Set LIMIT/OFFSET for a 1-based page. Page `0` is treated as page `1`.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        let page = page.max(1);
        self.query.set_limit(per_page);
        self.query.set_offset((page - 1).saturating_mul(per_page));
        self
    }

    /// Run the terminal operation under `ctx` (cancellation and deadline).
    pub fn with_context(&mut self, ctx: ExecContext) -> &mut Self {
        self.ctx = ctx;
        self
    }

    // ==================== Rendering ====================

    pub fn to_select_sql(&self) -> Rendered<'_> {
        self.query.render_select()
    }

    pub fn to_count_sql(&self) -> Rendered<'_> {
        self.query.render_count()
    }

    /// Render the INSERT for `fields` as given; unlike [`Model::create`] no
    /// timestamps are added.
    pub fn to_insert_sql<'f>(&self, fields: &'f Fields) -> OrmResult<Rendered<'f>> {
        self.query.render_insert(fields)
    }

    pub fn to_update_sql<'f>(&'f self, fields: &'f Fields) -> OrmResult<Rendered<'f>> {
        self.query.render_update(fields)
    }

    pub fn to_delete_sql(&self) -> Rendered<'_> {
        self.query.render_delete()
    }

    // ==================== Terminal operations ====================

    fn executor(&self) -> Executor<'_, B> {
        Executor::new(self.orm, &self.ctx)
    }

    /// Fetch every matching row. No rows is an empty `Vec`, not an error.
    pub async fn get(&self) -> OrmResult<Vec<Record>> {
        let rendered = self.query.render_select();
        self.executor()
            .fetch(Operation::Get, rendered.sql(), rendered.params())
            .await
    }

    /// Fetch the first matching row, or [`OrmError::NotFound`].
    ///
    /// Forces `LIMIT 1` on this builder.
    pub async fn first(&mut self) -> OrmResult<Record> {
        self.query.set_limit(1);
        let rendered = self.query.render_select();
        let rows = self
            .executor()
            .fetch(Operation::First, rendered.sql(), rendered.params())
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            OrmError::not_found(format!("no rows in {}", self.query.table()))
        })
    }

    /// Count matching rows. Grouping, ordering and pagination are ignored.
    pub async fn count(&self) -> OrmResult<i64> {
        let rendered = self.query.render_count();
        let rows = self
            .executor()
            .fetch(Operation::Count, rendered.sql(), rendered.params())
            .await?;
        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .ok_or_else(|| OrmError::scan("count", "missing count column"))
    }

    /// Insert one row and return it as stored (`RETURNING *`).
    ///
    /// `created_at` and `updated_at` are set to the current UTC time unless
    /// `fields` already has them. Empty `fields` fail with
    /// [`OrmError::InvalidArgument`] before anything is compiled.
    pub async fn create(&self, mut fields: Fields) -> OrmResult<Record> {
        if fields.is_empty() {
            return Err(OrmError::invalid_argument("create requires at least one field"));
        }
        stamp_timestamps(&mut fields, chrono::Utc::now());

        let rendered = self.query.render_insert(&fields)?;
        let rows = self
            .executor()
            .fetch(Operation::Create, rendered.sql(), rendered.params())
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            OrmError::execution(
                Operation::Create,
                OrmError::Other(format!("insert into {} returned no row", self.query.table())),
            )
        })
    }

    /// Update matching rows and return how many were affected.
    ///
    /// Without any WHERE predicate every row of the table is updated.
    pub async fn update(&self, fields: Fields) -> OrmResult<u64> {
        if fields.is_empty() {
            return Err(OrmError::invalid_argument("update requires at least one field"));
        }
        let rendered = self.query.render_update(&fields)?;
        self.executor()
            .execute(Operation::Update, rendered.sql(), rendered.params())
            .await
    }

    /// Delete matching rows and return how many were affected.
    pub async fn delete(&self) -> OrmResult<u64> {
        let rendered = self.query.render_delete();
        self.executor()
            .execute(Operation::Delete, rendered.sql(), rendered.params())
            .await
    }
}

/// Fill `created_at`/`updated_at` with `now` unless the caller set them.
///
/// Bound as [`Value::Timestamp`], which encodes for both `timestamp` and
/// `timestamptz` columns.
pub(crate) fn stamp_timestamps(fields: &mut Fields, now: chrono::DateTime<chrono::Utc>) {
    fields.insert_if_absent(CREATED_AT, Value::Timestamp(now));
    fields.insert_if_absent(UPDATED_AT, Value::Timestamp(now));
}

impl<B: Backend> std::fmt::Debug for Model<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("query", &self.query)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
