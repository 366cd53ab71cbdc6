//! Statement execution.
//!
//! The [`Executor`] ties together the pieces a terminal builder operation
//! needs: lifecycle check, statement cache, cancellation context, backend call,
//! error classification and query logging.

use crate::backend::Backend;
use crate::clause::ParamRef;
use crate::context::ExecContext;
use crate::error::{OrmError, OrmResult};
use crate::log::Outcome;
use crate::orm::Orm;
use crate::value::Record;
use std::fmt;
use std::time::Instant;

/// The terminal operation a statement was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    First,
    Count,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::First => "first",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct Executor<'a, B: Backend> {
    orm: &'a Orm<B>,
    ctx: &'a ExecContext,
}

impl<'a, B: Backend> Executor<'a, B> {
    pub(crate) fn new(orm: &'a Orm<B>, ctx: &'a ExecContext) -> Self {
        Self { orm, ctx }
    }

    /// Compile `sql` through the shared cache under the context.
    async fn statement(&self, sql: &str) -> OrmResult<B::Statement> {
        if self.orm.is_closed() {
            return Err(OrmError::Closed);
        }
        let backend = self.orm.backend();
        self.ctx
            .run(
                self.orm
                    .cache()
                    .get_or_compile(sql, || backend.prepare(sql)),
            )
            .await
            .map_err(|e| OrmError::prepare(sql, e))
    }

    /// Run a read statement and return every row.
    pub(crate) async fn fetch(
        &self,
        operation: Operation,
        sql: &str,
        params: &[ParamRef<'_>],
    ) -> OrmResult<Vec<Record>> {
        let started = Instant::now();
        let result = async {
            let stmt = self.statement(sql).await?;
            self.ctx
                .run(self.orm.backend().query(&stmt, params))
                .await
                .map_err(|e| OrmError::execution(operation, e))
        }
        .await;

        self.log(operation, sql, params, started, &result, |rows: &Vec<Record>| {
            Outcome::Rows(rows.len())
        });
        result
    }

    /// Run a write statement and return the affected row count.
    pub(crate) async fn execute(
        &self,
        operation: Operation,
        sql: &str,
        params: &[ParamRef<'_>],
    ) -> OrmResult<u64> {
        let started = Instant::now();
        let result = async {
            let stmt = self.statement(sql).await?;
            self.ctx
                .run(self.orm.backend().execute(&stmt, params))
                .await
                .map_err(|e| OrmError::execution(operation, e))
        }
        .await;

        self.log(operation, sql, params, started, &result, |n: &u64| {
            Outcome::Affected(*n)
        });
        result
    }

    fn log<T>(
        &self,
        operation: Operation,
        sql: &str,
        params: &[ParamRef<'_>],
        started: Instant,
        result: &OrmResult<T>,
        outcome: impl FnOnce(&T) -> Outcome<'static>,
    ) {
        let Some(logger) = self.orm.logger() else {
            return;
        };
        let args: Vec<String> = params.iter().map(|p| format!("{p:?}")).collect();
        let outcome = match result {
            Ok(value) => outcome(value),
            Err(err) => Outcome::Failed(err),
        };
        logger.log(operation, sql, &args, started.elapsed(), outcome);
    }
}
