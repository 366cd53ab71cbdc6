//! Query logging through `tracing`.

use crate::error::OrmError;
use crate::executor::Operation;
use std::time::Duration;
use tracing::Level;

/// Outcome attached to a logged statement.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Rows(usize),
    Affected(u64),
    Failed(&'a OrmError),
}

/// Emits one `tracing` event per executed statement (target `pgmodel.sql`)
/// with the SQL, bound arguments, duration and outcome.
///
/// Installed on an [`Orm`](crate::Orm) automatically when
/// [`OrmConfig::query_log`](crate::OrmConfig) is set, or explicitly with
/// [`Orm::with_logger`](crate::Orm::with_logger).
#[derive(Debug, Clone)]
pub struct QueryLogger {
    /// Level of successful statements. Failures are always logged at `WARN` or above.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(500),
        }
    }
}

impl QueryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql<'s>(&self, sql: &'s str) -> std::borrow::Cow<'s, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    pub(crate) fn log(
        &self,
        operation: Operation,
        sql: &str,
        args: &[String],
        elapsed: Duration,
        outcome: Outcome<'_>,
    ) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        match outcome {
            Outcome::Rows(rows) => emit_at_level!(
                self.level,
                target: "pgmodel.sql",
                %operation,
                sql = %sql,
                args = ?args,
                duration_ms,
                rows,
            ),
            Outcome::Affected(affected) => emit_at_level!(
                self.level,
                target: "pgmodel.sql",
                %operation,
                sql = %sql,
                args = ?args,
                duration_ms,
                affected,
            ),
            Outcome::Failed(error) => {
                let level = self.level.min(Level::WARN);
                emit_at_level!(
                    level,
                    target: "pgmodel.sql",
                    %operation,
                    sql = %sql,
                    args = ?args,
                    duration_ms,
                    %error,
                )
            }
        }
    }
}

fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
