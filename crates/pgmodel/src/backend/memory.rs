use super::Backend;
use crate::config::PoolLimits;
use crate::error::{OrmError, OrmResult};
use crate::value::Record;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_postgres::types::ToSql;

/// A recorded statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub sql: String,
    /// Parameters rendered with `Debug`.
    pub params: Vec<String>,
}

/// Statement handle handed out by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStatement {
    pub id: u64,
    pub sql: Arc<str>,
}

#[derive(Debug, Default)]
struct State {
    configured: Vec<PoolLimits>,
    next_id: u64,
    prepared: Vec<String>,
    executed: Vec<RecordedQuery>,
    released: Vec<String>,
    rows: VecDeque<Vec<Record>>,
    affected: VecDeque<u64>,
    failing_prepare: Vec<String>,
    failing_release: Vec<String>,
    closed: bool,
}

/// In-memory backend that records calls and replays queued results.
///
/// Queued row sets are returned by `query` in FIFO order, queued counts by
/// `execute`; once a queue is empty the result is no rows / zero affected.
///
/// # Example
/// ```
/// use pgmodel::backend::MemoryBackend;
/// use pgmodel::{Record, Value};
///
/// let mut row = Record::new();
/// row.insert("id".into(), Value::Int(1));
///
/// let backend = MemoryBackend::new().with_rows(vec![row]).with_affected(3);
/// assert!(backend.executed().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    prepare_delay: Option<Duration>,
    query_delay: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row set for the next `query`.
    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        self.state().rows.push_back(rows);
        self
    }

    /// Queue an affected-row count for the next `execute`.
    pub fn with_affected(self, affected: u64) -> Self {
        self.state().affected.push_back(affected);
        self
    }

    /// Fail compilation of any SQL containing `pattern`.
    pub fn fail_prepare(self, pattern: impl Into<String>) -> Self {
        self.state().failing_prepare.push(pattern.into());
        self
    }

    /// Fail release of any statement whose SQL contains `pattern`.
    pub fn fail_release(self, pattern: impl Into<String>) -> Self {
        self.state().failing_release.push(pattern.into());
        self
    }

    /// Sleep before every compile.
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = Some(delay);
        self
    }

    /// Sleep before every query/execute.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Queue a row set after construction.
    pub fn push_rows(&self, rows: Vec<Record>) {
        self.state().rows.push_back(rows);
    }

    /// Every SQL string that was compiled, in order.
    pub fn prepared(&self) -> Vec<String> {
        self.state().prepared.clone()
    }

    /// How many times `sql` was compiled.
    pub fn prepare_count(&self, sql: &str) -> usize {
        self.state().prepared.iter().filter(|s| *s == sql).count()
    }

    /// Every executed statement, in order.
    pub fn executed(&self) -> Vec<RecordedQuery> {
        self.state().executed.clone()
    }

    pub fn last_query(&self) -> Option<RecordedQuery> {
        self.state().executed.last().cloned()
    }

    /// SQL of every released statement.
    pub fn released(&self) -> Vec<String> {
        self.state().released.clone()
    }

    /// Limits passed to `configure`, one entry per call.
    pub fn configured(&self) -> Vec<PoolLimits> {
        self.state().configured.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, stmt: &MemoryStatement, params: &[&(dyn ToSql + Sync)]) -> OrmResult<()> {
        let mut state = self.state();
        if state.closed {
            return Err(OrmError::Closed);
        }
        state.executed.push(RecordedQuery {
            sql: stmt.sql.to_string(),
            params: params.iter().map(|p| format!("{p:?}")).collect(),
        });
        Ok(())
    }
}

impl Backend for MemoryBackend {
    type Statement = MemoryStatement;

    fn configure(&self, limits: &PoolLimits) -> OrmResult<()> {
        self.state().configured.push(limits.clone());
        Ok(())
    }

    async fn prepare(&self, sql: &str) -> OrmResult<MemoryStatement> {
        if let Some(delay) = self.prepare_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.closed {
            return Err(OrmError::Closed);
        }
        state.prepared.push(sql.to_string());
        if state.failing_prepare.iter().any(|p| sql.contains(p.as_str())) {
            return Err(OrmError::Other(format!("syntax error in {sql:?}")));
        }
        state.next_id += 1;
        Ok(MemoryStatement {
            id: state.next_id,
            sql: Arc::from(sql),
        })
    }

    async fn query(
        &self,
        stmt: &MemoryStatement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<Record>> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(stmt, params)?;
        Ok(self.state().rows.pop_front().unwrap_or_default())
    }

    async fn execute(
        &self,
        stmt: &MemoryStatement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<u64> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(stmt, params)?;
        Ok(self.state().affected.pop_front().unwrap_or(0))
    }

    fn release(&self, stmt: MemoryStatement) -> OrmResult<()> {
        let mut state = self.state();
        if state.failing_release.iter().any(|p| stmt.sql.contains(p.as_str())) {
            return Err(OrmError::Other(format!("statement {} is busy", stmt.id)));
        }
        state.released.push(stmt.sql.to_string());
        Ok(())
    }

    fn close(&self) {
        self.state().closed = true;
    }
}
