//! Storage backend seam.
//!
//! [`Backend`] is what [`Orm`](crate::Orm) drives: it compiles SQL into a
//! reusable statement handle, runs handles with positional parameters, and
//! releases handles when the statement cache is cleaned up.
//!
//! - [`PgBackend`](crate::pool::PgBackend) runs against PostgreSQL through a
//!   `deadpool-postgres` pool (feature `pool`).
//! - `MemoryBackend` records every call and replays queued results; it is
//!   what the test suite runs against (feature `test-util`).

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryBackend, MemoryStatement, RecordedQuery};

use crate::config::PoolLimits;
use crate::error::OrmResult;
use crate::value::Record;
use std::future::Future;
use tokio_postgres::types::ToSql;

/// A connection pool that can compile and run statements.
///
/// Implementations must be safe to call from many tasks at once. Cancellation
/// is handled by the caller dropping the returned futures.
pub trait Backend: Send + Sync {
    /// Compiled statement handle. Cloning must be cheap.
    type Statement: Clone + Send + Sync + 'static;

    /// Apply connection limits. Called exactly once, when the pool is opened.
    fn configure(&self, limits: &PoolLimits) -> OrmResult<()>;

    /// Compile `sql` into a statement handle.
    fn prepare(&self, sql: &str) -> impl Future<Output = OrmResult<Self::Statement>> + Send;

    /// Run a compiled read statement and scan every row.
    fn query(
        &self,
        stmt: &Self::Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Run a compiled write statement and return the number of affected rows.
    fn execute(
        &self,
        stmt: &Self::Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Release a compiled statement. The handle is not used again.
    fn release(&self, stmt: Self::Statement) -> OrmResult<()>;

    /// Close the underlying pool.
    fn close(&self);
}
