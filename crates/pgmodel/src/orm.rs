//! Pool wrapper and builder entry point.

use crate::backend::Backend;
use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};
use crate::log::QueryLogger;
use crate::model::Model;
use crate::statement_cache::{CacheStats, StatementCache};
use std::sync::atomic::{AtomicBool, Ordering};

/// An open connection pool together with its compiled statement cache.
///
/// `Orm` is created open and becomes closed, permanently, with
/// [`Orm::close`]. Every builder borrows it, so share it across tasks through
/// an `Arc<Orm<_>>` or a `&'static`.
///
/// # Example
///
/// ```ignore
/// use pgmodel::{DatabaseConfig, Orm, OrmConfig, PgBackend};
///
/// let backend = PgBackend::connect(&DatabaseConfig::from_env()).await?;
/// let orm = Orm::new(backend, OrmConfig::from_env()?)?;
///
/// let users = orm.table("users").and_where("age", ">", 18)?.get().await?;
/// orm.close().await?;
/// ```
pub struct Orm<B: Backend> {
    backend: B,
    cache: StatementCache<B::Statement>,
    config: OrmConfig,
    logger: Option<QueryLogger>,
    closed: AtomicBool,
}

impl<B: Backend> Orm<B> {
    /// Open the pool: apply the connection limits from `config` to `backend`.
    pub fn new(backend: B, config: OrmConfig) -> OrmResult<Self> {
        backend.configure(&config.limits)?;
        tracing::debug!(
            max_open = config.limits.max_open,
            max_idle = config.limits.max_idle,
            max_lifetime = ?config.limits.max_lifetime,
            query_log = config.query_log,
            "pool opened"
        );
        let logger = config.query_log.then(QueryLogger::new);
        Ok(Self {
            backend,
            cache: StatementCache::new(),
            config,
            logger,
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the query logger, enabling query logging.
    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Start a builder against `table`.
    pub fn table(&self, name: &str) -> Model<'_, B> {
        Model::new(self, name)
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn cache(&self) -> &StatementCache<B::Statement> {
        &self.cache
    }

    pub(crate) fn logger(&self) -> Option<&QueryLogger> {
        self.logger.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// SQL text of every statement currently compiled.
    pub async fn cached_statements(&self) -> Vec<String> {
        let mut sql = self.cache.keys().await;
        sql.sort();
        sql
    }

    /// Release every cached statement.
    ///
    /// All statements are released even when some fail; the failures are
    /// reported together as [`OrmError::Cleanup`]. Must not run concurrently
    /// with queries on the same pool.
    pub async fn cleanup(&self) -> OrmResult<()> {
        let statements = self.cache.drain().await;
        let mut failures = Vec::new();
        for (sql, stmt) in statements {
            if let Err(e) = self.backend.release(stmt) {
                tracing::warn!(sql = %sql, error = %e, "failed to release statement");
                failures.push(format!("{sql}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrmError::Cleanup { failures })
        }
    }

    /// Close the pool. Cached statements are released first; the pool is closed
    /// even if some releases fail. Closing twice fails with [`OrmError::Closed`].
    pub async fn close(&self) -> OrmResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(OrmError::Closed);
        }
        let released = self.cleanup().await;
        self.backend.close();
        tracing::debug!("pool closed");
        released
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for Orm<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
