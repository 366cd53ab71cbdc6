//! Pool-wide compiled statement cache.
//!
//! Keyed by rendered SQL text. Lookups take a shared lock; a miss upgrades to
//! the exclusive lock and re-checks before compiling, so concurrent first uses
//! of the same SQL compile it exactly once.

use crate::error::OrmResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Counters for cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache (including after a lost race).
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
    /// Statements successfully compiled and stored.
    pub compiled: u64,
}

#[derive(Debug)]
pub struct StatementCache<S> {
    statements: RwLock<HashMap<String, S>>,
    hits: AtomicU64,
    misses: AtomicU64,
    compiled: AtomicU64,
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self {
            statements: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compiled: AtomicU64::new(0),
        }
    }
}

impl<S: Clone> StatementCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle cached for `sql`, compiling it with `compile` on first use.
    ///
    /// The exclusive lock is held while `compile` runs. A failed compile leaves
    /// the cache unchanged.
    pub async fn get_or_compile<F, Fut>(&self, sql: &str, compile: F) -> OrmResult<S>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrmResult<S>>,
    {
        let cached = {
            let statements = self.statements.read().await;
            statements.get(sql).cloned()
        };
        if let Some(stmt) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stmt);
        }

        let mut statements = self.statements.write().await;

        // Another caller may have compiled it between the two locks.
        if let Some(stmt) = statements.get(sql) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stmt.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let stmt = compile().await?;
        self.compiled.fetch_add(1, Ordering::Relaxed);
        statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }

    /// Look up a handle without compiling.
    pub async fn get(&self, sql: &str) -> Option<S> {
        self.statements.read().await.get(sql).cloned()
    }

    /// Remove every entry, returning the handles so the caller can release them.
    pub async fn drain(&self) -> Vec<(String, S)> {
        let mut statements = self.statements.write().await;
        statements.drain().collect()
    }

    /// SQL text of every cached entry, in no particular order.
    pub async fn keys(&self) -> Vec<String> {
        self.statements.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.statements.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.statements.read().await.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiled: self.compiled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn compiles_once_then_hits() {
        let cache = StatementCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let stmt = cache
                .get_or_compile("SELECT 1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, OrmError>(42u32)
                })
                .await
                .unwrap();
            assert_eq!(stmt, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                compiled: 1
            }
        );
    }

    #[tokio::test]
    async fn failed_compile_is_not_cached() {
        let cache: StatementCache<u32> = StatementCache::new();
        let err = cache
            .get_or_compile("SELEC 1", || async { Err(OrmError::Other("syntax".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Other(_)));
        assert!(cache.is_empty().await);

        let stmt = cache
            .get_or_compile("SELEC 1", || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(stmt, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_compiles_once() {
        let cache = Arc::new(StatementCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compile("SELECT * FROM users", || async {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Ok::<_, OrmError>(n)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().compiled, 1);
    }

    #[tokio::test]
    async fn drain_empties_the_cache() {
        let cache = StatementCache::new();
        for sql in ["a", "b"] {
            cache
                .get_or_compile(sql, || async { Ok::<_, OrmError>(sql.len()) })
                .await
                .unwrap();
        }
        let mut drained: Vec<String> = cache.drain().await.into_iter().map(|(k, _)| k).collect();
        drained.sort();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(cache.is_empty().await);
        assert!(cache.get("a").await.is_none());
    }
}
