//! # pgmodel
//!
//! A fluent query builder for PostgreSQL with a pool-wide prepared statement
//! cache.
//!
//! ## Features
//!
//! - **Parameterized SQL**: values are always bound as `$n` parameters;
//!   table and column names are sanitized to `[A-Za-z0-9_]`
//! - **Fail-fast operators**: WHERE/HAVING operators come from a fixed
//!   allow-list and are checked when the clause is added
//! - **Statement cache**: each distinct SQL text is compiled once per pool,
//!   even under concurrent first use
//! - **Cancellation**: every terminal operation honours an [`ExecContext`]
//!   (cancellation token and deadline)
//! - **Dynamic rows**: results come back as [`Record`]s (column name to [`Value`])
//!
//! ## Example
//!
//! ```ignore
//! use pgmodel::{DatabaseConfig, Direction, Fields, Orm, OrmConfig, PgBackend};
//!
//! let backend = PgBackend::connect(&DatabaseConfig::from_env()).await?;
//! let orm = Orm::new(backend, OrmConfig::from_env()?)?;
//!
//! // INSERT ... RETURNING *, with created_at/updated_at filled in
//! let user = orm
//!     .table("users")
//!     .create(Fields::new().set("username", "alice").set("email", "a@x.com"))
//!     .await?;
//!
//! // SELECT
//! let adults = orm
//!     .table("users")
//!     .select(&["id", "username"])
//!     .and_where("age", ">=", 18)?
//!     .order_by("id", Direction::Desc)
//!     .limit(20)
//!     .get()
//!     .await?;
//!
//! // UPDATE users SET email = $1 WHERE id = $2
//! orm.table("users")
//!     .and_where("id", "=", 1)?
//!     .update(Fields::new().set("email", "new@x.com"))
//!     .await?;
//!
//! orm.close().await?;
//! ```

pub mod backend;
pub mod clause;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod ident;
pub mod log;
pub mod model;
pub mod orm;
pub mod row;
pub mod statement_cache;
pub mod value;

pub use backend::Backend;
pub use clause::{Direction, JoinKind, Rendered};
pub use condition::Operator;
pub use config::{DatabaseConfig, OrmConfig, PoolLimits};
pub use context::ExecContext;
pub use error::{OrmError, OrmResult};
pub use executor::Operation;
pub use log::QueryLogger;
pub use model::Model;
pub use orm::Orm;
pub use statement_cache::CacheStats;
pub use value::{Fields, Param, Record, Value};

pub use tokio_util::sync::CancellationToken;

#[cfg(any(test, feature = "test-util"))]
pub use backend::MemoryBackend;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{PgBackend, PgStatement};
