//! Error types for pgmodel

use crate::executor::Operation;
use thiserror::Error;

/// Result type alias for pgmodel operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Operator outside the WHERE/HAVING allow-list
    #[error("Invalid operator: {0:?}")]
    InvalidOperator(String),

    /// Caller passed an unusable argument (e.g. empty field set)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Statement compilation failed
    #[error("Prepare error for {sql:?}: {source}")]
    Prepare {
        sql: String,
        #[source]
        source: Box<OrmError>,
    },

    /// Statement execution failed
    #[error("{operation} error: {source}")]
    Execution {
        operation: Operation,
        #[source]
        source: Box<OrmError>,
    },

    /// Row decode/mapping error
    #[error("Scan error on column '{column}': {message}")]
    Scan { column: String, message: String },

    /// One or more cached statements failed to release
    #[error("Cleanup errors: {}", .failures.join("; "))]
    Cleanup { failures: Vec<String> },

    /// The execution context was canceled
    #[error("Query canceled")]
    Canceled,

    /// The execution context deadline passed
    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    /// The pool has been closed
    #[error("Pool is closed")]
    Closed,

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error reported by the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a scan error for a specific column
    pub fn scan(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scan {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap a compile failure together with the SQL that failed.
    ///
    /// Context errors pass through untouched so callers can still match on them.
    pub(crate) fn prepare(sql: &str, source: OrmError) -> Self {
        if source.is_context_error() {
            return source;
        }
        Self::Prepare {
            sql: sql.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an execution failure together with the operation that failed.
    ///
    /// Context and scan errors pass through untouched.
    pub(crate) fn execution(operation: Operation, source: OrmError) -> Self {
        if source.is_context_error() || matches!(source, Self::Scan { .. }) {
            return source;
        }
        Self::Execution {
            operation,
            source: Box::new(source),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is an invalid operator error
    pub fn is_invalid_operator(&self) -> bool {
        matches!(self, Self::InvalidOperator(_))
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if the execution context was canceled
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Check if the execution context deadline passed
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded | Self::Closed)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
