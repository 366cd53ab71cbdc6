//! Pool and connection configuration.

use crate::error::{OrmError, OrmResult};
use std::time::Duration;

/// Connection limits applied once when the pool is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLimits {
    /// Maximum number of open connections.
    pub max_open: usize,
    /// Maximum number of idle connections kept around.
    pub max_idle: usize,
    /// Connections older than this are closed instead of reused. `None` keeps them forever.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_open: 20,
            max_idle: 5,
            max_lifetime: Some(Duration::from_secs(60 * 60)),
        }
    }
}

/// Configuration for [`Orm`](crate::Orm).
///
/// # Example
///
/// ```
/// use pgmodel::OrmConfig;
/// use std::time::Duration;
///
/// let config = OrmConfig::new()
///     .max_open(32)
///     .max_idle(8)
///     .max_lifetime(Duration::from_secs(600))
///     .with_query_log();
/// assert!(config.query_log);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OrmConfig {
    pub limits: PoolLimits,
    /// Log every statement with its arguments and duration.
    pub query_log: bool,
}

impl OrmConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits(mut self, limits: PoolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_open(mut self, n: usize) -> Self {
        self.limits.max_open = n;
        self
    }

    pub fn max_idle(mut self, n: usize) -> Self {
        self.limits.max_idle = n;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.limits.max_lifetime = Some(lifetime);
        self
    }

    /// Keep connections regardless of age.
    pub fn no_max_lifetime(mut self) -> Self {
        self.limits.max_lifetime = None;
        self
    }

    pub fn with_query_log(mut self) -> Self {
        self.query_log = true;
        self
    }

    pub fn no_query_log(mut self) -> Self {
        self.query_log = false;
        self
    }

    /// Load from the environment, falling back to defaults for unset keys.
    ///
    /// | key | meaning |
    /// |---|---|
    /// | `ORM_MAX_OPEN_CONNS` | max open connections |
    /// | `ORM_MAX_IDLE_CONNS` | max idle connections |
    /// | `ORM_CONN_MAX_LIFETIME_SECS` | max connection lifetime, `0` for unlimited |
    /// | `ORM_QUERY_LOG` | `true`/`false`/`1`/`0` |
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup("ORM_MAX_OPEN_CONNS") {
            config.limits.max_open = parse_number("ORM_MAX_OPEN_CONNS", &v)?;
        }
        if let Some(v) = lookup("ORM_MAX_IDLE_CONNS") {
            config.limits.max_idle = parse_number("ORM_MAX_IDLE_CONNS", &v)?;
        }
        if let Some(v) = lookup("ORM_CONN_MAX_LIFETIME_SECS") {
            let secs: u64 = parse_number("ORM_CONN_MAX_LIFETIME_SECS", &v)?;
            config.limits.max_lifetime = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = lookup("ORM_QUERY_LOG") {
            config.query_log = parse_bool("ORM_QUERY_LOG", &v)?;
        }
        Ok(config)
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}

impl DatabaseConfig {
    /// Load `DB_HOST`, `DB_PORT`, `DB_USERNAME`, `DB_PASSWORD`, `DB_NAME` and
    /// `DB_SSLMODE`. Unset keys stay empty and are left out of the connection string.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            host: get("DB_HOST"),
            port: get("DB_PORT"),
            username: get("DB_USERNAME"),
            password: get("DB_PASSWORD"),
            dbname: get("DB_NAME"),
            sslmode: get("DB_SSLMODE"),
        }
    }

    /// Key/value connection string understood by `tokio_postgres::Config`.
    pub fn connection_string(&self) -> String {
        let pairs = [
            ("host", &self.host),
            ("port", &self.port),
            ("user", &self.username),
            ("password", &self.password),
            ("dbname", &self.dbname),
            ("sslmode", &self.sslmode),
        ];
        pairs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={}", quote_conn_value(v)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse into a driver config.
    pub fn to_pg_config(&self) -> OrmResult<tokio_postgres::Config> {
        self.connection_string()
            .parse()
            .map_err(|e: tokio_postgres::Error| OrmError::Config(e.to_string()))
    }
}

fn quote_conn_value(v: &str) -> String {
    if !v.is_empty() && !v.contains([' ', '\'', '\\']) {
        return v.to_string();
    }
    let escaped = v.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> OrmResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OrmError::Config(format!("{key}: expected a number, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> OrmResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(OrmError::Config(format!(
            "{key}: expected a boolean, got {value:?}"
        ))),
    }
}
