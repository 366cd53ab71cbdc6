//! Dynamically typed values, records and field sets.
//!
//! - [`Value`] is what a result column decodes into. It also implements `ToSql`,
//!   so values read from one query can be bound into the next.
//! - [`Record`] is one result row: column name to [`Value`].
//! - [`Fields`] is the column/parameter set passed to `create` and `update`.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// A boxed positional parameter.
pub type Param = Box<dyn ToSql + Sync + Send>;

/// Build a `Vec<Param>` from heterogeneous values, for join and raw HAVING
/// arguments.
///
/// ```
/// use pgmodel::params;
///
/// let args = params![100i64, "paid"];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Param>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$(::std::boxed::Box::new($value) as $crate::Param),+]
    };
}

/// One result row keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// A column value decoded from a result set.
///
/// Serializes untagged, so a [`Record`] turns into plain JSON:
///
/// ```
/// use pgmodel::{Record, Value};
///
/// let mut row = Record::new();
/// row.insert("id".into(), Value::Int(1));
/// row.insert("email".into(), Value::Null);
/// assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"email":null,"id":1}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    #[cfg(feature = "rust_decimal")]
    Decimal(rust_decimal::Decimal),
    Text(String),
    Bytes(Vec<u8>),
    /// `timestamptz`. Binds to `timestamp` columns as UTC wall-clock time.
    Timestamp(DateTime<Utc>),
    /// `timestamp`. Binds to `timestamptz` columns as UTC.
    NaiveTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => rust_decimal::Decimal::from(*v).to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Text(v) => v.as_str().to_sql(ty, out),
            Value::Bytes(v) => v.as_slice().to_sql(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::NaiveTimestamp(v) => match *ty {
                Type::TIMESTAMPTZ => v.and_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
        }
    }

    // The concrete encoder for each variant validates the column type.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => NaiveTimestamp,
    NaiveDate => Date,
    NaiveTime => Time,
    uuid::Uuid => Uuid,
    serde_json::Value => Json,
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Column/parameter pairs for INSERT and UPDATE.
///
/// Columns are kept sorted so the rendered SQL (and therefore the statement
/// cache key) is the same for the same set of columns.
///
/// ```
/// use pgmodel::Fields;
///
/// let fields = Fields::new()
///     .set("username", "alice")
///     .set("email", "a@x.com");
/// assert_eq!(fields.columns().collect::<Vec<_>>(), vec!["email", "username"]);
/// ```
#[derive(Debug, Default)]
pub struct Fields {
    values: BTreeMap<String, Param>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any previous value for the column.
    pub fn set<T>(mut self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.insert(column, value);
        self
    }

    /// In-place variant of [`Fields::set`].
    pub fn insert<T>(&mut self, column: impl Into<String>, value: T) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.values.insert(column.into(), Box::new(value));
        self
    }

    /// Set a column only if it was not already supplied.
    pub fn insert_if_absent<T>(&mut self, column: &str, value: T) -> bool
    where
        T: ToSql + Sync + Send + 'static,
    {
        if self.values.contains_key(column) {
            return false;
        }
        self.values.insert(column.to_string(), Box::new(value));
        true
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in render order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &(dyn ToSql + Sync))> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), &**v as &(dyn ToSql + Sync)))
    }
}

impl From<Record> for Fields {
    fn from(record: Record) -> Self {
        let mut fields = Fields::new();
        for (column, value) in record {
            fields.insert(column, value);
        }
        fields
    }
}
