//! Row scanning: `tokio_postgres::Row` to [`Record`].

use crate::error::{OrmError, OrmResult};
use crate::value::{Record, Value};
use serde::Serialize;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};

/// Scan every column of `row` into a fresh [`Record`].
///
/// Each column decodes into the [`Value`] variant that matches its Postgres
/// type; SQL `NULL` becomes [`Value::Null`]. Arrays of scalar types decode
/// into [`Value::Json`] arrays, and any other type with no [`Value`]
/// counterpart (`interval`, `inet`, ...) keeps its binary wire encoding as
/// [`Value::Bytes`].
pub fn to_record(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value =
            decode_column(row, idx, column.type_()).map_err(|e| OrmError::scan(column.name(), e))?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Scan a whole result set.
pub fn to_records(rows: &[Row]) -> OrmResult<Vec<Record>> {
    rows.iter().map(to_record).collect()
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, String> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<Value, String> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx)?.map(Value::Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx)?.map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::Timestamp),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::NaiveTimestamp),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        // Extension types (citext, ...) report as text-like; try text before giving up.
        _ if <String as FromSql<'_>>::accepts(ty) => get::<String>(row, idx)?.map(Value::Text),
        _ => match get::<Raw<'_>>(row, idx)? {
            Some(Raw(raw)) => Some(decode_raw(ty, raw)?),
            None => None,
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Undecoded column bytes, accepted for any type.
struct Raw<'a>(&'a [u8]);

impl<'a> FromSql<'a> for Raw<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Raw(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_raw(ty: &Type, raw: &[u8]) -> Result<Value, String> {
    let Kind::Array(element) = ty.kind() else {
        return Ok(Value::Bytes(raw.to_vec()));
    };
    let json = match *element {
        Type::BOOL => array::<bool>(ty, raw)?,
        Type::INT2 => array::<i16>(ty, raw)?,
        Type::INT4 => array::<i32>(ty, raw)?,
        Type::INT8 => array::<i64>(ty, raw)?,
        Type::FLOAT4 => array::<f32>(ty, raw)?,
        Type::FLOAT8 => array::<f64>(ty, raw)?,
        Type::UUID => array::<uuid::Uuid>(ty, raw)?,
        Type::JSON | Type::JSONB => array::<serde_json::Value>(ty, raw)?,
        _ if <String as FromSql<'_>>::accepts(element) => array::<String>(ty, raw)?,
        _ => return Ok(Value::Bytes(raw.to_vec())),
    };
    Ok(Value::Json(json))
}

fn array<T>(ty: &Type, raw: &[u8]) -> Result<serde_json::Value, String>
where
    T: for<'a> FromSql<'a> + Serialize,
{
    let items = <Vec<Option<T>> as FromSql<'_>>::from_sql(ty, raw).map_err(|e| e.to_string())?;
    serde_json::to_value(items).map_err(|e| e.to_string())
}
