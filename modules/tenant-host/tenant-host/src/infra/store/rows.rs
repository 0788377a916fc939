//! JSON <-> SQLite value conversion for raw tenant statements.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column as _, Row as _, Sqlite, TypeInfo as _, ValueRef as _};
use tenant_host_sdk::SqlParam;

pub(super) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind positional parameters in order.
///
/// Integers that fit `i64` bind as INTEGER, other numbers as REAL; arrays and
/// objects bind as their JSON text.
pub(super) fn bind_all(mut query: SqliteQuery<'_>, params: Vec<SqlParam>) -> SqliteQuery<'_> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => query.bind(i),
                (None, Some(f)) => query.bind(f),
                (None, None) => query.bind(n.to_string()),
            },
            Value::String(s) => query.bind(s),
            other @ (Value::Array(_) | Value::Object(_)) => query.bind(other.to_string()),
        };
    }
    query
}

pub(super) fn column_names(row: &SqliteRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_owned()).collect()
}

/// Decode every column of `row` by its runtime storage class.
pub(super) fn decode_row(row: &SqliteRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

fn decode_cell(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_owned();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => serde_json::Number::from_f64(row.try_get_unchecked::<f64, _>(idx)?)
            .map_or(Value::Null, Value::Number),
        "BLOB" => Value::String(BASE64.encode(row.try_get_unchecked::<Vec<u8>, _>(idx)?)),
        _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}
