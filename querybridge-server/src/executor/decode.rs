//! Row decoding into loosely-typed JSON values
//!
//! Numbers, strings and booleans map to their JSON counterparts. Decimals are
//! rendered as strings so no precision is lost; values wider than
//! `rust_decimal` holds (or `NaN`) fall back to the engine's own text. Binary
//! columns become base64, and
//! temporal values as ISO-8601 text. Anything else is read as text when the
//! driver allows it and becomes `null` otherwise.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, FromSql};

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub(super) fn pg_row(row: &PgRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| pg_value(row, i)).collect()
}

pub(super) fn mysql_row(row: &MySqlRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| mysql_value(row, i)).collect()
}

pub(super) fn sqlite_row(row: &SqliteRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| sqlite_value(row, i)).collect()
}

pub(super) fn mssql_row(row: tiberius::Row) -> Vec<Value> {
    row.into_iter().map(mssql_value).collect()
}

fn pg_value(row: &PgRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    match row.column(index).type_info().name() {
        "BOOL" => json(row.try_get::<bool, _>(index)),
        "INT2" => json(row.try_get::<i16, _>(index)),
        "INT4" => json(row.try_get::<i32, _>(index)),
        "INT8" => json(row.try_get::<i64, _>(index)),
        "FLOAT4" => json(row.try_get::<f32, _>(index)),
        "FLOAT8" => json(row.try_get::<f64, _>(index)),
        "NUMERIC" => decimal_or_text(row.try_get::<Decimal, _>(index), || {
            row.try_get_unchecked::<String, _>(index)
        }),
        "UUID" => json(row.try_get::<uuid::Uuid, _>(index).map(|u| u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        "BYTEA" => json(row.try_get::<Vec<u8>, _>(index).map(|b| BASE64.encode(b))),
        "TIMESTAMPTZ" => json(row.try_get::<DateTime<Utc>, _>(index).map(|t| t.to_rfc3339())),
        "TIMESTAMP" => json(row.try_get::<NaiveDateTime, _>(index).map(naive_datetime)),
        "DATE" => json(row.try_get::<NaiveDate, _>(index).map(|d| d.to_string())),
        "TIME" => json(row.try_get::<NaiveTime, _>(index).map(|t| t.to_string())),
        _ => json(row.try_get::<String, _>(index)),
    }
}

fn mysql_value(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    match row.column(index).type_info().name() {
        "BOOLEAN" => json(row.try_get::<bool, _>(index)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            json(row.try_get::<i64, _>(index))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => json(row.try_get::<u64, _>(index)),
        "FLOAT" => json(row.try_get::<f32, _>(index)),
        "DOUBLE" => json(row.try_get::<f64, _>(index)),
        "DECIMAL" => decimal_or_text(row.try_get::<Decimal, _>(index), || {
            row.try_get_unchecked::<String, _>(index)
        }),
        "JSON" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            json(row.try_get::<Vec<u8>, _>(index).map(|b| BASE64.encode(b)))
        }
        "TIMESTAMP" => json(row.try_get::<DateTime<Utc>, _>(index).map(|t| t.to_rfc3339())),
        "DATETIME" => json(row.try_get::<NaiveDateTime, _>(index).map(naive_datetime)),
        "DATE" => json(row.try_get::<NaiveDate, _>(index).map(|d| d.to_string())),
        "TIME" => json(row.try_get::<NaiveTime, _>(index).map(|t| t.to_string())),
        _ => json(row.try_get_unchecked::<String, _>(index)),
    }
}

/// SQLite columns are dynamically typed, so dispatch on the stored value's
/// storage class rather than the declared column type.
fn sqlite_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => raw.type_info().name().to_owned(),
        _ => return Value::Null,
    };

    match storage_class.as_str() {
        "INTEGER" => json(row.try_get_unchecked::<i64, _>(index)),
        "REAL" => json(row.try_get_unchecked::<f64, _>(index)),
        "BLOB" => json(row.try_get_unchecked::<Vec<u8>, _>(index).map(|b| BASE64.encode(b))),
        _ => json(row.try_get_unchecked::<String, _>(index)),
    }
}

fn mssql_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::String(v) => v.map(|s| Value::from(s.into_owned())).unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(|g| Value::from(g.to_string())).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|b| Value::from(BASE64.encode(b)))
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::from(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v.map(|n| Value::from(numeric_text(n))).unwrap_or(Value::Null),
        temporal => mssql_temporal(&temporal),
    }
}

/// Date and time columns. `FromSql` rejects variants it does not cover, so
/// try each chrono target in turn.
fn mssql_temporal(data: &ColumnData<'static>) -> Value {
    if let Ok(value) = NaiveDateTime::from_sql(data) {
        return value.map(|v| Value::from(naive_datetime(v))).unwrap_or(Value::Null);
    }
    if let Ok(value) = DateTime::<FixedOffset>::from_sql(data) {
        return value.map(|v| Value::from(v.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(value) = NaiveDate::from_sql(data) {
        return value.map(|v| Value::from(v.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(value) = NaiveTime::from_sql(data) {
        return value.map(|v| Value::from(v.to_string())).unwrap_or(Value::Null);
    }
    Value::Null
}

/// Query results arrive in text format, so the raw text is the fallback for
/// anything `Decimal` cannot hold.
fn decimal_or_text(
    decimal: Result<Decimal, sqlx::Error>,
    text: impl FnOnce() -> Result<String, sqlx::Error>,
) -> Value {
    match decimal {
        Ok(d) => Value::from(d.to_string()),
        Err(_) => json(text()),
    }
}

/// TDS numerics carry up to 38 digits; format them exactly instead of
/// narrowing through `Decimal`.
fn numeric_text(n: Numeric) -> String {
    let sign = if n.value() < 0 { "-" } else { "" };
    let digits = n.value().unsigned_abs().to_string();
    let scale = usize::from(n.scale());
    if scale == 0 {
        return format!("{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int, frac) = padded.split_at(padded.len() - scale);
    format!("{sign}{int}.{frac}")
}

fn naive_datetime(value: NaiveDateTime) -> String {
    value.format(NAIVE_DATETIME_FORMAT).to_string()
}

fn json<T: Into<Value>>(result: Result<T, sqlx::Error>) -> Value {
    result.map(Into::into).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::borrow::Cow;

    #[test]
    fn tds_scalars() {
        assert_eq!(mssql_value(ColumnData::I32(Some(7))), json!(7));
        assert_eq!(mssql_value(ColumnData::I32(None)), Value::Null);
        assert_eq!(mssql_value(ColumnData::Bit(Some(true))), json!(true));
        assert_eq!(
            mssql_value(ColumnData::String(Some(Cow::Borrowed("abc")))),
            json!("abc")
        );
    }

    #[test]
    fn tds_binary_is_base64() {
        let data = ColumnData::Binary(Some(Cow::Owned(vec![0xde, 0xad, 0xbe, 0xef])));
        assert_eq!(mssql_value(data), json!("3q2+7w=="));
    }

    #[test]
    fn tds_numeric_keeps_full_precision() {
        // 38 digits, wider than rust_decimal's 28
        let digits: i128 = 12_345_678_901_234_567_890_123_456_789_012_345_678;
        let data = ColumnData::Numeric(Some(Numeric::new_with_scale(digits, 4)));
        assert_eq!(
            mssql_value(data),
            json!("1234567890123456789012345678901234.5678")
        );
        assert_eq!(numeric_text(Numeric::new_with_scale(1050, 2)), "10.50");
        assert_eq!(numeric_text(Numeric::new_with_scale(-5, 2)), "-0.05");
        assert_eq!(numeric_text(Numeric::new_with_scale(42, 0)), "42");
    }

    #[test]
    fn oversized_decimal_falls_back_to_text() {
        let overflow = Err(sqlx::Error::Decode("numeric out of range".into()));
        let wide = "123456789012345678901234567890.123456789";
        assert_eq!(decimal_or_text(overflow, || Ok(wide.to_owned())), json!(wide));

        let nan = Err(sqlx::Error::Decode("NaN".into()));
        assert_eq!(decimal_or_text(nan, || Ok("NaN".to_owned())), json!("NaN"));
    }

    #[test]
    fn in_range_decimal_skips_fallback() {
        let value = decimal_or_text(Ok(Decimal::new(1050, 2)), || {
            panic!("fallback must not be read")
        });
        assert_eq!(value, json!("10.50"));
    }

    #[test]
    fn naive_datetime_is_iso() {
        let value = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap();
        assert_eq!(naive_datetime(value), "2024-03-09T14:05:00");
    }
}
