//! Parameter binding and row decoding for `may_postgres`.
//!
//! PostgreSQL is strict about parameter types: an `i64` cannot be bound to an
//! `int4` parameter. Binding therefore follows the parameter types reported by
//! the prepared statement, typed NULLs included.
//!
//! Decoding maps the core scalar types onto [`Value`] variants. Numerics,
//! temporal types, UUIDs and JSON come back in their textual form; any other
//! type passes through as its raw text, or raw bytes when that is not UTF-8.

use super::{Row, Value};
use crate::error::LifeError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use may_postgres::types::{FromSql, ToSql, Type};
use rust_decimal::Decimal;
use std::error::Error;

/// A parameter ready to hand to `may_postgres`
pub type BoundParam = Box<dyn ToSql + Sync>;

/// Bind values to the parameter types of a prepared statement
///
/// # Errors
///
/// Returns `LifeError::Query` when the value count does not match the
/// statement, or a value cannot represent the requested type.
pub fn bind_params(values: &[Value], types: &[Type]) -> Result<Vec<BoundParam>, LifeError> {
    if values.len() != types.len() {
        return Err(LifeError::Query(format!(
            "statement expects {} parameter(s), {} given",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .map(|(value, ty)| bind_param(value, ty))
        .collect()
}

fn bind_param(value: &Value, ty: &Type) -> Result<BoundParam, LifeError> {
    if *ty == Type::BOOL {
        return match value {
            Value::Null => Ok(Box::new(None::<bool>)),
            Value::Bool(b) => Ok(Box::new(*b)),
            Value::Int(i) => Ok(Box::new(*i != 0)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::INT2 {
        return match value {
            Value::Null => Ok(Box::new(None::<i16>)),
            Value::Int(i) => i16::try_from(*i)
                .map(|v| Box::new(v) as BoundParam)
                .map_err(|_| mismatch(value, ty)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::INT4 {
        return match value {
            Value::Null => Ok(Box::new(None::<i32>)),
            Value::Int(i) => i32::try_from(*i)
                .map(|v| Box::new(v) as BoundParam)
                .map_err(|_| mismatch(value, ty)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::INT8 {
        return match value {
            Value::Null => Ok(Box::new(None::<i64>)),
            Value::Int(i) => Ok(Box::new(*i)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::FLOAT4 {
        return match value {
            Value::Null => Ok(Box::new(None::<f32>)),
            Value::Float(f) => Ok(Box::new(*f as f32)),
            Value::Int(i) => Ok(Box::new(*i as f32)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::FLOAT8 {
        return match value {
            Value::Null => Ok(Box::new(None::<f64>)),
            Value::Float(f) => Ok(Box::new(*f)),
            Value::Int(i) => Ok(Box::new(*i as f64)),
            other => Err(mismatch(other, ty)),
        };
    }
    if *ty == Type::BYTEA {
        return match value {
            Value::Null => Ok(Box::new(None::<Vec<u8>>)),
            Value::Bytes(b) => Ok(Box::new(b.clone())),
            other => Err(mismatch(other, ty)),
        };
    }
    // Text-like and anything else: send the textual form
    match value {
        Value::Null => Ok(Box::new(None::<String>)),
        Value::String(s) => Ok(Box::new(s.clone())),
        other => Ok(Box::new(other.to_string())),
    }
}

fn mismatch(value: &Value, ty: &Type) -> LifeError {
    LifeError::Query(format!("cannot bind {:?} to parameter of type {}", value, ty))
}

/// Decode a `may_postgres` row into an open [`Row`]
///
/// # Errors
///
/// Returns `LifeError::Parse` when a column's bytes do not decode as its
/// declared type.
pub fn decode_row(pg_row: &may_postgres::Row) -> Result<Row, LifeError> {
    let mut row = Row::with_capacity(pg_row.columns().len());
    for (idx, column) in pg_row.columns().iter().enumerate() {
        let value = decode_column(pg_row, idx, column.type_())
            .map_err(|e| LifeError::Parse(format!("column `{}`: {}", column.name(), e)))?;
        row.insert(column.name().to_string(), value);
    }
    Ok(row)
}

fn decode_column(pg_row: &may_postgres::Row, idx: usize, ty: &Type) -> Result<Value, String> {
    let err = |e: may_postgres::Error| e.to_string();
    if *ty == Type::BOOL {
        return Ok(pg_row.try_get::<_, Option<bool>>(idx).map_err(err)?.into());
    }
    if *ty == Type::INT2 {
        return Ok(pg_row.try_get::<_, Option<i16>>(idx).map_err(err)?.into());
    }
    if *ty == Type::INT4 {
        return Ok(pg_row.try_get::<_, Option<i32>>(idx).map_err(err)?.into());
    }
    if *ty == Type::INT8 {
        return Ok(pg_row.try_get::<_, Option<i64>>(idx).map_err(err)?.into());
    }
    if *ty == Type::FLOAT4 {
        return Ok(pg_row.try_get::<_, Option<f32>>(idx).map_err(err)?.into());
    }
    if *ty == Type::FLOAT8 {
        return Ok(pg_row.try_get::<_, Option<f64>>(idx).map_err(err)?.into());
    }
    if *ty == Type::BYTEA {
        return Ok(pg_row.try_get::<_, Option<Vec<u8>>>(idx).map_err(err)?.into());
    }
    if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
        return Ok(pg_row.try_get::<_, Option<String>>(idx).map_err(err)?.into());
    }
    let fallback = pg_row.try_get::<_, Option<Fallback>>(idx).map_err(err)?;
    Ok(fallback.map(|f| f.0).unwrap_or(Value::Null))
}

/// Column types without a dedicated [`Value`] variant
struct Fallback(Value);

impl<'a> FromSql<'a> for Fallback {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let value = if *ty == Type::NUMERIC {
            Value::String(Decimal::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::TIMESTAMP {
            Value::String(NaiveDateTime::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::TIMESTAMPTZ {
            Value::String(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339())
        } else if *ty == Type::DATE {
            Value::String(NaiveDate::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::TIME {
            Value::String(NaiveTime::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::UUID {
            Value::String(uuid::Uuid::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            Value::from_json(&serde_json::Value::from_sql(ty, raw)?)
        } else {
            match std::str::from_utf8(raw) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::Bytes(raw.to_vec()),
            }
        };
        Ok(Fallback(value))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}
