//! Conversion between [`Value`] and `sea_query::Value`.
//!
//! Statements are built with sea-query and then handed to the executor with
//! the crate's own values, so both directions are needed.

use super::Value;
use crate::error::LifeError;

impl From<Value> for sea_query::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => sea_query::Value::String(None),
            Value::Bool(b) => sea_query::Value::Bool(Some(b)),
            Value::Int(i) => sea_query::Value::BigInt(Some(i)),
            Value::Float(f) => sea_query::Value::Double(Some(f)),
            Value::String(s) => sea_query::Value::from(s),
            Value::Bytes(b) => sea_query::Value::from(b),
        }
    }
}

impl From<&Value> for sea_query::Value {
    fn from(value: &Value) -> Self {
        value.clone().into()
    }
}

/// Convert a value produced by the statement builder back into a [`Value`]
///
/// # Errors
///
/// Returns `LifeError::Query` for value kinds lifeline never binds
/// (dates, decimals and similar).
pub fn from_sea_value(value: &sea_query::Value) -> Result<Value, LifeError> {
    use sea_query::Value as Sv;
    let converted = match value {
        Sv::Bool(Some(b)) => Value::Bool(*b),
        Sv::TinyInt(Some(i)) => Value::Int(*i as i64),
        Sv::SmallInt(Some(i)) => Value::Int(*i as i64),
        Sv::Int(Some(i)) => Value::Int(*i as i64),
        Sv::BigInt(Some(i)) => Value::Int(*i),
        Sv::TinyUnsigned(Some(u)) => Value::Int(*u as i64),
        Sv::SmallUnsigned(Some(u)) => Value::Int(*u as i64),
        Sv::Unsigned(Some(u)) => Value::Int(*u as i64),
        Sv::BigUnsigned(Some(u)) => {
            if *u > i64::MAX as u64 {
                return Err(LifeError::Query(format!(
                    "unsigned value {} exceeds i64::MAX",
                    u
                )));
            }
            Value::Int(*u as i64)
        }
        Sv::Float(Some(f)) => Value::Float(*f as f64),
        Sv::Double(Some(d)) => Value::Float(*d),
        Sv::String(Some(s)) => Value::String(s.to_string()),
        Sv::Char(Some(c)) => Value::String(c.to_string()),
        Sv::Bytes(Some(b)) => Value::Bytes(b.to_vec()),
        Sv::Json(Some(j)) => Value::String(j.to_string()),
        Sv::Bool(None)
        | Sv::TinyInt(None)
        | Sv::SmallInt(None)
        | Sv::Int(None)
        | Sv::BigInt(None)
        | Sv::TinyUnsigned(None)
        | Sv::SmallUnsigned(None)
        | Sv::Unsigned(None)
        | Sv::BigUnsigned(None)
        | Sv::Float(None)
        | Sv::Double(None)
        | Sv::String(None)
        | Sv::Char(None)
        | Sv::Bytes(None)
        | Sv::Json(None) => Value::Null,
        _ => {
            return Err(LifeError::Query(format!(
                "unsupported value type in statement: {:?}",
                value
            )))
        }
    };
    Ok(converted)
}

/// Convert every value of a built statement
pub fn from_sea_values(values: &sea_query::Values) -> Result<Vec<Value>, LifeError> {
    values.iter().map(from_sea_value).collect()
}
