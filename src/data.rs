use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoercionError;

/// A value ready to be bound into an insert statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used when the value is sent to the database as a literal.
    pub fn as_sql_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_sql_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "NULL"),
        }
    }
}

/// Storage class of a destination column, derived from its declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Text,
}

impl TargetKind {
    pub fn from_sql_type(sql_type: &str) -> Self {
        let lowered = sql_type.trim().to_ascii_lowercase();
        let base = lowered.split('(').next().unwrap_or_default().trim();
        match base {
            "integer" | "int" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
            | "bigserial" | "smallserial" => TargetKind::Integer,
            "numeric" | "decimal" | "real" | "float4" | "float8" | "double precision" | "float"
            | "money" => TargetKind::Float,
            "boolean" | "bool" => TargetKind::Boolean,
            "date" => TargetKind::Date,
            other if other.starts_with("timestamp") => TargetKind::Timestamp,
            _ => TargetKind::Text,
        }
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Converts a raw cell into a [`Value`] suitable for a column declared as `sql_type`.
///
/// Missing and blank cells become [`Value::Null`]; the store decides whether
/// that is acceptable.
pub fn coerce_value(
    raw: Option<&str>,
    column: &str,
    sql_type: &str,
) -> Result<Value, CoercionError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(Value::Null);
    };
    let fail = || CoercionError {
        column: column.to_string(),
        sql_type: sql_type.to_string(),
        value: value.to_string(),
    };
    let coerced = match TargetKind::from_sql_type(sql_type) {
        TargetKind::Integer => Value::Integer(value.parse::<i64>().map_err(|_| fail())?),
        TargetKind::Float => {
            let parsed = value.parse::<f64>().map_err(|_| fail())?;
            if !parsed.is_finite() {
                return Err(fail());
            }
            Value::Float(parsed)
        }
        TargetKind::Boolean => Value::Boolean(parse_boolean_token(value).ok_or_else(fail)?),
        TargetKind::Date => {
            let date = parse_naive_date(value)
                .or_else(|_| parse_naive_datetime(value).map(|dt| dt.date()))
                .map_err(|_| fail())?;
            Value::Date(date)
        }
        TargetKind::Timestamp => {
            let timestamp = parse_naive_datetime(value)
                .or_else(|_| {
                    parse_naive_date(value).map(|d| d.and_time(NaiveTime::MIN))
                })
                .map_err(|_| fail())?;
            Value::Timestamp(timestamp)
        }
        TargetKind::Text => Value::Text(value.to_string()),
    };
    Ok(coerced)
}
