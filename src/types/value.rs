//! Nullable, typed column value.

use super::{DateTime, DbString, HostType, IntervalRange, SqlType};
use crate::error::{DbmiError, DbmiResult};
use serde::Serialize;
use std::cmp::Ordering;

/// A column value. `Null` is a variant of its own, so a null value never
/// carries a stale payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Double(f64),
    String(DbString),
    DateTime(DateTime),
}

impl Value {
    pub fn string(text: impl Into<DbString>) -> Self {
        Value::String(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Host type of the payload, `None` for null.
    pub fn host_type(&self) -> Option<HostType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(HostType::Int),
            Value::Double(_) => Some(HostType::Double),
            Value::String(_) => Some(HostType::String),
            Value::DateTime(_) => Some(HostType::DateTime),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.host_type().map_or("null", HostType::name)
    }

    /// Null always fits; anything else must match `host_type` exactly.
    pub fn check_type(&self, host_type: HostType) -> DbmiResult<()> {
        match self.host_type() {
            None => Ok(()),
            Some(t) if t == host_type => Ok(()),
            Some(_) => Err(DbmiError::TypeMismatch {
                expected: host_type.name(),
                got: self.type_name(),
            }),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to doubles.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Overwrite `self` with `other`, reusing the string allocation when
    /// both are strings.
    pub fn assign(&mut self, other: &Value) {
        if let (Value::String(dst), Value::String(src)) = (&mut *self, other) {
            dst.copy(src.as_str());
            return;
        }
        *self = other.clone();
    }

    /// Text form of the value for a column of `sql_type`. Null is the
    /// empty string.
    pub fn to_text(&self, sql_type: SqlType) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Double(d) => d.to_string(),
            Value::String(s) => s.as_str().to_string(),
            Value::DateTime(dt) => {
                dt.format(sql_type.interval_range().unwrap_or(IntervalRange::FULL))
            }
        }
    }

    /// Parse text into a value of the host type of `sql_type`.
    pub fn from_text(text: &str, sql_type: SqlType) -> DbmiResult<Value> {
        let bad = |what: &str| DbmiError::Failed(format!("Cannot convert '{}' to {}", text, what));
        match sql_type.host_type() {
            HostType::String => Ok(Value::string(text)),
            HostType::Int => text.trim().parse().map(Value::Int).map_err(|_| bad("integer")),
            HostType::Double => text
                .trim()
                .parse()
                .map(Value::Double)
                .map_err(|_| bad("double")),
            HostType::DateTime => {
                let range = sql_type.interval_range().unwrap_or(IntervalRange::FULL);
                DateTime::parse(text, range).map(Value::DateTime)
            }
        }
    }

    /// Ordering used when sorting by value: nulls last, numbers by
    /// magnitude, strings bytewise. Mixed or datetime payloads do not
    /// compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Greater),
            (_, Value::Null) => Some(Ordering::Less),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<DateTime> for Value {
    fn from(dt: DateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
