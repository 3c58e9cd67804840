//! SQL and host type codes, plus the value model that travels across the
//! driver pipe.
//!
//! A column declares two types: the SQL type the backend stores and the
//! host type its values are marshalled as. The host type picks the active
//! `Value` variant; the SQL type's interval range picks the datetime text
//! format.

pub mod datetime;
pub mod string;
pub mod value;

pub use datetime::{DateTime, DatetimeField, IntervalRange};
pub use string::DbString;
pub use value::Value;

use std::fmt;

/// Mask selecting the interval bits of a SQL type code.
pub const DATETIME_MASK: i32 = 0xFF00;

/// Host-language representation of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    String,
    Int,
    Double,
    DateTime,
}

impl HostType {
    pub const fn code(self) -> i32 {
        match self {
            HostType::String => 1,
            HostType::Int => 2,
            HostType::Double => 3,
            HostType::DateTime => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(HostType::String),
            2 => Some(HostType::Int),
            3 => Some(HostType::Double),
            4 => Some(HostType::DateTime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HostType::String => "string",
            HostType::Int => "integer",
            HostType::Double => "double",
            HostType::DateTime => "datetime",
        }
    }

    /// True for host types whose values own heap payloads.
    pub fn owns_payload(self) -> bool {
        matches!(self, HostType::String | HostType::DateTime)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SQL-level column type. Datetime types may carry an interval range,
/// which is encoded in the upper bits of the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Unknown,
    Character,
    Smallint,
    Integer,
    Real,
    DoublePrecision,
    Decimal,
    Numeric,
    Date,
    Time,
    Timestamp(Option<IntervalRange>),
    Interval(Option<IntervalRange>),
    Text,
    Serial,
}

impl SqlType {
    /// Wire code: base type OR-ed with the interval bits.
    pub fn code(self) -> i32 {
        match self {
            SqlType::Unknown => 0,
            SqlType::Character => 1,
            SqlType::Smallint => 2,
            SqlType::Integer => 3,
            SqlType::Real => 4,
            SqlType::DoublePrecision => 6,
            SqlType::Decimal => 7,
            SqlType::Numeric => 8,
            SqlType::Date => 9,
            SqlType::Time => 10,
            SqlType::Timestamp(range) => 11 | range.map_or(0, IntervalRange::bits),
            SqlType::Interval(range) => 12 | range.map_or(0, IntervalRange::bits),
            SqlType::Text => 13,
            SqlType::Serial => 21,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let range = IntervalRange::from_bits(code & DATETIME_MASK);
        let sql_type = match code & !DATETIME_MASK {
            0 => SqlType::Unknown,
            1 => SqlType::Character,
            2 => SqlType::Smallint,
            3 => SqlType::Integer,
            4 => SqlType::Real,
            6 => SqlType::DoublePrecision,
            7 => SqlType::Decimal,
            8 => SqlType::Numeric,
            9 => SqlType::Date,
            10 => SqlType::Time,
            11 => SqlType::Timestamp(range),
            12 => SqlType::Interval(range),
            13 => SqlType::Text,
            21 => SqlType::Serial,
            _ => return None,
        };
        Some(sql_type)
    }

    /// Parse a SQL type name such as `integer`, `varchar` or `double precision`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let base = lower.split('(').next().unwrap_or("").trim();
        let sql_type = match base {
            "char" | "character" | "varchar" | "character varying" | "string" => {
                SqlType::Character
            }
            "smallint" => SqlType::Smallint,
            "int" | "integer" => SqlType::Integer,
            "real" | "float" => SqlType::Real,
            "double" | "double precision" => SqlType::DoublePrecision,
            "decimal" => SqlType::Decimal,
            "numeric" => SqlType::Numeric,
            "date" => SqlType::Date,
            "time" => SqlType::Time,
            "timestamp" | "datetime" => SqlType::Timestamp(None),
            "interval" => SqlType::Interval(None),
            "text" => SqlType::Text,
            "serial" => SqlType::Serial,
            "unknown" => SqlType::Unknown,
            _ => return None,
        };
        Some(sql_type)
    }

    pub fn name(self) -> &'static str {
        match self {
            SqlType::Unknown => "UNKNOWN",
            SqlType::Character => "CHARACTER",
            SqlType::Smallint => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Decimal => "DECIMAL",
            SqlType::Numeric => "NUMERIC",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp(_) => "TIMESTAMP",
            SqlType::Interval(_) => "INTERVAL",
            SqlType::Text => "TEXT",
            SqlType::Serial => "SERIAL",
        }
    }

    /// Host type values of this SQL type are marshalled as.
    pub fn host_type(self) -> HostType {
        match self {
            SqlType::Unknown | SqlType::Character | SqlType::Text => HostType::String,
            SqlType::Smallint | SqlType::Integer | SqlType::Serial => HostType::Int,
            SqlType::Real | SqlType::DoublePrecision | SqlType::Decimal | SqlType::Numeric => {
                HostType::Double
            }
            SqlType::Date | SqlType::Time | SqlType::Timestamp(_) | SqlType::Interval(_) => {
                HostType::DateTime
            }
        }
    }

    /// Datetime fields populated by this type, `None` for non-datetime types.
    pub fn interval_range(self) -> Option<IntervalRange> {
        match self {
            SqlType::Date => Some(IntervalRange::new(DatetimeField::Year, DatetimeField::Day)),
            SqlType::Time => Some(IntervalRange::new(
                DatetimeField::Hour,
                DatetimeField::Fraction,
            )),
            SqlType::Timestamp(range) | SqlType::Interval(range) => {
                Some(range.unwrap_or(IntervalRange::FULL))
            }
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_type_mapping() {
        assert_eq!(SqlType::Character.host_type(), HostType::String);
        assert_eq!(SqlType::Serial.host_type(), HostType::Int);
        assert_eq!(SqlType::Numeric.host_type(), HostType::Double);
        assert_eq!(SqlType::Time.host_type(), HostType::DateTime);
        assert_eq!(SqlType::Unknown.host_type(), HostType::String);
    }

    #[test]
    fn test_sql_type_code_with_range() {
        let range = IntervalRange::new(DatetimeField::Year, DatetimeField::Month);
        let t = SqlType::Interval(Some(range));
        assert_eq!(t.code(), 12 | 0x4000 | 0x2000);
        assert_eq!(SqlType::from_code(t.code()), Some(t));
        assert_eq!(t.interval_range(), Some(range));
    }

    #[test]
    fn test_plain_codes_round_trip() {
        for code in [0, 1, 2, 3, 4, 6, 7, 8, 9, 10, 11, 12, 13, 21] {
            let t = SqlType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert_eq!(SqlType::from_code(5), None);
    }

    #[test]
    fn test_default_ranges() {
        assert_eq!(
            SqlType::Date.interval_range(),
            Some(IntervalRange::new(DatetimeField::Year, DatetimeField::Day))
        );
        assert_eq!(
            SqlType::Timestamp(None).interval_range(),
            Some(IntervalRange::FULL)
        );
        assert_eq!(SqlType::Integer.interval_range(), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(SqlType::from_name("VARCHAR(20)"), Some(SqlType::Character));
        assert_eq!(
            SqlType::from_name("double precision"),
            Some(SqlType::DoublePrecision)
        );
        assert_eq!(SqlType::from_name("blob"), None);
    }
}
