//! Datetime values and their range-dependent text form.
//!
//! SQL datetime types populate only a sub-range of the fields: a DATE has
//! year..day, a TIME hour..fraction. Fields outside the range are never
//! formatted and come back as zero after parsing.

use crate::error::{DbmiError, DbmiResult};
use chrono::{Datelike, Local, Timelike};
use serde::Serialize;

/// Token meaning "the time the statement executes".
pub const CURRENT_TOKEN: &str = "CURRENT";

/// Datetime field, ordered from most to least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatetimeField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Fraction,
}

impl DatetimeField {
    const ORDER: [DatetimeField; 7] = [
        DatetimeField::Year,
        DatetimeField::Month,
        DatetimeField::Day,
        DatetimeField::Hour,
        DatetimeField::Minute,
        DatetimeField::Second,
        DatetimeField::Fraction,
    ];

    pub const fn bit(self) -> i32 {
        match self {
            DatetimeField::Year => 0x4000,
            DatetimeField::Month => 0x2000,
            DatetimeField::Day => 0x1000,
            DatetimeField::Hour => 0x0800,
            DatetimeField::Minute => 0x0400,
            DatetimeField::Second => 0x0200,
            DatetimeField::Fraction => 0x0100,
        }
    }

    fn is_date(self) -> bool {
        self <= DatetimeField::Day
    }
}

/// Inclusive range of datetime fields, `from` being the most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalRange {
    pub from: DatetimeField,
    pub to: DatetimeField,
}

impl IntervalRange {
    pub const FULL: IntervalRange = IntervalRange {
        from: DatetimeField::Year,
        to: DatetimeField::Fraction,
    };

    /// Build a range; the endpoints are swapped if given in reverse.
    pub fn new(from: DatetimeField, to: DatetimeField) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// Every field bit between `from` and `to`.
    pub fn bits(self) -> i32 {
        self.fields().fold(0, |acc, f| acc | f.bit())
    }

    /// Range spanning the most and least significant bits set.
    pub fn from_bits(bits: i32) -> Option<Self> {
        let mut set = DatetimeField::ORDER.iter().filter(|f| bits & f.bit() != 0);
        let from = *set.next()?;
        let to = set.last().copied().unwrap_or(from);
        Some(Self { from, to })
    }

    pub fn contains(self, field: DatetimeField) -> bool {
        self.from <= field && field <= self.to
    }

    pub fn fields(self) -> impl Iterator<Item = DatetimeField> {
        DatetimeField::ORDER
            .into_iter()
            .filter(move |f| self.contains(*f))
    }

    pub fn has_fraction(self) -> bool {
        self.to == DatetimeField::Fraction
    }

    /// Fields that appear as separate tokens in the text form. The
    /// fraction is written as part of the seconds.
    fn text_fields(self) -> Vec<DatetimeField> {
        let from = self.from.min(DatetimeField::Second);
        let to = self.to.min(DatetimeField::Second);
        DatetimeField::ORDER
            .into_iter()
            .filter(|f| from <= *f && *f <= to)
            .collect()
    }
}

/// A datetime record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DateTime {
    /// Execution-time "now"; the numeric fields are not set.
    pub current: bool,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    /// Seconds including the fraction.
    pub seconds: f64,
}

impl DateTime {
    pub fn current() -> Self {
        Self {
            current: true,
            ..Self::default()
        }
    }

    pub fn date(year: i32, month: i32, day: i32) -> Self {
        Self {
            year,
            month,
            day,
            ..Self::default()
        }
    }

    pub fn time(hour: i32, minute: i32, seconds: f64) -> Self {
        Self {
            hour,
            minute,
            seconds,
            ..Self::default()
        }
    }

    pub fn with_time(mut self, hour: i32, minute: i32, seconds: f64) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.seconds = seconds;
        self
    }

    /// Copy with every field outside `range` reset to zero.
    pub fn truncate(&self, range: IntervalRange) -> Self {
        if self.current {
            return Self::current();
        }
        let mut out = Self::default();
        for field in range.fields() {
            match field {
                DatetimeField::Year => out.year = self.year,
                DatetimeField::Month => out.month = self.month,
                DatetimeField::Day => out.day = self.day,
                DatetimeField::Hour => out.hour = self.hour,
                DatetimeField::Minute => out.minute = self.minute,
                DatetimeField::Second => out.seconds = self.seconds.trunc(),
                DatetimeField::Fraction => {
                    let seconds = if range.contains(DatetimeField::Second) {
                        self.seconds
                    } else {
                        self.seconds.fract()
                    };
                    out.seconds = seconds_text(seconds, true).parse().unwrap_or(seconds);
                }
            }
        }
        out
    }

    /// Replace a `current` value with the local clock; other values are
    /// returned unchanged.
    pub fn resolve_current(&self) -> Self {
        if !self.current {
            return *self;
        }
        let now = Local::now();
        Self {
            current: false,
            year: now.year(),
            month: now.month() as i32,
            day: now.day() as i32,
            hour: now.hour() as i32,
            minute: now.minute() as i32,
            seconds: now.second() as f64 + now.nanosecond() as f64 / 1e9,
        }
    }

    /// Text form for the given interval range.
    pub fn format(&self, range: IntervalRange) -> String {
        if self.current {
            return CURRENT_TOKEN.to_string();
        }
        let mut date = Vec::new();
        let mut time = Vec::new();
        for field in range.text_fields() {
            let text = match field {
                DatetimeField::Year => self.year.to_string(),
                DatetimeField::Month => format!("{:02}", self.month),
                DatetimeField::Day => format!("{:02}", self.day),
                DatetimeField::Hour => format!("{:02}", self.hour),
                DatetimeField::Minute => format!("{:02}", self.minute),
                _ => seconds_text(self.seconds, range.has_fraction()),
            };
            if field.is_date() {
                date.push(text);
            } else {
                time.push(text);
            }
        }
        match (date.is_empty(), time.is_empty()) {
            (false, false) => format!("{} {}", date.join("-"), time.join(":")),
            (false, true) => date.join("-"),
            _ => time.join(":"),
        }
    }

    /// Parse the text form produced by [`DateTime::format`] for `range`.
    /// `CURRENT` is accepted in any letter case. Only the leading field may
    /// carry a `-` sign.
    pub fn parse(text: &str, range: IntervalRange) -> DbmiResult<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(CURRENT_TOKEN) {
            return Ok(Self::current());
        }
        let invalid = || DbmiError::InvalidDatetime(text.to_string());

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let tokens: Vec<&str> = body
            .split(|c: char| c == '-' || c == ':' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        let fields = range.text_fields();
        if tokens.len() != fields.len() {
            return Err(invalid());
        }

        let mut out = Self::default();
        for (k, (field, token)) in fields.into_iter().zip(tokens).enumerate() {
            let sign = if negative && k == 0 { -1 } else { 1 };
            if field == DatetimeField::Second {
                let seconds: f64 = token.parse().map_err(|_| invalid())?;
                if !range.has_fraction() && seconds.fract() != 0.0 {
                    return Err(invalid());
                }
                out.seconds = seconds * f64::from(sign);
                continue;
            }
            let n = sign * token.parse::<i32>().map_err(|_| invalid())?;
            match field {
                DatetimeField::Year => out.year = n,
                DatetimeField::Month => out.month = n,
                DatetimeField::Day => out.day = n,
                DatetimeField::Hour => out.hour = n,
                DatetimeField::Minute => out.minute = n,
                _ => {}
            }
        }
        Ok(out)
    }
}

/// Seconds as written on the wire: whole seconds, or six decimals when
/// the range has a fraction. Digits past the last one written are cut,
/// never rounded up into the next second.
fn seconds_text(seconds: f64, fraction: bool) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let magnitude = seconds.abs();
    let whole = magnitude.trunc();
    if !fraction {
        return format!("{}{:02}", sign, whole as i64);
    }
    let rest = format!("{:.12}", magnitude - whole);
    let digits = if rest.starts_with('1') {
        "999999"
    } else {
        rest.get(2..8).unwrap_or("000000")
    };
    format!("{}{:02}.{}", sign, whole as i64, digits)
}
