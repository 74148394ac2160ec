use crate::value::{CellValue, RawValue, format_number};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Declared semantic type of a column.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Time,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid column type '{0}'")]
pub struct UnknownDataType(pub String);

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::String,
        DataType::Number,
        DataType::Boolean,
        DataType::Date,
        DataType::Datetime,
        DataType::Time,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Time => "time",
        }
    }

    /// Parses a type name, accepting the usual aliases.
    pub fn parse(name: &str) -> Result<Self, UnknownDataType> {
        match name.trim().to_ascii_uppercase().as_str() {
            "STRING" | "TEXT" | "VARCHAR" => Ok(DataType::String),
            "NUMBER" | "INT" | "INTEGER" | "FLOAT" | "DOUBLE" | "NUMERIC" => Ok(DataType::Number),
            "BOOL" | "BOOLEAN" => Ok(DataType::Boolean),
            "DATE" => Ok(DataType::Date),
            "DATETIME" | "TIMESTAMP" => Ok(DataType::Datetime),
            "TIME" => Ok(DataType::Time),
            _ => Err(UnknownDataType(name.to_string())),
        }
    }

    /// Value a missing cell takes when coerced to this type.
    pub fn default_value(&self) -> CellValue {
        match self {
            DataType::Number | DataType::Boolean => CellValue::Number(0.0),
            DataType::String => CellValue::Text(String::new()),
            DataType::Date | DataType::Datetime | DataType::Time => CellValue::Null,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::parse(s)
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        DataType::parse(&name).map_err(serde::de::Error::custom)
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";
const LOCALE_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT+0000";

const DATETIME_PATTERNS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_PATTERNS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Converts a raw value to the representation `target` stores.
///
/// Never fails: unparseable numbers come back as `NaN` and unparseable
/// temporal values as `Null`. Callers treat both as "conversion failed".
pub fn coerce(value: &RawValue, target: DataType) -> CellValue {
    match value {
        RawValue::Null => target.default_value(),
        RawValue::List(items) => coerce_list(items, target),
        RawValue::Object => match target {
            DataType::Boolean => CellValue::Number(1.0),
            DataType::Number => CellValue::Number(f64::NAN),
            DataType::String => CellValue::text("[object Object]"),
            _ => CellValue::Null,
        },
        RawValue::Date(instant) => match target {
            DataType::Number => CellValue::Number(instant.timestamp_millis() as f64),
            DataType::String => CellValue::Text(instant.format(LOCALE_FORMAT).to_string()),
            DataType::Boolean => CellValue::Number(1.0),
            _ => CellValue::Null,
        },
        RawValue::Bool(_) | RawValue::Number(_) | RawValue::Text(_) => coerce_scalar(value, target),
    }
}

/// Re-coerces a stored cell. Used by every column type change.
pub fn coerce_cell(value: &CellValue, target: DataType) -> CellValue {
    coerce(&RawValue::from(value), target)
}

fn coerce_list(items: &[RawValue], target: DataType) -> CellValue {
    match target {
        DataType::Boolean => CellValue::Number(1.0),
        DataType::Number => match items {
            [] => CellValue::Number(0.0),
            [only] => coerce(only, DataType::Number),
            _ => CellValue::Number(f64::NAN),
        },
        DataType::String => {
            let joined = items
                .iter()
                .map(|item| coerce(item, DataType::String).display())
                .collect::<Vec<_>>()
                .join(",");
            CellValue::Text(joined)
        }
        _ => CellValue::Null,
    }
}

fn coerce_scalar(value: &RawValue, target: DataType) -> CellValue {
    match target {
        DataType::Number => CellValue::Number(match value {
            RawValue::Number(n) => *n,
            RawValue::Bool(b) => bool_number(*b),
            RawValue::Text(s) => parse_number(s)
                .or_else(|| parse_instant(s).map(|dt| dt.and_utc().timestamp_millis() as f64))
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        }),
        DataType::Boolean => CellValue::Number(match value {
            RawValue::Bool(b) => bool_number(*b),
            RawValue::Number(n) => bool_number(*n != 0.0 && !n.is_nan()),
            RawValue::Text(s) => match s.as_str() {
                "" | "false" => 0.0,
                _ => 1.0,
            },
            _ => 0.0,
        }),
        DataType::String => CellValue::Text(match value {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Text(s) => s.clone(),
            _ => String::new(),
        }),
        DataType::Date => scalar_instant(value)
            .map(|dt| CellValue::Text(dt.format(DATE_FORMAT).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::Datetime => scalar_instant(value)
            .map(|dt| CellValue::Text(dt.format(DATETIME_FORMAT).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::Time => {
            let clock = match value {
                RawValue::Text(s) => parse_clock(s).or_else(|| parse_instant(s).map(|dt| dt.time())),
                _ => scalar_instant(value).map(|dt| dt.time()),
            };
            clock
                .map(|t| CellValue::Text(t.format(TIME_FORMAT).to_string()))
                .unwrap_or(CellValue::Null)
        }
    }
}

#[inline]
fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Numbers are epoch milliseconds, strings go through the calendar parser,
/// booleans are not dates. Instants outside years 0000-9999 have no
/// four-digit rendering and count as unparseable.
fn scalar_instant(value: &RawValue) -> Option<NaiveDateTime> {
    let instant = match value {
        RawValue::Number(n) if n.is_finite() => {
            DateTime::<Utc>::from_timestamp_millis(n.trunc() as i64).map(|dt| dt.naive_utc())
        }
        RawValue::Text(s) => parse_instant(s),
        _ => None,
    };
    instant.filter(|dt| (0..=9999).contains(&dt.year()))
}

/// Parses a decimal numeric literal. Surrounding whitespace is ignored and
/// an empty string reads as zero.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    match t {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    // f64::from_str also admits "inf" and "nan" spellings
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Calendar parse of a date or date-time string. Naive values are UTC.
pub(crate) fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(t, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Some(dt.naive_utc());
    }
    for pattern in DATETIME_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, pattern) {
            return Some(dt);
        }
    }
    for pattern in DATE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(t, pattern) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Time-of-day only (`HH:MM` or `HH:MM:SS[.fff]`).
pub(crate) fn parse_clock(s: &str) -> Option<NaiveTime> {
    let t = s.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .ok()
}
