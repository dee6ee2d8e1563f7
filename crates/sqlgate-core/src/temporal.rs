//! Coercion of loosely typed inputs into date/time values for escaping

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::{Error, Result};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Input accepted by date and datetime escaping.
///
/// Temporal variants are used as they are; text and unix timestamps are
/// coerced and may fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TemporalValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Wall-clock time in its own offset
    Zoned(DateTime<FixedOffset>),
    Text(String),
    /// Seconds since the unix epoch, rendered in the process-local zone
    Timestamp(i64),
}

impl TemporalValue {
    /// Resolve to a wall-clock datetime
    pub fn to_naive_datetime(&self) -> Result<NaiveDateTime> {
        match self {
            TemporalValue::Date(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
            TemporalValue::DateTime(dt) => Ok(*dt),
            TemporalValue::Zoned(dt) => Ok(dt.naive_local()),
            TemporalValue::Timestamp(secs) => timestamp_to_local(*secs),
            TemporalValue::Text(text) => parse_text(text.trim()),
        }
    }
}

fn timestamp_to_local(secs: i64) -> Result<NaiveDateTime> {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.naive_local())
        .ok_or_else(|| Error::InvalidValue(format!("Timestamp {} is out of range", secs)))
}

fn parse_text(text: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    if let Ok(secs) = text.parse::<i64>() {
        return timestamp_to_local(secs);
    }
    Err(Error::InvalidValue(format!(
        "Cannot convert '{}' to a date/time value",
        text
    )))
}

impl From<NaiveDate> for TemporalValue {
    fn from(value: NaiveDate) -> Self {
        TemporalValue::Date(value)
    }
}

impl From<NaiveDateTime> for TemporalValue {
    fn from(value: NaiveDateTime) -> Self {
        TemporalValue::DateTime(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TemporalValue {
    fn from(value: DateTime<Tz>) -> Self {
        TemporalValue::Zoned(value.fixed_offset())
    }
}

impl From<&str> for TemporalValue {
    fn from(value: &str) -> Self {
        TemporalValue::Text(value.to_string())
    }
}

impl From<String> for TemporalValue {
    fn from(value: String) -> Self {
        TemporalValue::Text(value)
    }
}

impl From<i64> for TemporalValue {
    fn from(value: i64) -> Self {
        TemporalValue::Timestamp(value)
    }
}
