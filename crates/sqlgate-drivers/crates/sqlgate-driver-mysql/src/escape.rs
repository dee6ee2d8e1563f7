//! Literal and identifier quoting for MySQL

use sqlgate_core::{Error, Result, SqlType, TemporalValue};
use std::fmt::Write as _;

/// Largest row count MySQL accepts, used as LIMIT when only an offset is given
pub const MAX_LIMIT: &str = "18446744073709551615";

const DATE_FORMAT: &str = "'%Y-%m-%d'";
const DATETIME_FORMAT: &str = "'%Y-%m-%d %H:%M:%S%.6f'";

/// The client library's escape rules, without surrounding quotes
pub fn real_escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

pub fn escape_binary(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => format!("_binary'{}'", real_escape_string(text)),
        Err(_) => {
            let mut hex = String::with_capacity(value.len() * 2);
            for byte in value {
                let _ = write!(hex, "{:02X}", byte);
            }
            format!("_binary X'{}'", hex)
        }
    }
}

pub fn escape_date(value: &TemporalValue) -> Result<String> {
    Ok(value.to_naive_datetime()?.format(DATE_FORMAT).to_string())
}

pub fn escape_datetime(value: &TemporalValue) -> Result<String> {
    Ok(value.to_naive_datetime()?.format(DATETIME_FORMAT).to_string())
}

/// Quote `value` for a LIKE pattern with `%` wildcards on the requested side(s)
pub fn escape_like(value: &str, pos: i32) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\\\\\"),
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\'' => escaped.push_str("\\'"),
            '%' => escaped.push_str("\\%"),
            '_' => escaped.push_str("\\_"),
            _ => escaped.push(ch),
        }
    }
    let lead = if pos <= 0 { "'%" } else { "'" };
    let trail = if pos >= 0 { "%'" } else { "'" };
    format!("{}{}{}", lead, escaped, trail)
}

pub fn apply_limit(sql: &mut String, limit: Option<i64>, offset: Option<i64>) -> Result<()> {
    if limit.is_some_and(|l| l < 0) || offset.is_some_and(|o| o < 0) {
        return Err(Error::NotSupported("Negative offset or limit.".to_string()));
    }
    let offset = offset.unwrap_or(0);
    if limit.is_some() || offset > 0 {
        sql.push_str(" LIMIT ");
        match limit {
            Some(limit) => sql.push_str(&limit.to_string()),
            None => sql.push_str(MAX_LIMIT),
        }
        if offset > 0 {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }
    }
    Ok(())
}

/// Name of a protocol type code, with the small integer widths folded to `INT`
pub fn native_type_name(type_code: u8) -> String {
    let name = match type_code {
        0 => "DECIMAL",
        1..=3 => "INT",
        4 => "FLOAT",
        5 => "DOUBLE",
        6 => "NULL",
        7 => "TIMESTAMP",
        8 => "LONGLONG",
        9 => "INT24",
        10 => "DATE",
        11 => "TIME",
        12 => "DATETIME",
        13 => "YEAR",
        14 => "NEWDATE",
        15 => "VARCHAR",
        16 => "BIT",
        245 => "JSON",
        246 => "NEWDECIMAL",
        247 => "ENUM",
        248 => "SET",
        249 => "TINY_BLOB",
        250 => "MEDIUM_BLOB",
        251 => "LONG_BLOB",
        252 => "BLOB",
        253 => "VAR_STRING",
        254 => "STRING",
        255 => "GEOMETRY",
        other => return other.to_string(),
    };
    name.to_string()
}

/// TIME columns hold durations, not wall-clock times
pub fn semantic_type(type_code: u8) -> Option<SqlType> {
    match type_code {
        11 => Some(SqlType::TimeInterval),
        _ => None,
    }
}
