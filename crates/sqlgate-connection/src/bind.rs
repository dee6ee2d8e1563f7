//! Substitution of `?` placeholders with driver-escaped literals

use sqlgate_core::{Driver, Error, Result, TemporalValue, Value};
use std::iter::Peekable;
use std::str::Chars;

/// Render `value` as an SQL literal using the driver's quoting rules
pub fn value_to_literal(driver: &dyn Driver, value: &Value) -> Result<String> {
    let literal = match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => driver.escape_bool(*b),
        Value::Int64(i) => i.to_string(),
        Value::UInt64(u) => u.to_string(),
        Value::Float32(f) if f.is_finite() => f.to_string(),
        Value::Float64(f) if f.is_finite() => f.to_string(),
        Value::Float32(_) | Value::Float64(_) => {
            return Err(Error::InvalidValue(format!("{} cannot be written as SQL", value)));
        }
        Value::Decimal(d) if is_plain_decimal(d) => d.clone(),
        Value::Decimal(d) => driver.escape_text(d),
        Value::String(s) => driver.escape_text(s),
        Value::Bytes(b) => driver.escape_binary(b),
        Value::Date(d) => driver.escape_date(TemporalValue::Date(*d))?,
        Value::DateTime(dt) => driver.escape_datetime(TemporalValue::DateTime(*dt))?,
        Value::Time(t) => driver.escape_text(&t.format("%H:%M:%S%.f").to_string()),
    };
    Ok(literal)
}

/// `[-+]?digits[.digits]`, the only decimal text written unquoted
fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}

/// Copy a comment body through to `out`, up to and including its terminator
fn copy_comment(out: &mut String, chars: &mut Peekable<Chars<'_>>, block: bool) {
    let mut prev = '\0';
    for ch in chars.by_ref() {
        out.push(ch);
        if (block && prev == '*' && ch == '/') || (!block && ch == '\n') {
            return;
        }
        prev = ch;
    }
}

/// Replace each `?` outside quoted text and comments with the next parameter.
///
/// The number of placeholders must match the number of parameters.
pub fn bind_params(driver: &dyn Driver, sql: &str, params: &[Value]) -> Result<String> {
    if params.is_empty() {
        return Ok(sql.to_string());
    }

    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut remaining = params.iter();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                out.push(ch);
                if ch == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '#' => {
                    out.push(ch);
                    copy_comment(&mut out, &mut chars, false);
                }
                '-' if chars.peek() == Some(&'-') => {
                    out.push(ch);
                    if let Some(dash) = chars.next() {
                        out.push(dash);
                    }
                    if chars.peek().map_or(true, |next| next.is_whitespace() || next.is_control()) {
                        copy_comment(&mut out, &mut chars, false);
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    out.push(ch);
                    if let Some(star) = chars.next() {
                        out.push(star);
                    }
                    copy_comment(&mut out, &mut chars, true);
                }
                '?' => {
                    let value = remaining.next().ok_or_else(|| {
                        Error::InvalidValue(format!(
                            "Query has more placeholders than the {} parameters given",
                            params.len()
                        ))
                    })?;
                    out.push_str(&value_to_literal(driver, value)?);
                }
                _ => out.push(ch),
            },
        }
    }

    let unused = remaining.count();
    if unused > 0 {
        return Err(Error::InvalidValue(format!(
            "{} parameter(s) left without a placeholder",
            unused
        )));
    }
    Ok(out)
}
