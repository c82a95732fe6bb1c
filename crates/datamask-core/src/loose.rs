//! Loose (type-juggling) value semantics used by pattern rules.
//!
//! Rule literals are always text, while record values may be any JSON scalar.
//! Comparisons follow the permissive rules existing configurations rely on:
//! numeric-looking strings compare numerically, booleans compare by
//! truthiness, `null` equals the empty string, and numeric coercion of
//! non-numeric text yields zero instead of failing.

use serde_json::{Number, Value};

/// Parse a fully numeric string (surrounding whitespace allowed).
///
/// Returns `None` for text that is not a plain decimal/exponent literal,
/// including `inf`, `NaN` and hexadecimal forms.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim_matches(is_numeric_whitespace);
    let len = numeric_prefix_len(trimmed);
    if len == 0 || len != trimmed.len() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Coerce a value to a number, mapping anything non-numeric to zero.
///
/// Strings use their leading numeric portion (`"12abc"` is `12`).
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => leading_number(text),
        Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Leading numeric portion of a string, or zero.
pub fn leading_number(text: &str) -> f64 {
    let trimmed = text.trim_start_matches(is_numeric_whitespace);
    let len = numeric_prefix_len(trimmed);
    if len == 0 {
        return 0.0;
    }
    trimmed[..len].parse::<f64>().unwrap_or(0.0)
}

/// String form of a scalar value as seen by text rules.
///
/// Returns `None` for arrays and objects, which never match text rules.
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Number(number) => Some(number_to_text(number)),
        Value::String(text) => Some(text.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Loose equality between a record value and a rule literal.
pub fn loose_eq(value: &Value, literal: &str) -> bool {
    match value {
        Value::Null => literal.is_empty(),
        Value::Bool(flag) => *flag == truthy(literal),
        Value::Number(number) => match parse_numeric(literal) {
            Some(rhs) => number.as_f64() == Some(rhs),
            None => number_to_text(number) == literal,
        },
        Value::String(text) => match (parse_numeric(text), parse_numeric(literal)) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => text == literal,
        },
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Truthiness of a literal: empty and `"0"` are false.
pub fn truthy(literal: &str) -> bool {
    !(literal.is_empty() || literal == "0")
}

fn number_to_text(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", value as i64)
        }
        Some(value) => format!("{value}"),
        None => number.to_string(),
    }
}

fn is_numeric_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Length of the longest numeric literal at the start of `text`.
fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut idx = 0;
    if idx < bytes.len() && (bytes[idx] == b'+' || bytes[idx] == b'-') {
        idx += 1;
    }

    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;

    if idx < bytes.len() && bytes[idx] == b'.' {
        let frac_start = idx + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if digits > 0 || end > frac_start {
            digits += end - frac_start;
            idx = end;
        }
    }

    if digits == 0 {
        return 0;
    }

    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut end = idx + 1;
        if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        let exp_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > exp_start {
            idx = end;
        }
    }

    idx
}
