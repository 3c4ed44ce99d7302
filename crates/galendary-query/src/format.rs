//! Placeholder substitution and MySQL literal escaping.
//!
//! Templates use `?` for a value and `??` for an identifier. Every value is
//! rendered through [`escape_value`]; nothing from a request is ever spliced in
//! raw.

use std::fmt::Write;

use galendary_core::Value;

/// Render a value as a MySQL literal.
///
/// - `NULL` for null
/// - `true` / `false` for booleans
/// - decimal text for numbers (non-finite doubles become `NULL`)
/// - a single-quoted, backslash-escaped string for text
/// - `X'..'` hex for bytes
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Double(f) if f.is_finite() => f.to_string(),
        Value::Double(_) => "NULL".to_string(),
        Value::Text(s) => escape_string(s),
        Value::Bytes(b) => escape_bytes(b),
    }
}

/// Quote and escape a string literal.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out.push('\'');
    out
}

/// Quote an identifier with backticks.
///
/// Dots separate qualified parts (`groups.id` becomes `` `groups`.`id` ``);
/// embedded backticks are doubled.
pub fn escape_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for (idx, part) in name.split('.').enumerate() {
        if idx > 0 {
            out.push('.');
        }
        out.push('`');
        out.push_str(&part.replace('`', "``"));
        out.push('`');
    }
    out
}

fn identifier_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => escape_value(other),
    }
}

/// Substitute `values` into `template`, in order.
///
/// A lone `?` takes the next value as a literal and `??` takes it as an
/// identifier. Longer runs of `?` are copied through without consuming a value.
/// Placeholders left over after the values run out stay untouched, and extra
/// values are ignored.
pub fn format(template: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(template.len() + values.len() * 8);
    let mut next = values.iter();
    let mut rest = template;

    while let Some(start) = rest.find('?') {
        out.push_str(&rest[..start]);
        let run = rest[start..].bytes().take_while(|&b| b == b'?').count();
        let marks = &rest[start..start + run];
        rest = &rest[start + run..];

        match run {
            1 | 2 => match next.next() {
                Some(value) if run == 1 => out.push_str(&escape_value(value)),
                Some(value) => out.push_str(&escape_identifier(&identifier_text(value))),
                None => out.push_str(marks),
            },
            _ => out.push_str(marks),
        }
    }
    out.push_str(rest);
    out
}
