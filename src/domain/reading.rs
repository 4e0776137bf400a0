//! Schema-free extraction of the live reading from a telemetry payload.
//!
//! Sensor firmware revisions disagree on where the number lives: `{"speed": 42}`,
//! `{"sensor1": {"live": {"rpm": "42"}}}`, `[{"value": 42}]` and so on. Rather
//! than pinning a schema, [`extract_reading`] walks the tree looking for the
//! first usable number, trying well-known telemetry field names before
//! anything else.

use serde_json::{Map, Value};

/// Deepest node (root is depth 0) the extractor will look at.
pub const MAX_DEPTH: usize = 5;

/// Field names probed, in order, before any other field of an object.
pub const PRIORITY_KEYS: [&str; 17] = [
    "value",
    "speed",
    "rpm",
    "count",
    "val",
    "sacks",
    "sack",
    "power",
    "kwh",
    "kw",
    "width",
    "cm",
    "distance",
    "total",
    "current",
    "machine_speed",
    "production",
];

/// Find the live reading in `payload`, or `None` when nothing numeric is
/// reachable within [`MAX_DEPTH`].
pub fn extract_reading(payload: &Value) -> Option<f64> {
    find_reading(payload, 0)
}

fn find_reading(node: &Value, depth: usize) -> Option<f64> {
    if depth > MAX_DEPTH {
        return None;
    }

    match node {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_leading_number(text),
        Value::Object(fields) => find_in_object(fields, depth),
        Value::Array(items) => items
            .iter()
            .find_map(|item| find_reading(item, depth + 1)),
        Value::Null | Value::Bool(_) => None,
    }
}

fn find_in_object(fields: &Map<String, Value>, depth: usize) -> Option<f64> {
    let prioritized = PRIORITY_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|child| find_reading(child, depth + 1));
    if prioritized.is_some() {
        return prioritized;
    }

    fields
        .iter()
        .filter(|(key, _)| !PRIORITY_KEYS.contains(&key.as_str()))
        .find_map(|(_, child)| find_reading(child, depth + 1))
}

/// Parse the longest decimal prefix of `text`, ignoring leading whitespace.
///
/// `"37.5 rpm"` yields `37.5`, `"rpm 37.5"` yields nothing.
pub fn parse_leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let unsigned = &text[end..];
    if unsigned.starts_with("Infinity") {
        return text[..end + "Infinity".len()].parse().ok();
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse().ok()
}
