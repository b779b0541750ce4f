//! Small value helpers shared by widgets and the event pipeline.

use serde_json::{Map, Value};

/// Deep equality where numbers compare by numeric value (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// JavaScript-style truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value as attribute/text content. `null` becomes `None`.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

/// Split a whitespace-separated list into its distinct words.
pub fn string_to_set(text: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        if !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

/// Flatten nested objects one level deep: `{a: {b: 1}}` becomes `{a_b: 1}`.
pub fn flatten(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                for (sub, v) in inner {
                    out.insert(format!("{key}_{sub}"), v.clone());
                }
            }
            v => {
                out.insert(key.clone(), v.clone());
            }
        }
    }
    out
}

/// Substitute `<prefix>{name}` references using `lookup`. Unknown names expand
/// to nothing. The usual prefix is `$`; style sheets use `#` so that `${...}`
/// can appear literally.
pub fn resolve_el(text: &str, prefix: char, lookup: impl Fn(&str) -> Option<String>) -> String {
    let open = format!("{prefix}{{");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        let after = &rest[start + open.len()..];
        match after.find('}') {
            Some(end) => {
                let name = after[..end].trim();
                out.push_str(&lookup(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
