use std::borrow::Cow;

use serde_json::Value;

type Rewrite = for<'a> fn(&'a str) -> Cow<'a, str>;

/// Alternative readings of one raw string. Each is applied to the original
/// input, never to the output of a previous attempt.
const DECODE_ATTEMPTS: &[(&str, Rewrite)] = &[
    ("strict", as_is),
    ("unescape_quotes", unescape_quotes),
    ("collapse_backslashes", collapse_backslashes),
];

/// Parses `raw` as JSON, retrying with one level of escaping removed.
#[must_use]
pub fn decode(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }

    DECODE_ATTEMPTS
        .iter()
        .find_map(|(_, rewrite)| serde_json::from_str::<Value>(&rewrite(raw)).ok())
}

/// Accepts a field that may hold either serialized JSON or an already
/// structured value.
#[must_use]
pub fn decode_field(value: &Value) -> Option<Value> {
    match value {
        Value::String(raw) => decode(raw),
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

/// Cumulative rewrite for payloads that went through two rounds of string
/// escaping. Not a general JSON-string unescaper.
#[must_use]
pub fn normalize_escapes(raw: &str) -> String {
    raw.replace("\\\"", "\"")
        .replace("\\\\", "\\")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}

/// Multi-escape normalization followed by the resilient decoder.
#[must_use]
pub fn decode_escaped(raw: &str) -> Option<Value> {
    decode(&normalize_escapes(raw)).or_else(|| decode(raw))
}

#[must_use]
pub fn relax(line: &str) -> Cow<'_, str> {
    unescape_quotes(line)
}

fn as_is(raw: &str) -> Cow<'_, str> {
    Cow::Borrowed(raw)
}

fn unescape_quotes(raw: &str) -> Cow<'_, str> {
    if raw.contains("\\\"") {
        Cow::Owned(raw.replace("\\\"", "\""))
    } else {
        Cow::Borrowed(raw)
    }
}

fn collapse_backslashes(raw: &str) -> Cow<'_, str> {
    if raw.contains("\\\\") {
        Cow::Owned(raw.replace("\\\\", "\\"))
    } else {
        Cow::Borrowed(raw)
    }
}
