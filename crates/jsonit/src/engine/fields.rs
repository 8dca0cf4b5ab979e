//! Field extraction cascade for identifiers buried in escaped ad payloads.
//!
//! Strategies run in order and the first one that yields a value wins:
//! 1. a payload sub-document (`adData` / `reportingMetadata`, directly or under
//!    `event`) pulled from the line, normalized, parsed and searched;
//! 2. a key regex over the raw payload when it does not parse;
//! 3. the same key regex over the relaxed line, then over the raw line.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::engine::decode::{decode, normalize_escapes, relax};
use crate::engine::locate::{find, scalar_text};

pub const BID_ID: &str = "bidId";
pub const AD_ID: &str = "adId";

const PAYLOAD_FIELDS: [&str; 2] = ["adData", "reportingMetadata"];

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Text(String),
    Structured(Value),
}

/// Finds `key` anywhere the known log shapes can hide it.
#[must_use]
pub fn extract(line: &str, key: &str) -> Option<String> {
    if let Some(found) = locate_payload(line).and_then(|payload| resolve_in_payload(&payload, key)) {
        return Some(found);
    }

    scan_key(&relax(line), key).or_else(|| scan_key(line, key))
}

/// Matches `"key":"value"` with any run of escaping backslashes around the
/// quotes, so one pattern covers plain, once- and twice-escaped JSON text.
#[must_use]
pub fn scan_key(text: &str, key: &str) -> Option<String> {
    let regex = key_regex(key)?;
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

fn resolve_in_payload(payload: &Payload, key: &str) -> Option<String> {
    match payload {
        Payload::Structured(value) => find(value, key).and_then(scalar_text),
        Payload::Text(raw) => match serde_json::from_str::<Value>(&normalize_escapes(raw)) {
            Ok(value) => find(&value, key).and_then(scalar_text),
            Err(_) => scan_key(raw, key),
        },
    }
}

fn locate_payload(line: &str) -> Option<Payload> {
    let trimmed = line.trim();
    if trimmed.starts_with('{')
        && let Ok(Value::Object(root)) = serde_json::from_str::<Value>(trimmed)
    {
        return payload_in_object(&root).or_else(|| payload_in_event(&root));
    }

    [ad_data_regex(), reporting_metadata_regex()]
        .into_iter()
        .find_map(|regex| regex.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|payload| Payload::Text(payload.as_str().to_string()))
}

fn payload_in_object(object: &Map<String, Value>) -> Option<Payload> {
    PAYLOAD_FIELDS
        .iter()
        .find_map(|field| match object.get(*field) {
            Some(Value::String(raw)) if !raw.is_empty() => Some(Payload::Text(raw.clone())),
            Some(value @ Value::Object(_)) => Some(Payload::Structured(value.clone())),
            _ => None,
        })
}

fn payload_in_event(root: &Map<String, Value>) -> Option<Payload> {
    match root.get("event")? {
        Value::Object(event) => payload_in_object(event),
        Value::String(raw) => match decode(raw)? {
            Value::Object(event) => payload_in_object(&event),
            _ => None,
        },
        _ => None,
    }
}

fn key_regex(key: &str) -> Option<Cow<'static, Regex>> {
    static BID_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    static AD_ID_REGEX: OnceLock<Regex> = OnceLock::new();

    let cached = match key {
        BID_ID => &BID_ID_REGEX,
        AD_ID => &AD_ID_REGEX,
        _ => return build_key_regex(key).map(Cow::Owned),
    };
    if let Some(regex) = cached.get() {
        return Some(Cow::Borrowed(regex));
    }
    let regex = build_key_regex(key)?;
    Some(Cow::Borrowed(cached.get_or_init(|| regex)))
}

fn build_key_regex(key: &str) -> Option<Regex> {
    Regex::new(&format!(
        r#"(?i)\\*"{}\\*"\s*:\s*\\*"([^"\\]+)\\*""#,
        regex::escape(key)
    ))
    .ok()
}

fn ad_data_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"adData=\\*"(\{.*?\})\\*""#).expect("adData payload regex should compile")
    })
}

fn reporting_metadata_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"reportingMetadata\\*"\s*:\s*\\*"(\{.*?\})\\*""#)
            .expect("reportingMetadata payload regex should compile")
    })
}
