use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::engine::decode::{decode, decode_escaped, decode_field, relax};
use crate::engine::fields::{self, AD_ID, BID_ID};
use crate::engine::locate::{find, object_at, scalar_text, text_at};
use crate::engine::{LineOutcome, SeenIdentifiers, SkipReason, WindowStatus};
use crate::models::record::is_resolved;
use crate::models::ExtractedRecord;
use crate::utils::time::{TimeWindow, stitch_window, utc_date_of};

const SOURCE_TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "cev_timestamp", "eventTimestamp"];

#[derive(Debug, Default)]
struct Identifiers {
    bid_id: Option<String>,
    ad_id: Option<String>,
}

impl Identifiers {
    fn is_complete(&self) -> bool {
        self.bid_id.is_some() && self.ad_id.is_some()
    }

    fn fill_from_attributes(&mut self, attributes: &Value) {
        if self.bid_id.is_none() {
            self.bid_id = text_at(attributes, BID_ID);
        }
        if self.ad_id.is_none() {
            self.ad_id = text_at(attributes, AD_ID);
        }
    }

    fn override_from_attributes(&mut self, attributes: &Value) {
        if let Some(bid_id) = text_at(attributes, BID_ID) {
            self.bid_id = Some(bid_id);
        }
        if let Some(ad_id) = text_at(attributes, AD_ID) {
            self.ad_id = Some(ad_id);
        }
    }
}

pub fn classify_line(line: &str, seen: &mut SeenIdentifiers) -> LineOutcome {
    let Some(json_start) = line.find('{') else {
        return LineOutcome::Skipped(SkipReason::NotCandidate);
    };
    // An undecodable line still goes through the text strategies below.
    let decoded = decode(&line[json_start..]);
    let decode_failed = decoded.is_none();
    let working = decoded.map_or(Value::Null, unwrap_event);

    let ids = resolve_identifiers(line, &working);
    let bid_id = match ids.bid_id {
        Some(bid_id) if is_resolved(&bid_id) => bid_id,
        _ if decode_failed => return LineOutcome::Skipped(SkipReason::DecodeFailure),
        _ => return LineOutcome::Skipped(SkipReason::FieldNotFound),
    };
    if !seen.claim(&bid_id) {
        return LineOutcome::Skipped(SkipReason::DuplicateIdentifier);
    }

    let mut record = ExtractedRecord::placeholder();
    record.bid_id = bid_id;
    if let Some(ad_id) = ids.ad_id {
        record.ad_id = ad_id;
    }

    let (window, status) = derive_window(line, &working);
    if let Some(window) = window {
        record.set_window(window);
    }

    let device = device_attributes(&working);
    if let Some(pfm) = device.and_then(|attributes| {
        text_at(attributes, "cor").or_else(|| text_at(attributes, "pfm"))
    }) {
        record.pfm = pfm;
    }
    if let Some(local_time) = device
        .and_then(|attributes| text_at(attributes, "deviceLocalTime"))
        .or_else(|| text_at(&working, "deviceLocalTime"))
    {
        record.time_zone = local_time.replace('\\', "");
    }

    LineOutcome::Record {
        record,
        window: status,
    }
}

/// A string `event` field wraps the real payload one level down.
fn unwrap_event(parsed: Value) -> Value {
    parsed
        .get("event")
        .and_then(Value::as_str)
        .and_then(decode)
        .unwrap_or(parsed)
}

fn resolve_identifiers(line: &str, working: &Value) -> Identifiers {
    let mut ids = Identifiers::default();

    if let Some(metadata) = working.get("reportingMetadata").and_then(decode_field)
        && let Some(attributes) = object_at(&metadata, "bidAttributes")
    {
        ids.fill_from_attributes(attributes);
    }
    if let Some(attributes) = object_at(working, "bidAttributes") {
        ids.override_from_attributes(attributes);
    }

    let relaxed = relax(line);
    for (key, slot) in [(BID_ID, &mut ids.bid_id), (AD_ID, &mut ids.ad_id)] {
        if slot.is_none() {
            *slot = quoted_field(&relaxed, key).or_else(|| fields::extract(line, key));
        }
    }

    if !ids.is_complete()
        && let Some(raw) = working.get("reportingMetadata")
        && let Some(metadata) = decode_reporting_metadata(raw)
    {
        if let Some(attributes) = object_at(&metadata, "bidAttributes") {
            ids.fill_from_attributes(attributes);
        }
        if ids.bid_id.is_none() {
            ids.bid_id = find(&metadata, BID_ID).and_then(scalar_text);
        }
        if ids.ad_id.is_none() {
            ids.ad_id = find(&metadata, AD_ID).and_then(scalar_text);
        }
    }

    ids
}

fn decode_reporting_metadata(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(text) => decode_escaped(text),
        Value::Object(_) => Some(raw.clone()),
        _ => None,
    }
}

fn quoted_field(relaxed: &str, key: &str) -> Option<String> {
    let regex = match key {
        BID_ID => bid_id_field_regex(),
        AD_ID => ad_id_field_regex(),
        _ => return None,
    };
    regex
        .captures(relaxed)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

/// Date from the embedded source timestamp, wall-clock from the line prefix.
fn derive_window(line: &str, working: &Value) -> (Option<TimeWindow>, WindowStatus) {
    let (Some(prefix), Some(source)) = (line_prefix_regex().captures(line), source_timestamp(working))
    else {
        return (None, WindowStatus::Missing);
    };

    match utc_date_of(&source).and_then(|date| {
        let (hour, minute, second) = clock_from_prefix(&prefix);
        stitch_window(date, hour, minute, second)
    }) {
        Ok(window) => (Some(window), WindowStatus::Derived),
        Err(_) => (None, WindowStatus::Unparseable),
    }
}

fn clock_from_prefix(prefix: &Captures<'_>) -> (u8, u8, u8) {
    let part = |index: usize| prefix[index].parse::<u8>().unwrap_or(u8::MAX);
    (part(3), part(4), part(5))
}

fn source_timestamp(working: &Value) -> Option<String> {
    first_timestamp(working).or_else(|| object_at(working, "event").and_then(first_timestamp))
}

// First present (non-null) field wins, even when its value turns out empty.
fn first_timestamp(value: &Value) -> Option<String> {
    SOURCE_TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| value.get(*field).filter(|candidate| !candidate.is_null()))
        .and_then(scalar_text)
}

fn device_attributes(working: &Value) -> Option<&Value> {
    object_at(working, "deviceAttributes").or_else(|| {
        object_at(working, "event").and_then(|event| object_at(event, "deviceAttributes"))
    })
}

fn line_prefix_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^(?:\d{4}-)?(\d{2})-(\d{2}) (\d{2}):(\d{2}):(\d{2})")
            .expect("line prefix regex should compile")
    })
}

fn bid_id_field_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)"bidId"\s*:\s*"([^"]+)""#).expect("bidId field regex should compile")
    })
}

fn ad_id_field_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)"adId"\s*:\s*"([^"]+)""#).expect("adId field regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::classify_line;
    use crate::engine::{LineOutcome, SeenIdentifiers, SkipReason, WindowStatus};
    use crate::models::{ExtractedRecord, PLACEHOLDER};

    fn classify(line: &str) -> LineOutcome {
        classify_line(line, &mut SeenIdentifiers::new())
    }

    fn expect_record(line: &str) -> (ExtractedRecord, WindowStatus) {
        match classify(line) {
            LineOutcome::Record { record, window } => (record, window),
            LineOutcome::Skipped(reason) => panic!("expected a record, line skipped: {reason:?}"),
        }
    }

    #[test]
    fn lines_without_json_are_not_candidates() {
        assert_eq!(
            classify("01-15 10:30:00 I Player: buffering"),
            LineOutcome::Skipped(SkipReason::NotCandidate)
        );
    }

    #[test]
    fn undecodable_json_is_skipped() {
        assert_eq!(
            classify("01-15 10:30:00 {broken"),
            LineOutcome::Skipped(SkipReason::DecodeFailure)
        );
    }

    #[test]
    fn undecodable_line_falls_back_to_text_strategies() {
        let line = r#"01-15 10:30:00 I Ads: adData=\"{\\\"bidAttributes\\\":{\\\"bidId\\\":\\\"B2\\\"}}\""#;
        let (record, window) = expect_record(line);
        assert_eq!(record.bid_id, "B2");
        assert_eq!(record.ad_id, PLACEHOLDER);
        assert_eq!(window, WindowStatus::Missing);
        assert_eq!(record.pfm, PLACEHOLDER);

        let once_escaped = r#"adData="{\"bidAttributes\":{\"bidId\":\"B2\"}}""#;
        assert_eq!(expect_record(once_escaped).0.bid_id, "B2");
    }

    #[test]
    fn missing_bid_id_is_skipped() {
        assert_eq!(
            classify(r#"{"bidAttributes":{"adId":"A1"}}"#),
            LineOutcome::Skipped(SkipReason::FieldNotFound)
        );
    }

    #[test]
    fn top_level_attributes_override_reporting_metadata() {
        let line = r#"{"reportingMetadata":"{\"bidAttributes\":{\"bidId\":\"RM-B\",\"adId\":\"RM-A\"}}","bidAttributes":{"bidId":"TOP-B"}}"#;
        let (record, _) = expect_record(line);
        assert_eq!(record.bid_id, "TOP-B");
        assert_eq!(record.ad_id, "RM-A");
    }

    #[test]
    fn string_event_envelope_is_unwrapped() {
        let line = r#"01-15 10:30:00 {"event":"{\"bidAttributes\":{\"bidId\":\"EV-B\"},\"deviceAttributes\":{\"cor\":\"AFTKA\",\"pfm\":\"ignored\"}}"}"#;
        let (record, window) = expect_record(line);
        assert_eq!(record.bid_id, "EV-B");
        assert_eq!(record.pfm, "AFTKA");
        assert_eq!(record.ad_id, PLACEHOLDER);
        assert_eq!(window, WindowStatus::Missing);
        assert_eq!(record.start_time, "");
        assert_eq!(record.end_time, "");
    }

    #[test]
    fn object_event_supplies_timestamp_and_device() {
        let line = r#"03-02 23:59:30.120 {"bidAttributes":{"bidId":"B-OBJ"},"event":{"eventTimestamp":1709337600000,"deviceAttributes":{"pfm":"P-EV","deviceLocalTime":"2024-03-02T15:59:30-08:00"}}}"#;
        let (record, window) = expect_record(line);
        assert_eq!(window, WindowStatus::Derived);
        assert_eq!(record.start_time, "2024-03-02T23:59:30");
        assert_eq!(record.end_time, "2024-03-03T00:09:30");
        assert_eq!(record.pfm, "P-EV");
        assert_eq!(record.time_zone, "2024-03-02T15:59:30-08:00");
    }

    #[test]
    fn unparseable_source_timestamp_leaves_window_empty() {
        let line = r#"01-15 10:30:00 {"timestamp":"not a date","bidAttributes":{"bidId":"B-T"}}"#;
        let (record, window) = expect_record(line);
        assert_eq!(window, WindowStatus::Unparseable);
        assert_eq!(record.start_time, "");
        assert_eq!(record.end_time, "");
    }

    #[test]
    fn impossible_prefix_clock_leaves_window_empty() {
        let line = r#"01-15 27:30:00 {"timestamp":"2024-01-15T08:00:00Z","bidAttributes":{"bidId":"B-C"}}"#;
        let (record, window) = expect_record(line);
        assert_eq!(window, WindowStatus::Unparseable);
        assert!(record.start_time.is_empty() && record.end_time.is_empty());
    }

    #[test]
    fn time_zone_backslashes_are_stripped() {
        let line = r#"{"bidAttributes":{"bidId":"B-Z"},"deviceLocalTime":"2024-01-15T10:30:00\\+05:30"}"#;
        let (record, _) = expect_record(line);
        assert_eq!(record.time_zone, "2024-01-15T10:30:00+05:30");
    }

    #[test]
    fn numeric_identifiers_are_stringified() {
        let line = r#"{"reportingMetadata":"{\\\"bidAttributes\\\":{\\\"bidId\\\":7001,\\\"adId\\\":7002}}"}"#;
        let (record, _) = expect_record(line);
        assert_eq!(record.bid_id, "7001");
        assert_eq!(record.ad_id, "7002");
    }

    #[test]
    fn triple_escaped_reporting_metadata_is_decoded_explicitly() {
        let line = r#"{"reportingMetadata":"{\\\\\\\"bidAttributes\\\\\\\":{\\\\\\\"bidId\\\\\\\":7001,\\\\\\\"adId\\\\\\\":7002}}"}"#;
        let (record, _) = expect_record(line);
        assert_eq!(record.bid_id, "7001");
        assert_eq!(record.ad_id, "7002");
    }
}
