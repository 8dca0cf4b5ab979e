use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::engine::fields::{self, AD_ID, BID_ID};
use crate::engine::locate::{object_at, text_at};
use crate::engine::{LineOutcome, SeenIdentifiers, SkipReason, WindowStatus};
use crate::models::{ExtractedRecord, PLACEHOLDER};
use crate::utils::time::{TimeWindow, parse_window_timestamp};

const AD_DATA_KEY: &str = "adData";

pub fn classify_line(line: &str, seen: &mut SeenIdentifiers) -> LineOutcome {
    let Some(raw_start) = leading_timestamp(line) else {
        return LineOutcome::Skipped(SkipReason::MissingTimestamp);
    };
    let Ok(window) = parse_window_timestamp(raw_start).and_then(TimeWindow::starting_at) else {
        return LineOutcome::Skipped(SkipReason::UnparseableTimestamp);
    };

    let mut bid_id = fields::extract(line, BID_ID);
    let mut ad_id = fields::extract(line, AD_ID);

    if (bid_id.is_none() || ad_id.is_none())
        && let Some(ad_data) = ad_data_token(line)
    {
        let (token_bid, token_ad) = ad_data_identifiers(&ad_data);
        bid_id = bid_id.or(token_bid);
        ad_id = ad_id.or(token_ad);
    }

    if bid_id.is_none() {
        bid_id = loose_capture(loose_line_bid_regex(), line);
    }
    if ad_id.is_none() {
        ad_id = loose_capture(loose_line_ad_regex(), line);
    }
    if bid_id.is_none() && ad_id.is_none() {
        return LineOutcome::Skipped(SkipReason::FieldNotFound);
    }

    let mut record = ExtractedRecord::placeholder();
    record.bid_id = bid_id.unwrap_or_else(|| PLACEHOLDER.to_string());
    record.ad_id = ad_id.unwrap_or_else(|| PLACEHOLDER.to_string());
    if !seen.claim(&record.bid_id) {
        return LineOutcome::Skipped(SkipReason::DuplicateIdentifier);
    }
    record.set_window(window);

    LineOutcome::Record {
        record,
        window: WindowStatus::Derived,
    }
}

/// A leading, optionally quoted `YYYY-MM-DDTHH:MM:SS`, or anywhere in the line
/// a `YYYY-MM-DDTHH:MM:SS.mmm+HHMM` stamp with fraction and offset dropped.
/// A stamp of the right shape that is not a real calendar time (`2024-02-30`)
/// skips the line as unparseable, whatever identifiers it carries.
fn leading_timestamp(line: &str) -> Option<&str> {
    leading_timestamp_regex()
        .captures(line)
        .or_else(|| offset_timestamp_regex().captures(line))
        .and_then(|captures| captures.get(1))
        .map(|stamp| stamp.as_str())
}

/// Value of the last `adData=` token in the key=value body of the line.
fn ad_data_token(line: &str) -> Option<String> {
    let body = match log_header_regex().find(line) {
        Some(header) => &line[header.end()..],
        None => line,
    };

    token_regex()
        .find_iter(body)
        .filter_map(|token| token.as_str().split_once('='))
        .filter(|(key, _)| key.trim() == AD_DATA_KEY)
        .last()
        .map(|(_, value)| strip_quotes(value.trim()).to_string())
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn ad_data_identifiers(ad_data: &str) -> (Option<String>, Option<String>) {
    let unescaped = ad_data.replace("\\\"", "\"").replace("\\\\", "\\");
    match serde_json::from_str::<Value>(&unescaped) {
        Ok(parsed) => {
            let attributes = object_at(&parsed, "bidAttributes");
            (
                attributes.and_then(|attributes| text_at(attributes, BID_ID)),
                attributes.and_then(|attributes| text_at(attributes, AD_ID)),
            )
        }
        Err(_) => (
            loose_capture(loose_ad_data_bid_regex(), ad_data),
            loose_capture(loose_ad_data_ad_regex(), ad_data),
        ),
    }
}

fn loose_capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

fn leading_timestamp_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"^"?(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})"#)
            .expect("leading timestamp regex should compile")
    })
}

fn offset_timestamp_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})\.\d{3}\+\d{4}")
            .expect("offset timestamp regex should compile")
    })
}

fn log_header_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"^"?[^"]*"?:\s*"#).expect("log header regex should compile"))
}

/// Runs of bare characters and quoted segments; whitespace and commas split
/// tokens only outside quotes.
fn token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?:[^\s,"]+|"[^"]*")+"#).expect("key=value token regex should compile")
    })
}

fn loose_ad_data_bid_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)bidId["\\']*:\s*["\\']*([^"\\',}]+)"#)
            .expect("adData bidId regex should compile")
    })
}

fn loose_ad_data_ad_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)adId["\\']*:\s*["\\']*([^"\\',}]+)"#)
            .expect("adData adId regex should compile")
    })
}

fn loose_line_bid_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)bidId["\\']*\s*[:=]\s*["\\']*([^"\\',}\s]+)"#)
            .expect("line bidId regex should compile")
    })
}

fn loose_line_ad_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)adId["\\']*\s*[:=]\s*["\\']*([^"\\',}\s]+)"#)
            .expect("line adId regex should compile")
    })
}
