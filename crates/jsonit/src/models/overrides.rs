use std::collections::BTreeMap;

use crate::models::record::ExtractedRecord;
use crate::utils::time::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordField {
    BidId,
    AdId,
    StartTime,
    EndTime,
    TestCase,
    Pfm,
    TimeZone,
}

impl RecordField {
    /// Application order for overrides; an explicit `end_time` lands after a
    /// numeric `start_time` has already re-derived it.
    pub const ALL: [Self; 7] = [
        Self::BidId,
        Self::AdId,
        Self::StartTime,
        Self::EndTime,
        Self::TestCase,
        Self::Pfm,
        Self::TimeZone,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BidId => "bid_id",
            Self::AdId => "ad_id",
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
            Self::TestCase => "test_case",
            Self::Pfm => "pfm",
            Self::TimeZone => "time_zone",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }

    fn slot(self, record: &mut ExtractedRecord) -> &mut String {
        match self {
            Self::BidId => &mut record.bid_id,
            Self::AdId => &mut record.ad_id,
            Self::StartTime => &mut record.start_time,
            Self::EndTime => &mut record.end_time,
            Self::TestCase => &mut record.test_case,
            Self::Pfm => &mut record.pfm,
            Self::TimeZone => &mut record.time_zone,
        }
    }
}

/// Caller-supplied field values that replace whatever the engine derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    values: BTreeMap<RecordField, String>,
}

impl ManualOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and stores nothing) when `key` is not a record field.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        match RecordField::from_key(key.trim()) {
            Some(field) => {
                self.values.insert(field, value.into());
                true
            }
            None => false,
        }
    }

    /// Builds overrides from arbitrary pairs, returning the keys that were ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::new();
        let mut ignored = Vec::new();
        for (key, value) in pairs {
            if !overrides.set(key.as_ref(), value) {
                ignored.push(key.as_ref().to_string());
            }
        }
        (overrides, ignored)
    }

    #[must_use]
    pub fn get(&self, field: RecordField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.values().all(String::is_empty)
    }

    pub fn apply(&self, record: &mut ExtractedRecord) {
        for field in RecordField::ALL {
            let Some(value) = self.get(field).filter(|value| !value.is_empty()) else {
                continue;
            };

            if field == RecordField::StartTime && value.bytes().all(|byte| byte.is_ascii_digit()) {
                let window = value
                    .parse::<u64>()
                    .map_err(anyhow::Error::from)
                    .and_then(TimeWindow::from_unix_ms);
                match window {
                    Ok(window) => record.set_window(window),
                    Err(_) => record.clear_window(),
                }
                continue;
            }

            *field.slot(record) = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualOverrides, RecordField};
    use crate::models::record::ExtractedRecord;

    #[test]
    fn unknown_keys_are_reported_and_ignored() {
        let (overrides, ignored) =
            ManualOverrides::from_pairs([("pfm", "AFTMM"), ("colour", "blue"), ("bid_id", "B9")]);

        assert_eq!(ignored, vec!["colour".to_string()]);
        assert_eq!(overrides.get(RecordField::Pfm), Some("AFTMM"));
        assert_eq!(overrides.get(RecordField::BidId), Some("B9"));
    }

    #[test]
    fn empty_override_values_leave_record_untouched() {
        let (overrides, _) = ManualOverrides::from_pairs([("ad_id", ""), ("test_case", "")]);
        assert!(overrides.is_empty());

        let mut record = ExtractedRecord::placeholder();
        record.ad_id = "A1".to_string();
        overrides.apply(&mut record);
        assert_eq!(record.ad_id, "A1");
        assert_eq!(record.test_case, "");
    }

    #[test]
    fn numeric_start_time_is_epoch_millis() {
        let (overrides, _) = ManualOverrides::from_pairs([("start_time", "1700000000000")]);
        let mut record = ExtractedRecord::placeholder();
        overrides.apply(&mut record);

        assert_eq!(record.start_time, "2023-11-14T22:13:20");
        assert_eq!(record.end_time, "2023-11-14T22:23:20");
    }

    #[test]
    fn textual_start_time_is_verbatim_and_keeps_end_time() {
        let (overrides, _) = ManualOverrides::from_pairs([("start_time", "2024-01-01T00:00:00")]);
        let mut record = ExtractedRecord::placeholder();
        record.end_time = "2024-01-15T10:40:00".to_string();
        overrides.apply(&mut record);

        assert_eq!(record.start_time, "2024-01-01T00:00:00");
        assert_eq!(record.end_time, "2024-01-15T10:40:00");
    }

    #[test]
    fn out_of_range_epoch_clears_both_times() {
        let (overrides, _) =
            ManualOverrides::from_pairs([("start_time", "99999999999999999999999999")]);
        let mut record = ExtractedRecord::placeholder();
        record.start_time = "2024-01-15T10:30:00".to_string();
        record.end_time = "2024-01-15T10:40:00".to_string();
        overrides.apply(&mut record);

        assert_eq!(record.start_time, "");
        assert_eq!(record.end_time, "");
    }

    #[test]
    fn explicit_end_time_wins_over_derived_one() {
        let (overrides, _) = ManualOverrides::from_pairs([
            ("end_time", "custom-end"),
            ("start_time", "1700000000000"),
        ]);
        let mut record = ExtractedRecord::placeholder();
        overrides.apply(&mut record);

        assert_eq!(record.start_time, "2023-11-14T22:13:20");
        assert_eq!(record.end_time, "custom-end");
    }
}
