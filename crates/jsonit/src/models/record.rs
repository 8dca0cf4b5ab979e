use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::time::TimeWindow;

/// Sentinel for an identifier or metadata field that no evidence resolved.
pub const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRecord {
    pub bid_id: String,
    pub ad_id: String,
    pub start_time: String,
    pub end_time: String,
    pub test_case: String,
    pub pfm: String,
    pub time_zone: String,
}

impl ExtractedRecord {
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            bid_id: PLACEHOLDER.to_string(),
            ad_id: PLACEHOLDER.to_string(),
            start_time: String::new(),
            end_time: String::new(),
            test_case: String::new(),
            pfm: PLACEHOLDER.to_string(),
            time_zone: PLACEHOLDER.to_string(),
        }
    }

    pub fn set_window(&mut self, window: TimeWindow) {
        self.start_time = window.start_time;
        self.end_time = window.end_time;
    }

    pub fn clear_window(&mut self) {
        self.start_time.clear();
        self.end_time.clear();
    }
}

impl Default for ExtractedRecord {
    fn default() -> Self {
        Self::placeholder()
    }
}

#[must_use]
pub fn is_resolved(value: &str) -> bool {
    !value.is_empty() && value != PLACEHOLDER
}
