pub mod decode;
pub mod fields;
pub mod fos;
pub mod locate;
pub mod vega;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::models::{ExtractMode, ExtractedRecord, ManualOverrides, OutputEnvelope};

/// Why a line produced no record. None of these ever reach the caller as an
/// error; they only feed the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// The line does not have the selected mode's shape at all.
    NotCandidate,
    DecodeFailure,
    MissingTimestamp,
    UnparseableTimestamp,
    FieldNotFound,
    DuplicateIdentifier,
}

impl SkipReason {
    pub const ALL: [Self; 6] = [
        Self::NotCandidate,
        Self::DecodeFailure,
        Self::MissingTimestamp,
        Self::UnparseableTimestamp,
        Self::FieldNotFound,
        Self::DuplicateIdentifier,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotCandidate => "not_candidate",
            Self::DecodeFailure => "decode_failure",
            Self::MissingTimestamp => "missing_timestamp",
            Self::UnparseableTimestamp => "unparseable_timestamp",
            Self::FieldNotFound => "field_not_found",
            Self::DuplicateIdentifier => "duplicate_identifier",
        }
    }
}

/// How the time window of an emitted record was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Derived,
    Missing,
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Record {
        record: ExtractedRecord,
        window: WindowStatus,
    },
    Skipped(SkipReason),
}

/// Identifiers already emitted in the current batch.
#[derive(Debug, Default)]
pub struct SeenIdentifiers {
    ids: HashSet<String>,
}

impl SeenIdentifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `bid_id` is offered.
    pub fn claim(&mut self, bid_id: &str) -> bool {
        if self.ids.contains(bid_id) {
            return false;
        }
        self.ids.insert(bid_id.to_string());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub mode: ExtractMode,
    pub lines_total: usize,
    pub blank_lines: usize,
    pub records_emitted: usize,
    pub skipped: BTreeMap<String, usize>,
    pub windows_missing: usize,
    pub unparseable_timestamps: usize,
    pub placeholder_substituted: bool,
    pub cancelled: bool,
}

impl BatchReport {
    fn new(mode: ExtractMode) -> Self {
        Self {
            mode,
            lines_total: 0,
            blank_lines: 0,
            records_emitted: 0,
            skipped: SkipReason::ALL
                .iter()
                .map(|reason| (reason.as_str().to_string(), 0))
                .collect(),
            windows_missing: 0,
            unparseable_timestamps: 0,
            placeholder_substituted: false,
            cancelled: false,
        }
    }

    fn record_skip(&mut self, reason: SkipReason) {
        if let Some(count) = self.skipped.get_mut(reason.as_str()) {
            *count += 1;
        }
    }

    #[must_use]
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(reason.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub envelope: OutputEnvelope,
    pub report: BatchReport,
}

/// Classifies one line with the pipeline for `mode`.
pub fn classify_line(mode: ExtractMode, line: &str, seen: &mut SeenIdentifiers) -> LineOutcome {
    match mode {
        ExtractMode::Fos => fos::classify_line(line, seen),
        ExtractMode::Vega => vega::classify_line(line, seen),
    }
}

/// Scans every line and returns the deduplicated records in encounter order.
///
/// `cancel` is polled between lines; once raised, the records gathered so far
/// are returned and the report is marked cancelled.
pub fn extract_records(
    content: &str,
    mode: ExtractMode,
    cancel: Option<&AtomicBool>,
) -> (Vec<ExtractedRecord>, BatchReport) {
    let mut report = BatchReport::new(mode);
    let mut seen = SeenIdentifiers::new();
    let mut records = Vec::new();

    for line in content.lines() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            report.cancelled = true;
            break;
        }

        report.lines_total += 1;
        if line.trim().is_empty() {
            report.blank_lines += 1;
            continue;
        }

        match classify_line(mode, line, &mut seen) {
            LineOutcome::Record { record, window } => {
                match window {
                    WindowStatus::Derived => {}
                    WindowStatus::Missing => report.windows_missing += 1,
                    WindowStatus::Unparseable => report.unparseable_timestamps += 1,
                }
                records.push(record);
            }
            LineOutcome::Skipped(reason) => report.record_skip(reason),
        }
    }

    report.records_emitted = records.len();
    (records, report)
}

/// Full batch: extraction, placeholder substitution, overrides, envelope.
pub fn run_with_report(
    content: &str,
    mode: ExtractMode,
    overrides: &ManualOverrides,
    cancel: Option<&AtomicBool>,
) -> BatchOutcome {
    let (mut records, mut report) = extract_records(content, mode, cancel);
    if records.is_empty() {
        records.push(ExtractedRecord::placeholder());
        report.placeholder_substituted = true;
    }

    for record in &mut records {
        overrides.apply(record);
    }

    BatchOutcome {
        envelope: OutputEnvelope::new(mode, records),
        report,
    }
}

#[must_use]
pub fn run(content: &str, mode: ExtractMode, overrides: &ManualOverrides) -> OutputEnvelope {
    run_with_report(content, mode, overrides, None).envelope
}
