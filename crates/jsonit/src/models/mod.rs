pub mod envelope;
pub mod overrides;
pub mod record;

pub use envelope::{EXECUTION_TIMEOUT_SECS, ExtractMode, OutputEnvelope, REQUESTER, json_schema};
pub use overrides::{ManualOverrides, RecordField};
pub use record::{ExtractedRecord, PLACEHOLDER};
