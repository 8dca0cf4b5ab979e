use std::fmt::{Display, Formatter};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::models::record::ExtractedRecord;

pub const REQUESTER: &str = "fameqa-automation-reports@amazon.com";
pub const EXECUTION_TIMEOUT_SECS: u32 = 90;

/// Which line convention the batch is parsed with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// JSON-per-line device logs with an `MM-DD HH:MM:SS` prefix.
    #[default]
    Fos,
    /// Leading ISO timestamp followed by a key=value body.
    Vega,
}

impl ExtractMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fos => "fos",
            Self::Vega => "vega",
        }
    }
}

impl Display for ExtractMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fos" => Ok(Self::Fos),
            "vega" => Ok(Self::Vega),
            other => Err(anyhow::anyhow!(
                "unsupported mode `{other}` (expected `fos` or `vega`)"
            )),
        }
    }
}

/// Top-level output wrapper.
///
/// Serialization order follows the mode: FOS writes `requester`,
/// `execution_timeout`, `data` with records in field-declaration order; Vega
/// writes `data` first and lays each record out alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct OutputEnvelope {
    #[serde(skip)]
    pub mode: ExtractMode,
    pub requester: String,
    pub execution_timeout: u32,
    pub data: Vec<ExtractedRecord>,
}

impl OutputEnvelope {
    #[must_use]
    pub fn new(mode: ExtractMode, data: Vec<ExtractedRecord>) -> Self {
        Self {
            mode,
            requester: REQUESTER.to_string(),
            execution_timeout: EXECUTION_TIMEOUT_SECS,
            data,
        }
    }
}

impl Serialize for OutputEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OutputEnvelope", 3)?;
        match self.mode {
            ExtractMode::Fos => {
                state.serialize_field("requester", &self.requester)?;
                state.serialize_field("execution_timeout", &self.execution_timeout)?;
                state.serialize_field("data", &self.data)?;
            }
            ExtractMode::Vega => {
                state.serialize_field("data", &AlphabeticalRecords(&self.data))?;
                state.serialize_field("execution_timeout", &self.execution_timeout)?;
                state.serialize_field("requester", &self.requester)?;
            }
        }
        state.end()
    }
}

struct AlphabeticalRecords<'a>(&'a [ExtractedRecord]);

impl Serialize for AlphabeticalRecords<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for record in self.0 {
            seq.serialize_element(&AlphabeticalRecord(record))?;
        }
        seq.end()
    }
}

struct AlphabeticalRecord<'a>(&'a ExtractedRecord);

impl Serialize for AlphabeticalRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.0;
        let mut state = serializer.serialize_struct("ExtractedRecord", 7)?;
        state.serialize_field("ad_id", &record.ad_id)?;
        state.serialize_field("bid_id", &record.bid_id)?;
        state.serialize_field("end_time", &record.end_time)?;
        state.serialize_field("pfm", &record.pfm)?;
        state.serialize_field("start_time", &record.start_time)?;
        state.serialize_field("test_case", &record.test_case)?;
        state.serialize_field("time_zone", &record.time_zone)?;
        state.end()
    }
}

#[must_use]
pub fn json_schema() -> Value {
    let schema = schemars::schema_for!(OutputEnvelope);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated envelope schema: {error}");
        }
    }
}
