use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Serializer, Value, ser::PrettyFormatter};
use std::fmt;

pub const FETCH_FAILED: &str = "Failed to request data";

/// Outcome of one weather request.
///
/// Serialized untagged: `Data` is written verbatim and `Error` as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WeatherResult {
    Error { error: String },
    Data(Value),
}

impl WeatherResult {
    pub fn failed() -> Self {
        WeatherResult::Error {
            error: FETCH_FAILED.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WeatherResult::Error { .. })
    }

    /// JSON text indented by four spaces.
    pub fn to_document(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Blob name of the form `data_<YYYYMMDDHHMMSS>.json`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobName(String);

impl BlobName {
    pub fn at(when: DateTime<Utc>) -> Self {
        BlobName(format!("data_{}.json", when.format("%Y%m%d%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
