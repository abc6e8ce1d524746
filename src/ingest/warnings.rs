/// Warning feed client
///
/// Polls an endpoint publishing the currently valid weather warnings as
/// JSON, either a bare array or an object with a `warnings` array:
///
/// ```json
/// [{"type": "thunderstorm", "severity": "orange", "text": "Silne burky",
///   "startTime": "1.6.2025 14:00", "endTime": "1.6.2025 22:00"}]
/// ```
///
/// A payload that cannot be read at all fails the whole poll, which is then
/// retried on the next tick. A single record missing a field is dropped and
/// the rest of the batch still goes through.

use serde_json::Value;
use std::time::Duration;

use crate::logging::{self, Source};
use crate::model::{RelayError, WarningRecord};

// ============================================================================
// Source Abstraction
// ============================================================================

/// Anything that can produce the current warning list.
pub trait WarningSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<WarningRecord>, RelayError>;
}

// ============================================================================
// HTTP Client
// ============================================================================

pub struct HttpWarningSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpWarningSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl WarningSource for HttpWarningSource {
    fn fetch(&self) -> Result<Vec<WarningRecord>, RelayError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(RelayError::Http(response.status().as_u16()));
        }

        let body = response.text()?;
        logging::debug(
            Source::Warnings,
            Some(&self.url),
            &format!("downloaded {} bytes", body.len()),
        );
        parse_warnings(&body)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a warning payload, dropping individual malformed records.
pub fn parse_warnings(json: &str) -> Result<Vec<WarningRecord>, RelayError> {
    let root: Value = serde_json::from_str(json)?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("warnings") {
            Some(Value::Array(items)) => items,
            _ => return Err(RelayError::Parse("object payload has no 'warnings' array".into())),
        },
        _ => return Err(RelayError::Parse("expected an array of warnings".into())),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<WarningRecord>(item) {
            Ok(mut record) => {
                record.text = record.text.trim().to_string();
                records.push(record);
            }
            Err(e) => logging::warn(
                Source::Warnings,
                None,
                &format!("dropping malformed warning #{}: {}", index, e),
            ),
        }
    }
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
