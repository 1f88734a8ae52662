//! Live job representation as stored by Bull.

use super::{QueueError, QueueResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Identifier of a job inside one queue.
///
/// Bull ids are usually counters but custom ids are arbitrary strings, so the
/// id is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A job loaded from the queue at a point in time.
///
/// Fields mirror the Bull job hash. JSON-encoded fields are decoded; values
/// that are not valid JSON are kept as plain strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Job id.
    pub id: JobId,
    /// Job name (`__default__` for unnamed jobs).
    pub name: String,
    /// Job payload.
    pub data: Value,
    /// Options the job was added with.
    pub opts: Value,
    /// Creation time in milliseconds since the epoch.
    pub timestamp: Option<i64>,
    /// Delay in milliseconds.
    pub delay: u64,
    /// Priority (0 = none).
    pub priority: i64,
    /// Reported progress.
    pub progress: Value,
    /// Number of attempts made so far.
    pub attempts_made: u32,
    /// Message of the last failure.
    pub failed_reason: Option<String>,
    /// Stack traces of past failures.
    pub stacktrace: Vec<String>,
    /// Value the job completed with.
    pub return_value: Option<Value>,
    /// When processing started.
    pub processed_on: Option<i64>,
    /// When the job finished.
    pub finished_on: Option<i64>,
}

impl Job {
    /// Create a fresh job as it looks right after being added.
    #[must_use]
    pub fn new(id: JobId, name: impl Into<String>, data: Value, timestamp: i64) -> Self {
        Self {
            id,
            name: name.into(),
            data,
            opts: Value::Object(serde_json::Map::new()),
            timestamp: Some(timestamp),
            delay: 0,
            priority: 0,
            progress: Value::from(0),
            attempts_made: 0,
            failed_reason: None,
            stacktrace: Vec::new(),
            return_value: None,
            processed_on: None,
            finished_on: None,
        }
    }

    /// Decode a job from the fields of its Bull hash.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Missing`] when the hash is empty, which is how
    /// Redis reports a key that does not exist.
    pub fn from_hash(id: JobId, mut hash: HashMap<String, String>) -> QueueResult<Self> {
        if hash.is_empty() {
            return Err(QueueError::Missing(id.to_string()));
        }

        let stacktrace = match hash.remove("stacktrace") {
            Some(raw) => serde_json::from_str::<Vec<Value>>(&raw)
                .map(|frames| {
                    frames
                        .into_iter()
                        .filter_map(|frame| match frame {
                            Value::String(s) => Some(s),
                            Value::Null => None,
                            other => Some(other.to_string()),
                        })
                        .collect()
                })
                .unwrap_or_else(|_| vec![raw]),
            None => Vec::new(),
        };

        Ok(Self {
            name: hash
                .remove("name")
                .unwrap_or_else(|| "__default__".to_string()),
            data: hash.remove("data").map_or(Value::Null, |raw| lenient_json(&raw)),
            opts: hash
                .remove("opts")
                .map_or_else(|| Value::Object(serde_json::Map::new()), |raw| lenient_json(&raw)),
            timestamp: parse_number(hash.remove("timestamp")),
            delay: parse_number(hash.remove("delay")).unwrap_or(0),
            priority: parse_number(hash.remove("priority")).unwrap_or(0),
            progress: hash
                .remove("progress")
                .map_or_else(|| Value::from(0), |raw| lenient_json(&raw)),
            attempts_made: parse_number(hash.remove("attemptsMade")).unwrap_or(0),
            failed_reason: hash.remove("failedReason").filter(|s| !s.is_empty()),
            stacktrace,
            return_value: hash.remove("returnvalue").map(|raw| lenient_json(&raw)),
            processed_on: parse_number(hash.remove("processedOn")),
            finished_on: parse_number(hash.remove("finishedOn")),
            id,
        })
    }
}

fn lenient_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}
