//! Job filters.
//!
//! A [`JobFilter`] combines a structural search object (see [`search`]) with
//! an optional creation-time window. Both parts are compiled from operator
//! input once and then applied to snapshots client-side.

pub mod duration;
pub mod search;

pub use duration::parse_duration;

use crate::snapshot::JobSnapshot;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for filter compilation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors raised while compiling a filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Filter text is not valid JSON.
    #[error("filter is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Filter text is JSON but not an object.
    #[error("filter must be a JSON object")]
    NotAnObject,

    /// Time-ago text is not a duration.
    #[error("time ago \"{0}\" is not a duration (e.g. 30m, 2h, 1d)")]
    TimeAgo(String),
}

/// Compiled predicate over job snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    search: Map<String, Value>,
    since: Option<i64>,
}

impl JobFilter {
    /// Lower bound on creation time in epoch milliseconds, if any.
    #[must_use]
    pub const fn since(&self) -> Option<i64> {
        self.since
    }

    /// Test one snapshot.
    #[must_use]
    pub fn matches(&self, snapshot: &JobSnapshot) -> bool {
        if let Some(since) = self.since {
            if !snapshot.time.is_some_and(|time| time >= since) {
                return false;
            }
        }
        self.search.is_empty() || search::matches(&snapshot.to_value(), &self.search)
    }

    /// Keep matching snapshots, preserving order.
    #[must_use]
    pub fn apply(&self, snapshots: Vec<JobSnapshot>) -> Vec<JobSnapshot> {
        snapshots.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Compile operator input against the current time.
///
/// # Errors
///
/// See [`compile_at`].
pub fn compile(filter_text: Option<&str>, time_ago: Option<&str>) -> FilterResult<JobFilter> {
    compile_at(filter_text, time_ago, chrono::Utc::now().timestamp_millis())
}

/// Compile operator input with an explicit `now` (epoch milliseconds).
///
/// Blank or absent text means "no constraint"; so does a zero duration.
///
/// # Errors
///
/// Returns [`FilterError`] if the filter is not a JSON object or the time-ago
/// text is not a duration.
pub fn compile_at(
    filter_text: Option<&str>,
    time_ago: Option<&str>,
    now: i64,
) -> FilterResult<JobFilter> {
    let search = match filter_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => return Err(FilterError::NotAnObject),
        },
        None => Map::new(),
    };

    let since = match time_ago.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            let window =
                parse_duration(text).ok_or_else(|| FilterError::TimeAgo(text.to_string()))?;
            if window.is_zero() {
                None
            } else {
                let millis = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
                Some(now.saturating_sub(millis))
            }
        }
        None => None,
    };

    Ok(JobFilter { search, since })
}
