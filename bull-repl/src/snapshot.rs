//! Flat, immutable view of a job used for filtering and display.

use crate::queue::Job;
use serde::Serialize;
use serde_json::Value;

/// A job projected at fetch time.
///
/// Serialised with camelCase keys, so structural filters address the same
/// field names the operator sees. `time` stays in epoch milliseconds to keep
/// range filters (`{"time": {"gte": ...}}`) numeric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Job id.
    pub id: String,
    /// Job payload.
    pub data: Value,
    /// Creation time in milliseconds since the epoch.
    pub time: Option<i64>,
    /// Job name.
    pub name: String,
    /// Message of the last failure.
    pub failed_reason: Option<String>,
    /// Stack traces of past failures.
    pub stack_trace: Vec<String>,
    /// Value the job completed with.
    pub return_value: Option<Value>,
    /// Attempts made so far.
    pub attempts_made: u32,
    /// Delay in milliseconds.
    pub delay: u64,
    /// Reported progress.
    pub progress: Value,
}

impl JobSnapshot {
    /// JSON object form of the snapshot.
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Only string keys and JSON values, serialisation cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            data: job.data.clone(),
            time: job.timestamp,
            name: job.name.clone(),
            failed_reason: job.failed_reason.clone(),
            stack_trace: job.stacktrace.clone(),
            return_value: job.return_value.clone(),
            attempts_made: job.attempts_made,
            delay: job.delay,
            progress: job.progress.clone(),
        }
    }
}

/// Project a batch of jobs, preserving order.
#[must_use]
pub fn project(jobs: &[Job]) -> Vec<JobSnapshot> {
    jobs.iter().map(JobSnapshot::from).collect()
}
