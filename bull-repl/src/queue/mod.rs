//! Boundary to the Bull queue stored in Redis.
//!
//! The console never talks to Redis directly. Everything goes through
//! [`QueueBackend`], which keeps the session and command layers testable with
//! mocks, and through [`QueueConnector`], which opens backends for a
//! [`QueueTarget`].

pub mod job;
pub mod redis_queue;

pub use job::{Job, JobId};
pub use redis_queue::{RedisConnector, RedisQueue};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors reported by the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job does not exist.
    #[error("job {0} does not exist")]
    Missing(String),

    /// Job is not in the state an operation requires.
    #[error("job {id} is not in the {expected} state")]
    InvalidState {
        /// Job id.
        id: String,
        /// State the operation requires.
        expected: JobState,
    },

    /// Job is locked by a worker.
    #[error("job {0} is locked by a worker")]
    Locked(String),

    /// Connection was closed.
    #[error("queue connection is closed")]
    Closed,
}

/// Lifecycle states a job can be listed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be processed.
    Waiting,
    /// Being processed by a worker.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Scheduled for later.
    Delayed,
    /// Waiting while the queue is paused.
    Paused,
}

impl JobState {
    /// Suffix of the Redis key holding jobs in this state.
    #[must_use]
    pub const fn key_suffix(self) -> &'static str {
        match self {
            Self::Waiting => "wait",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delayed => "delayed",
            Self::Paused => "paused",
        }
    }

    /// Whether the state is stored as a sorted set rather than a list.
    #[must_use]
    pub const fn is_sorted_set(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Delayed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delayed => "delayed",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Statuses accepted by [`QueueBackend::clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanStatus {
    /// Completed jobs.
    Completed,
    /// Waiting jobs.
    Wait,
    /// Active jobs.
    Active,
    /// Delayed jobs.
    Delayed,
    /// Failed jobs.
    Failed,
}

impl CleanStatus {
    /// Accepted status names, in the order they are listed to operators.
    pub const NAMES: [&'static str; 5] = ["completed", "wait", "active", "delayed", "failed"];

    /// State whose key is cleaned.
    #[must_use]
    pub const fn state(self) -> JobState {
        match self {
            Self::Completed => JobState::Completed,
            Self::Wait => JobState::Waiting,
            Self::Active => JobState::Active,
            Self::Delayed => JobState::Delayed,
            Self::Failed => JobState::Failed,
        }
    }
}

impl FromStr for CleanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "wait" => Ok(Self::Wait),
            "active" => Ok(Self::Active),
            "delayed" => Ok(Self::Delayed),
            "failed" => Ok(Self::Failed),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for CleanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Wait => "wait",
            Self::Active => "active",
            Self::Delayed => "delayed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Whether pause/resume affects the whole queue or only this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseScope {
    /// Pause every worker of the queue (moves `wait` to `paused`).
    #[default]
    Global,
    /// Pause only workers of this process. The console runs no workers, so
    /// Redis is left untouched.
    Local,
}

/// Job counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    /// Waiting jobs.
    pub waiting: u64,
    /// Active jobs.
    pub active: u64,
    /// Completed jobs.
    pub completed: u64,
    /// Failed jobs.
    pub failed: u64,
    /// Delayed jobs.
    pub delayed: u64,
}

/// A contiguous range of a job's log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobLogs {
    /// Lines in the requested range.
    pub logs: Vec<String>,
    /// Total number of log lines of the job.
    pub count: u64,
}

/// Where to connect: queue name, Redis URL and key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTarget {
    /// Queue name.
    pub name: String,
    /// Redis URL.
    pub url: String,
    /// Key prefix.
    pub prefix: String,
}

impl QueueTarget {
    /// Build a target from operator input. The URL scheme is optional:
    /// `localhost:6380/2` becomes `redis://localhost:6380/2`.
    #[must_use]
    pub fn from_args(name: impl Into<String>, url: &str, prefix: impl Into<String>) -> Self {
        let address = url.trim();
        let address = address.strip_prefix("redis://").unwrap_or(address);
        Self {
            name: name.into(),
            url: format!("redis://{address}"),
            prefix: prefix.into(),
        }
    }
}

/// Operations the console needs from a queue.
///
/// Mirrors the Bull queue and job APIs. Per-job operations take the [`Job`]
/// obtained from [`get_job`](Self::get_job).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Verify the connection answers.
    async fn is_ready(&self) -> QueueResult<()>;

    /// Release the connection. Later operations fail with
    /// [`QueueError::Closed`].
    async fn close(&self) -> QueueResult<()>;

    /// Load a job, `None` if it does not exist.
    async fn get_job(&self, id: &str) -> QueueResult<Option<Job>>;

    /// Count jobs per state.
    async fn job_counts(&self) -> QueueResult<JobCounts>;

    /// Count jobs waiting in the paused list.
    async fn paused_count(&self) -> QueueResult<u64>;

    /// Load every job currently in `state`.
    async fn jobs_in_state(&self, state: JobState) -> QueueResult<Vec<Job>>;

    /// Add a job and return it.
    async fn add(&self, name: &str, data: Value) -> QueueResult<Job>;

    /// Pause the queue.
    async fn pause(&self, scope: PauseScope) -> QueueResult<()>;

    /// Resume the queue.
    async fn resume(&self, scope: PauseScope) -> QueueResult<()>;

    /// Whether a [`PauseScope::Local`] pause is in effect.
    fn is_paused_locally(&self) -> bool;

    /// Remove jobs in `status` older than `grace`, at most `limit` of them
    /// (`None` removes every match). Returns the ids removed.
    async fn clean(
        &self,
        grace: Duration,
        status: CleanStatus,
        limit: Option<u64>,
    ) -> QueueResult<Vec<String>>;

    /// Read log lines `start..=end` of a job (negative indexes count from the end).
    async fn job_logs(&self, id: &str, start: i64, end: i64) -> QueueResult<JobLogs>;

    /// Remove a job.
    async fn remove(&self, job: &Job) -> QueueResult<()>;

    /// Move a failed job back to waiting.
    async fn retry(&self, job: &Job) -> QueueResult<()>;

    /// Move a delayed job to waiting.
    async fn promote(&self, job: &Job) -> QueueResult<()>;

    /// Force a job into the failed state.
    async fn move_to_failed(&self, job: &Job, reason: &str, ignore_lock: bool) -> QueueResult<()>;

    /// Force a job into the completed state.
    async fn move_to_completed(
        &self,
        job: &Job,
        value: Value,
        ignore_lock: bool,
    ) -> QueueResult<()>;

    /// Append a log line, returning the new line count.
    async fn log(&self, job: &Job, line: &str) -> QueueResult<u64>;
}

/// Opens queue backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueConnector: Send + Sync {
    /// Open a backend for `target`. Readiness is checked by the caller.
    async fn open(&self, target: &QueueTarget) -> QueueResult<Box<dyn QueueBackend>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_status_parse() {
        for name in CleanStatus::NAMES {
            let status: CleanStatus = name.parse().unwrap();
            assert_eq!(status.to_string(), name);
        }
        assert_eq!("bogus".parse::<CleanStatus>(), Err("bogus".to_string()));
        assert!("Completed".parse::<CleanStatus>().is_err());
    }

    #[test]
    fn test_state_keys() {
        assert_eq!(JobState::Waiting.key_suffix(), "wait");
        assert_eq!(CleanStatus::Wait.state(), JobState::Waiting);
        assert!(JobState::Delayed.is_sorted_set());
        assert!(!JobState::Active.is_sorted_set());
    }

    #[test]
    fn test_target_url_normalisation() {
        let bare = QueueTarget::from_args("jobs", "localhost:6380/2", "bull");
        assert_eq!(bare.url, "redis://localhost:6380/2");

        let full = QueueTarget::from_args("jobs", "redis://:secret@cache:6379", "app");
        assert_eq!(full.url, "redis://:secret@cache:6379");
        assert_eq!(full.prefix, "app");
    }

    #[test]
    fn test_pause_scope_deserialize() {
        let scope: PauseScope = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(scope, PauseScope::Local);
        assert_eq!(PauseScope::default(), PauseScope::Global);
    }
}
