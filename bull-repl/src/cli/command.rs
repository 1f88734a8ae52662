//! Console command table.
//!
//! Each REPL line is split into words and parsed with [`ReplLine`]. Argument
//! checks that go beyond clap (JSON payloads, clean periods) are plain
//! functions so they can be tested without a queue.

use crate::error::{ConsoleError, ConsoleResult};
use crate::filter::parse_duration;
use crate::queue::CleanStatus;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::time::Duration;

/// One line typed at the prompt.
#[derive(Debug, Parser)]
#[command(
    name = "bull-repl",
    no_binary_name = true,
    disable_version_flag = true
)]
pub struct ReplLine {
    /// Command to run.
    #[command(subcommand)]
    pub command: ReplCommand,
}

/// Filter options shared by the listing commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ListArgs {
    /// Filter jobs with a search object, e.g. '{"name":"email"}'
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Only jobs created within this period, e.g. 30m, 2h, 1d
    #[arg(short = 't', long = "time-ago", visible_alias = "timeAgo")]
    pub time_ago: Option<String>,
}

/// Console commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ReplCommand {
    /// Connect to a bull queue
    Connect {
        /// Queue name
        queue: String,

        /// Prefix used for all queue keys [default: bull]
        #[arg(short, long)]
        prefix: Option<String>,

        /// Redis URL: redis://[:password@]host[:port][/db-number] [default: redis://localhost:6379]
        #[arg(short, long)]
        redis: Option<String>,
    },

    /// Count jobs by state
    Stats,

    /// Fetch active jobs
    Active(ListArgs),

    /// Fetch waiting jobs
    Waiting(ListArgs),

    /// Fetch completed jobs
    Completed(ListArgs),

    /// Fetch failed jobs
    Failed(ListArgs),

    /// Fetch delayed jobs
    Delayed(ListArgs),

    /// Pause the current queue
    Pause,

    /// Resume the current queue
    Resume,

    /// Get jobs by id
    Get {
        /// Job ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Add a job to the queue
    Add {
        /// Job data as JSON
        data: String,

        /// Name for a named job
        #[arg(short, long, default_value = "__default__")]
        name: String,
    },

    /// Remove jobs
    #[command(name = "rm")]
    Remove {
        /// Job ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Retry failed jobs
    Retry {
        /// Job ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Retry every failed job
    RetryFailed,

    /// Promote delayed jobs
    Promote {
        /// Job ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Move a job to failed
    Fail {
        /// Job id
        id: String,

        /// Failure reason
        #[arg(required = true, num_args = 1..)]
        reason: Vec<String>,
    },

    /// Move a job to completed
    Complete {
        /// Job id
        id: String,

        /// Return value as JSON
        data: String,
    },

    /// Remove jobs older than a period, e.g. 1d
    Clean {
        /// Grace period
        period: String,

        /// State to clean: completed, wait, active, delayed or failed
        #[arg(short, long, default_value = "completed")]
        status: String,

        /// Maximum number of jobs to clean, 0 for all [default: all]
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Show job logs
    Logs {
        /// Job id
        id: String,

        /// First line
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        start: i64,

        /// Last line, negative counts from the end
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        end: i64,
    },

    /// Append a log line to a job
    Log {
        /// Job id
        id: String,

        /// Log line
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Leave the console
    #[command(visible_alias = "quit")]
    Exit,
}

impl ReplCommand {
    /// Whether the command changes queue state and needs confirmation.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Pause
                | Self::Resume
                | Self::Add { .. }
                | Self::Remove { .. }
                | Self::Retry { .. }
                | Self::RetryFailed
                | Self::Promote { .. }
                | Self::Fail { .. }
                | Self::Complete { .. }
                | Self::Clean { .. }
                | Self::Log { .. }
        )
    }
}

/// Parse a JSON argument (job data or return value).
///
/// # Errors
///
/// Returns [`ConsoleError::InvalidPayload`] if `text` is not valid JSON.
pub fn parse_json_arg(text: &str) -> ConsoleResult<Value> {
    serde_json::from_str(text).map_err(ConsoleError::InvalidPayload)
}

/// Validated arguments of `clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanRequest {
    /// Jobs younger than this are kept.
    pub grace: Duration,
    /// State to clean.
    pub status: CleanStatus,
    /// Maximum number of jobs to remove, `None` for all.
    pub limit: Option<u64>,
}

impl CleanRequest {
    /// Validate `clean` arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::InvalidPeriod`] for an empty, unparsable or
    /// zero period and [`ConsoleError::InvalidStatus`] for an unknown status.
    /// A zero limit means no limit.
    pub fn parse(period: &str, status: &str, limit: Option<u64>) -> ConsoleResult<Self> {
        let grace = parse_duration(period)
            .filter(|grace| !grace.is_zero())
            .ok_or_else(|| ConsoleError::InvalidPeriod(period.to_string()))?;
        let status = status.parse().map_err(ConsoleError::InvalidStatus)?;
        Ok(Self {
            grace,
            status,
            limit: limit.filter(|&limit| limit > 0),
        })
    }
}
