//! Console error types.

use crate::filter::FilterError;
use crate::queue::QueueError;
use thiserror::Error;

/// Result type for console commands.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Errors a command can end with.
///
/// Every variant is reported to the operator and the console keeps running.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// No queue is connected.
    #[error("Need connect before")]
    NotConnected,

    /// Connecting to the queue failed.
    #[error("could not connect to {url}: {source}")]
    Connection {
        /// Redis URL that was tried.
        url: String,
        /// Underlying failure.
        #[source]
        source: QueueError,
    },

    /// Job does not exist.
    #[error("Job \"{0}\" not found")]
    JobNotFound(String),

    /// Job data or return value is not valid JSON.
    #[error("seems passed data is incorrect json: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// Filter or time-ago input is invalid.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Clean period is empty, unparsable or zero.
    #[error("Incorrect period \"{0}\"")]
    InvalidPeriod(String),

    /// Clean status is not a known state.
    #[error("Incorrect status \"{0}\", expected one of: completed, wait, active, delayed, failed")]
    InvalidStatus(String),

    /// Operator declined the confirmation.
    #[error("You cancel action")]
    Cancelled,

    /// Reading the confirmation answer failed.
    #[error("failed to read answer: {0}")]
    Prompt(#[from] std::io::Error),

    /// Queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ConsoleError {
    /// Whether the operator cancelled the command.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
