//! Resolution of job ids into live jobs.

use crate::error::{ConsoleError, ConsoleResult};
use crate::queue::Job;
use crate::session::Session;
use futures_util::future::try_join_all;

/// Jobs found for a list of ids, and the ids that matched nothing.
///
/// Both lists keep the input order. Every input id lands in exactly one of
/// them, duplicates included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Jobs that exist.
    pub found: Vec<Job>,
    /// Ids with no job.
    pub not_found: Vec<String>,
}

impl Resolution {
    /// Split `ids` by the lookup result at the same position.
    #[must_use]
    pub fn partition(ids: &[String], lookups: Vec<Option<Job>>) -> Self {
        let mut resolution = Self::default();
        for (id, lookup) in ids.iter().zip(lookups) {
            match lookup {
                Some(job) => resolution.found.push(job),
                None => resolution.not_found.push(id.clone()),
            }
        }
        resolution
    }

    /// Whether no job was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Look up all `ids` concurrently.
///
/// # Errors
///
/// Returns [`ConsoleError::NotConnected`] without a session, or the first
/// queue error. Missing jobs are not errors.
pub async fn resolve(session: &Session, ids: &[String]) -> ConsoleResult<Resolution> {
    let queue = session.queue()?;
    let lookups = try_join_all(ids.iter().map(|id| queue.get_job(id))).await?;
    Ok(Resolution::partition(ids, lookups))
}

/// Look up a single job.
///
/// # Errors
///
/// Returns [`ConsoleError::JobNotFound`] if the job does not exist.
pub async fn resolve_one(session: &Session, id: &str) -> ConsoleResult<Job> {
    session
        .queue()?
        .get_job(id)
        .await?
        .ok_or_else(|| ConsoleError::JobNotFound(id.to_string()))
}
