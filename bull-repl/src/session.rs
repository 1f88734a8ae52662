//! The single active queue connection.

use crate::error::{ConsoleError, ConsoleResult};
use crate::queue::{QueueBackend, QueueConnector, QueueTarget};
use std::fmt;
use tracing::{info, warn};

/// A connected queue and the parameters it was opened with.
pub struct ActiveQueue {
    target: QueueTarget,
    backend: Box<dyn QueueBackend>,
}

impl ActiveQueue {
    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.target.prefix
    }

    /// Connection parameters.
    #[must_use]
    pub const fn target(&self) -> &QueueTarget {
        &self.target
    }

    /// Backend handle.
    #[must_use]
    pub fn backend(&self) -> &dyn QueueBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for ActiveQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveQueue")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Holds at most one connected queue.
///
/// Connecting again replaces the current queue; the old connection is closed
/// before the new one is opened.
#[derive(Debug, Default)]
pub struct Session {
    active: Option<ActiveQueue>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `target`, replacing any current connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Connection`] if the backend cannot be opened
    /// or does not answer. The session is left without a connection.
    pub async fn connect(
        &mut self,
        connector: &dyn QueueConnector,
        target: QueueTarget,
    ) -> ConsoleResult<&ActiveQueue> {
        self.close().await;

        let backend = connector
            .open(&target)
            .await
            .map_err(|source| ConsoleError::Connection {
                url: target.url.clone(),
                source,
            })?;

        if let Err(source) = backend.is_ready().await {
            if let Err(e) = backend.close().await {
                warn!(url = %target.url, error = %e, "Failed to close unready connection");
            }
            return Err(ConsoleError::Connection {
                url: target.url,
                source,
            });
        }

        info!(queue = %target.name, url = %target.url, prefix = %target.prefix, "Connected");
        Ok(self.active.insert(ActiveQueue { target, backend }))
    }

    /// Active backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::NotConnected`] if no queue is connected.
    pub fn queue(&self) -> ConsoleResult<&dyn QueueBackend> {
        self.active
            .as_ref()
            .map(ActiveQueue::backend)
            .ok_or(ConsoleError::NotConnected)
    }

    /// Active connection, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&ActiveQueue> {
        self.active.as_ref()
    }

    /// Close the active connection. Close failures are logged only.
    pub async fn close(&mut self) {
        if let Some(active) = self.active.take() {
            match active.backend.close().await {
                Ok(()) => info!(queue = %active.target.name, "Disconnected"),
                Err(e) => {
                    warn!(queue = %active.target.name, error = %e, "Failed to close connection");
                }
            }
        }
    }
}
