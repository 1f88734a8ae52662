//! Observability (logging)
//!
//! Console output goes to stdout, so diagnostics are written to stderr.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output
    #[default]
    Compact,
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Build the level filter: `RUST_LOG` wins over the configured level.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive.
pub fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Initialize logging
///
/// # Errors
///
/// Returns an error if the level is invalid or a global subscriber is
/// already installed.
///
/// # Example
///
/// ```rust,no_run
/// use bull_repl::observability::{self, LogFormat};
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init("info", LogFormat::Compact)?;
/// tracing::info!("Console started");
/// # Ok(())
/// # }
/// ```
pub fn init(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let env_filter = env_filter(level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}
