//! Interactive console for Bull job queues stored in Redis.
//!
//! Attach to a queue, list jobs by state with structural and time filters,
//! and add, remove, retry, promote, fail, complete or clean jobs. Every
//! mutation asks for confirmation first.
//!
//! # Layout
//!
//! - [`queue`]: the Bull queue API and its Redis implementation
//! - [`session`]: the single active connection
//! - [`resolver`]: job id lookups with partial results
//! - [`filter`]: filter and time-window compilation
//! - [`confirm`]: the confirmation gate
//! - [`cli`]: command table, dispatcher, rendering and the REPL

pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod filter;
pub mod observability;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod snapshot;

pub use error::{ConsoleError, ConsoleResult};
