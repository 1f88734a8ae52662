//! Interactive console: command table, execution, rendering and the REPL.

pub mod command;
pub mod console;
pub mod render;
pub mod repl;

pub use command::{ListArgs, ReplCommand, ReplLine};
pub use console::{Console, Outcome, QueueStats};
