//! Confirmation before mutating commands.

use crate::error::{ConsoleError, ConsoleResult};
use std::io;
use tracing::debug;

/// Asks the operator a question and returns the raw answer.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// Show `message` and read one line, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn ask(&self, message: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

// Reads the terminal synchronously and blocks the runtime thread while
// waiting. Commands run one at a time, so nothing else is starved.
impl Prompter for TerminalPrompter {
    fn ask(&self, message: &str) -> io::Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()
            .map_err(io::Error::other)
    }
}

/// Ask `"{question}? (y/n)"`.
///
/// # Errors
///
/// Returns [`ConsoleError::Cancelled`] unless the answer is exactly `y`.
pub fn confirm(prompter: &dyn Prompter, question: &str) -> ConsoleResult<()> {
    let answer = prompter.ask(&format!("{question}? (y/n)"))?;
    if answer == "y" {
        Ok(())
    } else {
        debug!(question, answer = %answer, "Confirmation declined");
        Err(ConsoleError::Cancelled)
    }
}
