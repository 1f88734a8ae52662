//! Read-eval-print loop.

use crate::cli::command::{ReplCommand, ReplLine};
use crate::cli::console::{Console, Outcome};
use crate::cli::render;
use crate::config::ConsoleSettings;
use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::Path;
use tracing::{debug, warn};

/// What a typed line turned into.
#[derive(Debug, PartialEq, Eq)]
pub enum LineAction {
    /// Nothing to run.
    Empty,
    /// Parse failure or help text to show.
    Invalid(String),
    /// Command to run.
    Command(ReplCommand),
}

/// Split and parse one line.
#[must_use]
pub fn parse_line(line: &str) -> LineAction {
    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => return LineAction::Invalid(format!("Parse error: {e}")),
    };
    if words.is_empty() {
        return LineAction::Empty;
    }
    match ReplLine::try_parse_from(words) {
        Ok(parsed) => LineAction::Command(parsed.command),
        Err(e) => LineAction::Invalid(e.to_string()),
    }
}

/// Run the console until `exit` or end of input. History is loaded before
/// and saved after.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub async fn run(console: &mut Console, settings: &ConsoleSettings) -> anyhow::Result<()> {
    let config = Config::builder()
        .max_history_size(settings.history_size)?
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .build();
    let mut editor = DefaultEditor::with_config(config).context("Failed to open terminal")?;

    let history = settings.history_path();
    if let Err(e) = editor.load_history(&history) {
        debug!(path = %history.display(), error = %e, "No history loaded");
    }

    loop {
        let line = match editor.readline(&console.prompt()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read line"),
        };

        let command = match parse_line(&line) {
            LineAction::Empty => continue,
            LineAction::Invalid(text) => {
                render::usage(&text);
                continue;
            }
            LineAction::Command(command) => command,
        };

        if let Err(e) = editor.add_history_entry(line.trim()) {
            debug!(error = %e, "Failed to record history entry");
        }

        match console.execute(command).await {
            Ok(Outcome::Closed) => break,
            Ok(outcome) => render::outcome(&outcome),
            Err(err) => {
                debug!(error = %err, "Command failed");
                render::error(&err);
            }
        }
    }

    save_history(&mut editor, &history);
    console.shutdown().await;
    Ok(())
}

fn save_history(editor: &mut DefaultEditor, path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "Failed to create history directory");
            return;
        }
    }
    if let Err(e) = editor.save_history(path) {
        warn!(path = %path.display(), error = %e, "Failed to save history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse_line(""), LineAction::Empty);
        assert_eq!(parse_line("   "), LineAction::Empty);
    }

    #[test]
    fn test_quoted_json() {
        assert_eq!(
            parse_line(r#"complete 4 '{"ok": true}'"#),
            LineAction::Command(ReplCommand::Complete {
                id: "4".to_string(),
                data: r#"{"ok": true}"#.to_string(),
            })
        );
    }

    #[test]
    fn test_unbalanced_quotes() {
        assert!(matches!(
            parse_line("add '{"),
            LineAction::Invalid(text) if text.starts_with("Parse error")
        ));
    }

    #[test]
    fn test_unknown_command_and_help() {
        assert!(matches!(parse_line("frobnicate"), LineAction::Invalid(_)));
        assert!(matches!(
            parse_line("help"),
            LineAction::Invalid(text) if text.contains("connect")
        ));
    }
}
