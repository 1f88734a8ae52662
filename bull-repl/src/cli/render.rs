//! Terminal output for command outcomes and errors.

use crate::cli::console::{Outcome, QueueStats};
use crate::error::ConsoleError;
use crate::queue::JobLogs;
use crate::snapshot::JobSnapshot;
use chrono::{DateTime, SecondsFormat};
use console::{style, Emoji};
use serde_json::Value;

static SUCCESS: Emoji = Emoji("✓ ", "√ ");
static WARNING: Emoji = Emoji("⚠ ", "! ");
static ERROR: Emoji = Emoji("✗ ", "x ");

/// Print the outcome of a command.
pub fn outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Connected(target) => success(&format!(
            "Connected to {}, prefix: {}, queue: {}",
            target.url, target.prefix, target.name
        )),
        Outcome::Stats(stats) => print!("{}", stats_table(stats)),
        Outcome::Jobs { jobs, not_found } => {
            not_found_warning(not_found);
            if jobs.is_empty() && not_found.is_empty() {
                println!("  {}", style("(No jobs to display)").dim());
            } else if !jobs.is_empty() {
                println!("{}", jobs_json(jobs));
            }
        }
        Outcome::Applied { message, not_found } => {
            not_found_warning(not_found);
            if let Some(message) = message {
                success(message);
            }
        }
        Outcome::Logs(logs) => print!("{}", logs_text(logs)),
        Outcome::Closed => {}
    }
}

/// Print a command error. Cancellation is a notice, everything else an error.
pub fn error(err: &ConsoleError) {
    if err.is_cancelled() {
        println!("{WARNING}{}", style(err).yellow());
    } else {
        println!("{ERROR}{}", style(err).red());
    }
}

/// Print a line the command parser rejected (includes clap's help output).
pub fn usage(text: &str) {
    println!("{}", text.trim_end());
}

fn success(message: &str) {
    println!("{SUCCESS}{}", style(message).green());
}

fn not_found_warning(ids: &[String]) {
    if let Some(line) = not_found_line(ids) {
        println!("{WARNING}{}", style(line).yellow());
    }
}

/// `Not found jobs: 3,9`, or nothing when every id was found.
#[must_use]
pub fn not_found_line(ids: &[String]) -> Option<String> {
    (!ids.is_empty()).then(|| format!("Not found jobs: {}", ids.join(",")))
}

/// Aligned table of job counts.
#[must_use]
pub fn stats_table(stats: &QueueStats) -> String {
    let rows = [
        ("waiting", stats.counts.waiting),
        ("active", stats.counts.active),
        ("completed", stats.counts.completed),
        ("failed", stats.counts.failed),
        ("delayed", stats.counts.delayed),
        ("paused", stats.paused),
    ];

    let mut out = format!("{}\n", style("Queue Status").bold().underlined());
    for (state, count) in rows {
        out.push_str(&format!("  {:<11}{}\n", format!("{state}:"), style(count).cyan()));
    }
    if stats.paused_locally {
        out.push_str(&format!("  {}\n", style("(paused locally)").yellow()));
    }
    out
}

/// Jobs as pretty JSON with readable creation times.
#[must_use]
pub fn jobs_json(jobs: &[JobSnapshot]) -> String {
    let display: Vec<Value> = jobs.iter().map(display_value).collect();
    serde_json::to_string_pretty(&display).unwrap_or_default()
}

fn display_value(snapshot: &JobSnapshot) -> Value {
    let mut value = snapshot.to_value();
    if let Some(time) = snapshot.time.and_then(DateTime::from_timestamp_millis) {
        value["time"] = Value::String(time.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    value
}

/// Log count followed by the lines.
#[must_use]
pub fn logs_text(logs: &JobLogs) -> String {
    let mut out = format!("Count of job logs: {}\n", style(logs.count).cyan());
    if !logs.logs.is_empty() {
        out.push_str("Logs:\n");
        for line in &logs.logs {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}
