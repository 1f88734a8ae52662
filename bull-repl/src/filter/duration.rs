//! Human duration strings such as `2h`, `1.5 days` or `500`.
//!
//! A bare number is milliseconds. Units are case-insensitive.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

const SECOND: f64 = 1_000.0;
const MINUTE: f64 = SECOND * 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const WEEK: f64 = DAY * 7.0;
const YEAR: f64 = DAY * 365.25;

/// Inputs longer than this are rejected outright.
const MAX_INPUT_LEN: usize = 100;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<value>-?(?:\d+)?\.?\d+) *(?P<unit>milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)?$",
    )
    .expect("valid duration pattern")
});

/// Parse a duration string.
///
/// Returns `None` for unparsable, negative or out-of-range input.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() || input.len() > MAX_INPUT_LEN {
        return None;
    }

    let caps = DURATION_RE.captures(input)?;
    let value: f64 = caps.name("value")?.as_str().parse().ok()?;
    let unit = caps
        .name("unit")
        .map_or_else(|| "ms".to_string(), |u| u.as_str().to_ascii_lowercase());

    let factor = match unit.as_str() {
        "years" | "year" | "yrs" | "yr" | "y" => YEAR,
        "weeks" | "week" | "w" => WEEK,
        "days" | "day" | "d" => DAY,
        "hours" | "hour" | "hrs" | "hr" | "h" => HOUR,
        "minutes" | "minute" | "mins" | "min" | "m" => MINUTE,
        "seconds" | "second" | "secs" | "sec" | "s" => SECOND,
        _ => 1.0,
    };

    let millis = value * factor;
    if millis < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(millis / 1_000.0).ok()
}
