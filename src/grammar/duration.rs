//! Pause-duration sub-grammar.

use std::sync::LazyLock;

use chrono::TimeDelta;
use regex::Regex;

use crate::error::ParseError;

static NUMBER_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(days?|weeks?|months?)\b").unwrap());

/// Parse the text inside a `<pause>` tag into a span of days.
///
/// Recognized literal phrases map to fixed spans; otherwise the first
/// `<number><unit>` found anywhere in the text is accepted, so phrasings
/// like "about 2 weeks" work. Months are a flat 30 days; pause windows
/// are deliberately coarse. The number comes from untrusted email text,
/// so the arithmetic is checked and absurd spans are rejected rather
/// than overflowing.
pub fn parse_pause_duration(text: &str) -> Result<TimeDelta, ParseError> {
    let normalized = text.trim().to_lowercase();
    let invalid = || ParseError::InvalidDuration(text.trim().to_string());

    match normalized.as_str() {
        "today" | "tomorrow" => return Ok(TimeDelta::days(1)),
        "this week" | "next week" => return Ok(TimeDelta::days(7)),
        "this month" | "next month" => return Ok(TimeDelta::days(30)),
        _ => {}
    }

    let caps = NUMBER_UNIT.captures(&normalized).ok_or_else(invalid)?;

    let number: i64 = caps[1].parse().map_err(|_| invalid())?;

    let days_per_unit = match &caps[2] {
        "day" | "days" => 1,
        "week" | "weeks" => 7,
        _ => 30,
    };

    number
        .checked_mul(days_per_unit)
        .and_then(TimeDelta::try_days)
        .ok_or_else(invalid)
}
