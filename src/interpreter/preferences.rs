//! Preference extraction from verification replies.
//!
//! A verification reply carries labeled lines the signup email asked the
//! user to fill in:
//!
//! ```text
//! Name: Ada Lovelace
//! Timezone: America/New_York
//! Prompt time: 7pm
//! Project: analytical-engine
//! ```
//!
//! Label matching is case-insensitive and keys on a keyword appearing
//! anywhere in the label, so wordings like "Preferred timezone" or
//! "Timezone (IANA)" still land. Name and timezone are required; time
//! defaults to 16:00 local and project is optional.

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::error::ParseError;

/// Preferences collected during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub name: String,
    /// Canonical IANA zone name.
    pub timezone: String,
    /// Local time of day the daily prompt should arrive.
    pub prompt_time: NaiveTime,
    pub project_focus: Option<String>,
}

const DEFAULT_PROMPT_TIME: (u32, u32) = (16, 0);

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$").unwrap());

/// Common zone spellings accepted alongside exact IANA names.
const ZONE_ALIASES: &[(&str, &str)] = &[
    ("utc", "UTC"),
    ("gmt", "UTC"),
    ("est", "America/New_York"),
    ("edt", "America/New_York"),
    ("eastern", "America/New_York"),
    ("cst", "America/Chicago"),
    ("cdt", "America/Chicago"),
    ("central", "America/Chicago"),
    ("mst", "America/Denver"),
    ("mdt", "America/Denver"),
    ("mountain", "America/Denver"),
    ("pst", "America/Los_Angeles"),
    ("pdt", "America/Los_Angeles"),
    ("pacific", "America/Los_Angeles"),
];

/// Extract preferences from a verification reply body.
pub fn parse_preferences(body: &str) -> Result<Preferences, ParseError> {
    let labels = scan_labels(body);

    let name = labels
        .name
        .ok_or(ParseError::MissingPreference { field: "name" })?;

    let zone_raw = labels
        .timezone
        .ok_or(ParseError::MissingPreference { field: "timezone" })?;
    let timezone = canonical_timezone(&zone_raw)?;

    let prompt_time = match labels.time {
        Some(raw) => parse_clock(&raw)?,
        None => {
            let (h, m) = DEFAULT_PROMPT_TIME;
            NaiveTime::from_hms_opt(h, m, 0)
                .ok_or_else(|| ParseError::InvalidTime("default".into()))?
        }
    };

    Ok(Preferences { name, timezone, prompt_time, project_focus: labels.project })
}

#[derive(Default)]
struct LabeledValues {
    name: Option<String>,
    timezone: Option<String>,
    time: Option<String>,
    project: Option<String>,
}

/// Classify `label: value` lines by keyword anywhere in the label.
///
/// Placeholder values (blanks, underscore runs left over from the signup
/// template) are treated as absent; the first usable value per field wins.
fn scan_labels(body: &str) -> LabeledValues {
    let mut out = LabeledValues::default();

    for line in body.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value.chars().all(|c| c == '_' || c.is_whitespace()) {
            continue;
        }

        let label = label.to_lowercase();
        let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();

        // Zone must be checked before time: a timezone label contains "time".
        let slot = if compact.contains("zone") {
            &mut out.timezone
        } else if label.contains("name") {
            &mut out.name
        } else if label.contains("time") || label.contains("prompt") {
            &mut out.time
        } else if label.contains("project") || label.contains("focus") {
            &mut out.project
        } else {
            continue;
        };

        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    out
}

/// Resolve a user-supplied zone to a canonical IANA name.
///
/// Accepts exact IANA names in any case plus a short alias list for the
/// abbreviations people actually type.
pub fn canonical_timezone(raw: &str) -> Result<String, ParseError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();

    for (alias, canonical) in ZONE_ALIASES {
        if lower == *alias {
            return Ok((*canonical).to_string());
        }
    }

    if trimmed.parse::<chrono_tz::Tz>().is_ok() {
        return Ok(trimmed.to_string());
    }
    // Case-insensitive IANA match ("america/new_york").
    for tz in chrono_tz::TZ_VARIANTS {
        if tz.name().to_lowercase() == lower {
            return Ok(tz.name().to_string());
        }
    }

    Err(ParseError::InvalidTimezone(trimmed.to_string()))
}

/// Parse a clock time like `7pm`, `7:30 PM`, `19:30`, or `19`.
pub fn parse_clock(raw: &str) -> Result<NaiveTime, ParseError> {
    let trimmed = raw.trim();
    let caps = CLOCK
        .captures(trimmed)
        .ok_or_else(|| ParseError::InvalidTime(trimmed.to_string()))?;

    let mut hour: u32 = caps[1]
        .parse()
        .map_err(|_| ParseError::InvalidTime(trimmed.to_string()))?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| ParseError::InvalidTime(trimmed.to_string()))?,
        None => 0,
    };

    if let Some(meridiem) = caps.get(3) {
        if hour == 0 || hour > 12 {
            return Err(ParseError::InvalidTime(trimmed.to_string()));
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ParseError::InvalidTime(trimmed.to_string()))
}
