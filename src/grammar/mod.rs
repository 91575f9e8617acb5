//! Command grammar — turns raw reply text into structured commands.
//!
//! Pure functions, no storage or transport dependencies. A reply body is
//! first stripped of quoted/signature boilerplate, then scanned for
//! bracketed command tags (`<pause>`, `<project>`, `<entry>`). Whatever
//! text remains after tag removal is the leftover; a tag-free reply with
//! non-empty leftover becomes an implicit journal entry, which is the
//! common case.

mod duration;

pub use duration::parse_pause_duration;

use std::sync::LazyLock;

use chrono::TimeDelta;
use regex::Regex;

use crate::error::ParseError;

/// A single structured command extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// Pause daily prompts for the given span.
    Pause(TimeDelta),
    /// Set the account's project-focus tag.
    SetProject(String),
    /// Record a journal entry with the given text.
    Entry(String),
}

/// Result of parsing one reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Commands in application order: pause, project, entry, then any
    /// implicit entry built from leftover text.
    pub commands: Vec<ParsedCommand>,
    /// Free text remaining after boilerplate and tag removal.
    pub leftover: String,
}

static PAUSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<pause>([^<]+)</pause>").unwrap());
static PROJECT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<project>([^<]+)</project>").unwrap());
static ENTRY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<entry>([^<]+)</entry>").unwrap());

/// Parse a raw email reply into commands plus leftover free text.
///
/// Fails with [`ParseError::InvalidDuration`] if a pause tag carries an
/// unparseable duration, and with [`ParseError::EmptyReply`] if nothing
/// meaningful survives boilerplate stripping.
pub fn parse_reply(raw: &str) -> Result<ParsedReply, ParseError> {
    let body = clean_reply_body(raw);

    let mut commands = Vec::new();

    for cap in PAUSE_TAG.captures_iter(&body) {
        let span = parse_pause_duration(&cap[1])?;
        commands.push(ParsedCommand::Pause(span));
    }

    for cap in PROJECT_TAG.captures_iter(&body) {
        commands.push(ParsedCommand::SetProject(cap[1].trim().to_string()));
    }

    for cap in ENTRY_TAG.captures_iter(&body) {
        commands.push(ParsedCommand::Entry(cap[1].trim().to_string()));
    }

    // Strip recognized tags to obtain the leftover free text.
    let leftover = PAUSE_TAG.replace_all(&body, "");
    let leftover = PROJECT_TAG.replace_all(&leftover, "");
    let leftover = ENTRY_TAG.replace_all(&leftover, "");
    let leftover = leftover.trim().to_string();

    // A plain-text reply with no tags is an implicit entry.
    if commands.is_empty() {
        if leftover.is_empty() {
            return Err(ParseError::EmptyReply);
        }
        commands.push(ParsedCommand::Entry(leftover.clone()));
    }

    Ok(ParsedReply { commands, leftover })
}

/// Strip quoted text, signatures, and header-like lines from a reply body.
///
/// Truncates at a localized quoting marker ("On <date>, <person> wrote:").
pub fn clean_reply_body(raw: &str) -> String {
    let mut kept = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("--")
            || line.starts_with("Sent from")
            || line.starts_with("From:")
            || line.starts_with("To:")
            || line.starts_with("Subject:")
            || line.starts_with("Date:")
            || line.starts_with('>')
        {
            continue;
        }
        // Everything after the quoting marker is the prior message.
        if line.starts_with("On ") && line.contains("wrote:") {
            break;
        }
        kept.push(line);
    }

    kept.join("\n")
}
