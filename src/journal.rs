//! Journal entry and weekly summary models.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use uuid::Uuid;

/// One journal entry per (account, calendar date). A same-day resubmission
/// overwrites the prior entry; last write wins.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_date: NaiveDate,
    /// Reply text as received (post boilerplate stripping).
    pub raw_content: String,
    /// Reply text with command tags removed.
    pub parsed_content: String,
    /// Project focus captured at write time.
    pub project_tag: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated weekly summary, unique per (account, week start).
#[derive(Debug, Clone)]
pub struct WeeklySummary {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Monday of the summarized week.
    pub week_start: NaiveDate,
    pub paragraph: String,
    pub bullet_points: Vec<String>,
    pub model: String,
    pub cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// The Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    date - chrono::TimeDelta::days(days_from_monday)
}

/// The Friday closing the Monday-started week.
pub fn week_end(start: NaiveDate) -> NaiveDate {
    start + chrono::TimeDelta::days(4)
}

/// Whether `date` falls in the Monday–Friday window starting at `start`.
pub fn in_week_window(start: NaiveDate, date: NaiveDate) -> bool {
    date >= start && date <= week_end(start)
}
