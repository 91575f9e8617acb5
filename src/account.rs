//! Account model and lifecycle.
//!
//! The persisted record is flat; the lifecycle is derived. An account with
//! a verification code and `verified == false` is awaiting verification
//! (first issuance and reissuance look identical in storage). Paused vs.
//! active is a function of the paused flag and whether `pause_until` has
//! elapsed — expiry is evaluated lazily at read time, never written back.

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

/// Derived lifecycle state of an account at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Verification code issued, reply not yet accepted.
    AwaitingVerification,
    /// Verified and receiving daily prompts.
    Active,
    /// Verified, prompts suppressed until `pause_until` (or indefinitely).
    Paused,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingVerification => write!(f, "awaiting_verification"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// A journaling account, one per email address.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    /// Unique, stored lowercase; comparisons are case-insensitive.
    pub email: String,
    pub name: String,
    /// IANA zone identifier, validated at preference time.
    pub timezone: String,
    /// Preferred local prompt time of day.
    pub prompt_time: NaiveTime,
    /// Single active verification code, cleared on verification.
    pub verification_code: Option<String>,
    pub verified: bool,
    pub paused: bool,
    /// Absent while paused means paused indefinitely.
    pub pause_until: Option<DateTime<Utc>>,
    /// Current project-focus tag applied to new entries.
    pub project_focus: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Lifecycle state at `at`, normalizing lapsed pauses without a write.
    pub fn status(&self, at: DateTime<Utc>) -> AccountStatus {
        if !self.verified {
            return AccountStatus::AwaitingVerification;
        }
        if self.paused {
            match self.pause_until {
                Some(until) if until <= at => AccountStatus::Active,
                _ => AccountStatus::Paused,
            }
        } else {
            AccountStatus::Active
        }
    }

    /// The account's local clock hour at `at`, honoring daylight saving.
    ///
    /// Returns `None` if the stored zone no longer resolves (zone database
    /// drift); such accounts are skipped by the scheduler.
    pub fn local_hour(&self, at: DateTime<Utc>) -> Option<u32> {
        let tz: Tz = self.timezone.parse().ok()?;
        Some(at.with_timezone(&tz).hour())
    }
}
