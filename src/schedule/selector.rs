//! Prompt eligibility — a pure predicate over account state and a clock.

use chrono::{DateTime, Timelike, Utc};

use crate::account::{Account, AccountStatus};

/// Whether `account` should receive its daily prompt at `now`.
///
/// True when the account is verified, currently active (an elapsed pause
/// counts as active), and the wall clock in the account's zone has reached
/// the hour of its preferred prompt time. Comparing local hours through
/// the IANA zone keeps the prompt at the same local time across DST
/// transitions. An unparseable zone never matches.
pub fn prompt_due(account: &Account, now: DateTime<Utc>) -> bool {
    if !account.verified || account.status(now) != AccountStatus::Active {
        return false;
    }
    account.local_hour(now) == Some(account.prompt_time.hour())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeDelta, TimeZone};
    use uuid::Uuid;

    fn account(timezone: &str, prompt_hour: u32) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            name: "Ada".into(),
            timezone: timezone.into(),
            prompt_time: NaiveTime::from_hms_opt(prompt_hour, 0, 0).unwrap(),
            verification_code: None,
            verified: true,
            paused: false,
            pause_until: None,
            project_focus: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn due_at_matching_local_hour() {
        // 19:00 UTC in winter is 14:00 in New York.
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap();
        assert!(prompt_due(&account("America/New_York", 14), winter));
        assert!(!prompt_due(&account("America/New_York", 15), winter));
    }

    #[test]
    fn dst_shifts_the_utc_hour_not_the_local_one() {
        let acct = account("America/New_York", 15);
        // Same 19:00 UTC instant is 15:00 local in summer, 14:00 in winter.
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 19, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap();
        assert!(prompt_due(&acct, summer));
        assert!(!prompt_due(&acct, winter));
    }

    #[test]
    fn unverified_and_paused_accounts_never_match() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let mut acct = account("UTC", 12);
        assert!(prompt_due(&acct, now));

        acct.verified = false;
        assert!(!prompt_due(&acct, now));

        acct.verified = true;
        acct.paused = true;
        acct.pause_until = Some(now + TimeDelta::days(3));
        assert!(!prompt_due(&acct, now));

        // Pause deadline in the past reads as active again.
        acct.pause_until = Some(now - TimeDelta::hours(1));
        assert!(prompt_due(&acct, now));
    }

    #[test]
    fn bad_timezone_never_matches() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert!(!prompt_due(&account("Mars/Olympus", 12), now));
    }
}
