//! Reply interpretation engine.
//!
//! Every inbound email lands here. The interpreter decides which lifecycle
//! branch applies (signup, verification, active commands), mutates the
//! store, and queues any outbound response through the outbox. It never
//! sends mail directly.

pub mod preferences;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::account::{Account, AccountStatus};
use crate::error::{Error, ParseError, Result};
use crate::grammar::{self, ParsedCommand};
use crate::outbox::model::{MessageCategory, NewOutboxMessage};
use crate::render;
use crate::store::JournalStore;

use preferences::Preferences;

/// What an inbound reply ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// New address; a verification email was queued.
    SignupStarted,
    /// Known unverified address asked to sign up again; a fresh code was queued.
    CodeReissued,
    /// Verification succeeded and preferences were stored.
    Verified,
    /// Commands from an active account were applied.
    CommandsApplied {
        entries: usize,
        paused: bool,
        project_updated: bool,
    },
    /// The reply could not be interpreted; one clarification was queued.
    ClarificationSent,
}

/// Keywords that signal signup intent in a first-contact email.
const SIGNUP_KEYWORDS: &[&str] = &[
    "verify",
    "verification",
    "confirm",
    "confirmation",
    "activate",
    "activation",
    "sign up",
    "signup",
    "start",
    "begin",
];

pub struct ReplyInterpreter {
    store: Arc<dyn JournalStore>,
}

impl ReplyInterpreter {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Interpret one inbound reply end to end.
    pub async fn handle_reply(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ReplyOutcome> {
        let sender = sender.trim().to_lowercase();

        let Some(account) = self.store.find_account_by_email(&sender).await? else {
            if has_signup_intent(subject, body) {
                self.request_signup(&sender).await?;
                return Ok(ReplyOutcome::SignupStarted);
            }
            return Err(Error::UnknownSender { email: sender });
        };

        match account.status(now) {
            AccountStatus::AwaitingVerification => {
                if has_signup_intent(subject, body) && !body_contains_code(&account, body) {
                    self.reissue_code(&account).await?;
                    return Ok(ReplyOutcome::CodeReissued);
                }
                self.handle_verification(&account, body).await
            }
            AccountStatus::Active | AccountStatus::Paused => {
                self.handle_commands(&account, body, now).await
            }
        }
    }

    /// Start signup for a never-seen address: create the pending account
    /// and queue the verification email.
    pub async fn request_signup(&self, email: &str) -> Result<Uuid> {
        let code = generate_code();
        let account = self.store.create_pending_account(email, &code).await?;
        let (subject, body) = render::verification_email(&code);
        self.store
            .enqueue_outbox(NewOutboxMessage::new(
                Some(account.id),
                &account.email,
                MessageCategory::Verification,
                &subject,
                &body,
            ))
            .await?;
        info!(email = %account.email, "Signup started, verification queued");
        Ok(account.id)
    }

    async fn reissue_code(&self, account: &Account) -> Result<()> {
        let code = generate_code();
        self.store.set_verification_code(account.id, &code).await?;
        let (subject, body) = render::verification_email(&code);
        self.store
            .enqueue_outbox(NewOutboxMessage::new(
                Some(account.id),
                &account.email,
                MessageCategory::Verification,
                &subject,
                &body,
            ))
            .await?;
        info!(email = %account.email, "Verification code reissued");
        Ok(())
    }

    async fn handle_verification(&self, account: &Account, body: &str) -> Result<ReplyOutcome> {
        if !body_contains_code(account, body) {
            warn!(email = %account.email, "Verification reply without matching code");
            self.queue_clarification(account, "We couldn't find your verification code in that reply. Please reply with the 6-digit code from your signup email.")
                .await?;
            return Ok(ReplyOutcome::ClarificationSent);
        }

        let prefs = match preferences::parse_preferences(body) {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!(email = %account.email, error = %err, "Verification reply with unusable preferences");
                self.queue_clarification(account, &verification_hint(&err)).await?;
                return Ok(ReplyOutcome::ClarificationSent);
            }
        };

        self.store.mark_verified(account.id, &prefs).await?;
        let (subject, body) = render::welcome_email(&prefs.name, prefs.prompt_time);
        self.store
            .enqueue_outbox(NewOutboxMessage::new(
                Some(account.id),
                &account.email,
                MessageCategory::Verification,
                &subject,
                &body,
            ))
            .await?;
        info!(email = %account.email, "Account verified");
        Ok(ReplyOutcome::Verified)
    }

    async fn handle_commands(
        &self,
        account: &Account,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ReplyOutcome> {
        let parsed = match grammar::parse_reply(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(email = %account.email, error = %err, "Unreadable reply");
                self.queue_clarification(account, &command_hint(&err)).await?;
                return Ok(ReplyOutcome::ClarificationSent);
            }
        };

        // The sender always hears back: a mid-application failure still
        // produces one clarification rather than silence.
        match self.apply_commands(account, parsed.commands, body, now).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(email = %account.email, error = %err, "Reply commands failed mid-application");
                let hint = match &err {
                    Error::Parse(parse_err) => command_hint(parse_err),
                    _ => "We hit a problem saving that reply, so it may not have been recorded. Please send it again in a little while.".to_string(),
                };
                self.queue_clarification(account, &hint).await?;
                Ok(ReplyOutcome::ClarificationSent)
            }
        }
    }

    async fn apply_commands(
        &self,
        account: &Account,
        commands: Vec<ParsedCommand>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ReplyOutcome> {
        let mut entries = 0;
        let mut paused = false;
        let mut project_updated = false;
        // A project set earlier in the same reply tags later entries.
        let mut focus = account.project_focus.clone();

        for command in commands {
            match command {
                ParsedCommand::Pause(delta) => {
                    let until = now.checked_add_signed(delta).ok_or_else(|| {
                        Error::Parse(ParseError::InvalidDuration(format!(
                            "{} days",
                            delta.num_days()
                        )))
                    })?;
                    self.store.pause_account(account.id, until).await?;
                    paused = true;
                }
                ParsedCommand::SetProject(project) => {
                    self.store.set_project_focus(account.id, &project).await?;
                    focus = Some(project);
                    project_updated = true;
                }
                ParsedCommand::Entry(text) => {
                    let date = local_date(account, now);
                    self.store
                        .upsert_entry(account.id, date, body, &text, focus.as_deref())
                        .await?;
                    entries += 1;
                }
            }
        }

        info!(
            email = %account.email,
            entries, paused, project_updated,
            "Reply commands applied"
        );
        Ok(ReplyOutcome::CommandsApplied { entries, paused, project_updated })
    }

    async fn queue_clarification(&self, account: &Account, hint: &str) -> Result<()> {
        let (subject, body) = render::clarification_email(hint);
        self.store
            .enqueue_outbox(NewOutboxMessage::new(
                Some(account.id),
                &account.email,
                MessageCategory::Clarification,
                &subject,
                &body,
            ))
            .await?;
        Ok(())
    }
}

fn has_signup_intent(subject: &str, body: &str) -> bool {
    let haystack = format!("{} {}", subject.to_lowercase(), body.to_lowercase());
    SIGNUP_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Case-insensitive substring match of the stored code anywhere in the body.
fn body_contains_code(account: &Account, body: &str) -> bool {
    match account.verification_code.as_deref() {
        Some(code) if !code.is_empty() => body.to_lowercase().contains(&code.to_lowercase()),
        _ => false,
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

/// The account's current local date, falling back to UTC for a bad zone.
fn local_date(account: &Account, now: DateTime<Utc>) -> chrono::NaiveDate {
    match account.timezone.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).date_naive(),
        Err(_) => now.date_naive(),
    }
}

fn verification_hint(err: &ParseError) -> String {
    match err {
        ParseError::MissingPreference { field } => format!(
            "Your code checked out, but we still need your {field}. Please reply again with every line filled in:\n\nName: \nTimezone: \nPrompt time: \nProject: "
        ),
        ParseError::InvalidTimezone(zone) => format!(
            "We didn't recognize the timezone \"{zone}\". Please use an IANA name like America/New_York or a common abbreviation like PST."
        ),
        ParseError::InvalidTime(time) => format!(
            "We couldn't read the prompt time \"{time}\". Try something like 7pm or 19:30."
        ),
        other => format!("We couldn't finish your signup: {other}. Please reply again with the form filled in."),
    }
}

fn command_hint(err: &ParseError) -> String {
    match err {
        ParseError::EmptyReply => {
            "Your reply looked empty once we trimmed the quoted text. Just write what you got done, or use <pause>2 weeks</pause> to take a break.".to_string()
        }
        ParseError::InvalidDuration(raw) => format!(
            "We couldn't read the pause length \"{raw}\". Try <pause>tomorrow</pause>, <pause>next week</pause>, or <pause>3 days</pause>."
        ),
        other => format!("We couldn't read that reply: {other}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::model::OutboxStatus;
    use crate::store::LibSqlStore;
    use chrono::{NaiveTime, TimeDelta};

    async fn setup() -> (Arc<LibSqlStore>, ReplyInterpreter) {
        let store = Arc::new(LibSqlStore::open_in_memory().await.unwrap());
        let interp = ReplyInterpreter::new(store.clone());
        (store, interp)
    }

    async fn verified_account(store: &LibSqlStore, email: &str) -> Account {
        let acct = store.create_pending_account(email, "123456").await.unwrap();
        let prefs = Preferences {
            name: "Ada".into(),
            timezone: "America/New_York".into(),
            prompt_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            project_focus: None,
        };
        store.mark_verified(acct.id, &prefs).await.unwrap();
        store.find_account_by_email(email).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn unknown_sender_without_intent_is_rejected() {
        let (_store, interp) = setup().await;
        let err = interp
            .handle_reply("stranger@x.com", "Re: hi", "what is this", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSender { .. }));
    }

    #[tokio::test]
    async fn signup_intent_creates_account_and_queues_verification() {
        let (store, interp) = setup().await;
        let outcome = interp
            .handle_reply("New@X.com", "Sign up please", "I'd like to start", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::SignupStarted);

        let acct = store.find_account_by_email("new@x.com").await.unwrap().unwrap();
        assert!(!acct.verified);
        assert!(acct.verification_code.is_some());

        let due = store.due_outbox(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].category, MessageCategory::Verification);
        assert_eq!(due[0].status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn verification_with_code_and_preferences_activates() {
        let (store, interp) = setup().await;
        let acct = store.create_pending_account("a@b.c", "654321").await.unwrap();

        let body = "654321\nName: Ada\nTimezone: pst\nPrompt time: 9am\n";
        let outcome = interp
            .handle_reply("a@b.c", "Re: verify", body, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::Verified);

        let acct = store.find_account_by_email("a@b.c").await.unwrap().unwrap();
        assert!(acct.verified);
        assert!(acct.verification_code.is_none());
        assert_eq!(acct.timezone, "America/Los_Angeles");
        assert_eq!(acct.prompt_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn wrong_code_sends_exactly_one_clarification_and_no_mutation() {
        let (store, interp) = setup().await;
        store.create_pending_account("a@b.c", "654321").await.unwrap();

        let outcome = interp
            .handle_reply("a@b.c", "Re: your journal", "000000\nName: Ada\nTimezone: UTC", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::ClarificationSent);

        let acct = store.find_account_by_email("a@b.c").await.unwrap().unwrap();
        assert!(!acct.verified);

        let due = store.due_outbox(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].category, MessageCategory::Clarification);
    }

    #[tokio::test]
    async fn plain_reply_becomes_entry() {
        let (store, interp) = setup().await;
        let acct = verified_account(&store, "a@b.c").await;
        let now = Utc::now();

        let outcome = interp
            .handle_reply("a@b.c", "Re: prompt", "Shipped the parser rewrite.", now)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::CommandsApplied { entries: 1, paused: false, project_updated: false }
        );

        let date = local_date(&acct, now);
        let entries = store.entries_between(acct.id, date, date).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].parsed_content, "Shipped the parser rewrite.");
    }

    #[tokio::test]
    async fn project_set_in_same_reply_tags_entry() {
        let (store, interp) = setup().await;
        let acct = verified_account(&store, "a@b.c").await;
        let now = Utc::now();

        interp
            .handle_reply(
                "a@b.c",
                "Re: prompt",
                "<project>rewrite</project><entry>Finished the lexer.</entry>",
                now,
            )
            .await
            .unwrap();

        let date = local_date(&acct, now);
        let entries = store.entries_between(acct.id, date, date).await.unwrap();
        assert_eq!(entries[0].project_tag.as_deref(), Some("rewrite"));

        let acct = store.find_account_by_email("a@b.c").await.unwrap().unwrap();
        assert_eq!(acct.project_focus.as_deref(), Some("rewrite"));
    }

    #[tokio::test]
    async fn pause_command_pauses_until_deadline() {
        let (store, interp) = setup().await;
        let acct = verified_account(&store, "a@b.c").await;
        let now = Utc::now();

        let outcome = interp
            .handle_reply("a@b.c", "Re: prompt", "<pause>2 weeks</pause>", now)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::CommandsApplied { entries: 0, paused: true, project_updated: false }
        );

        let acct = store.find_account_by_email(&acct.email).await.unwrap().unwrap();
        assert_eq!(acct.status(now), AccountStatus::Paused);
        assert_eq!(acct.pause_until, Some(now + TimeDelta::days(14)));
        // Lazy expiry: past the deadline the account reads as active.
        assert_eq!(acct.status(now + TimeDelta::days(15)), AccountStatus::Active);
    }

    #[tokio::test]
    async fn boilerplate_only_reply_gets_clarification() {
        let (store, interp) = setup().await;
        verified_account(&store, "a@b.c").await;

        let outcome = interp
            .handle_reply(
                "a@b.c",
                "Re: prompt",
                "\n> What did you get done today?\nSent from my iPhone\n",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::ClarificationSent);

        let due = store.due_outbox(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].category, MessageCategory::Clarification);
    }

    /// Store wrapper whose entry writes always fail, for exercising the
    /// mid-application failure path.
    struct EntryWriteFault {
        inner: Arc<LibSqlStore>,
    }

    #[async_trait::async_trait]
    impl JournalStore for EntryWriteFault {
        async fn find_account_by_email(
            &self,
            email: &str,
        ) -> std::result::Result<Option<Account>, crate::error::DatabaseError> {
            self.inner.find_account_by_email(email).await
        }

        async fn create_pending_account(
            &self,
            email: &str,
            code: &str,
        ) -> std::result::Result<Account, crate::error::DatabaseError> {
            self.inner.create_pending_account(email, code).await
        }

        async fn set_verification_code(
            &self,
            id: Uuid,
            code: &str,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.set_verification_code(id, code).await
        }

        async fn mark_verified(
            &self,
            id: Uuid,
            prefs: &Preferences,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.mark_verified(id, prefs).await
        }

        async fn pause_account(
            &self,
            id: Uuid,
            until: DateTime<Utc>,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.pause_account(id, until).await
        }

        async fn set_project_focus(
            &self,
            id: Uuid,
            project: &str,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.set_project_focus(id, project).await
        }

        async fn list_verified_accounts(
            &self,
        ) -> std::result::Result<Vec<Account>, crate::error::DatabaseError> {
            self.inner.list_verified_accounts().await
        }

        async fn upsert_entry(
            &self,
            _account_id: Uuid,
            _date: chrono::NaiveDate,
            _raw: &str,
            _parsed: &str,
            _project_tag: Option<&str>,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            Err(crate::error::DatabaseError::Query("disk I/O error".into()))
        }

        async fn entries_between(
            &self,
            account_id: Uuid,
            from: chrono::NaiveDate,
            to: chrono::NaiveDate,
        ) -> std::result::Result<Vec<crate::journal::JournalEntry>, crate::error::DatabaseError>
        {
            self.inner.entries_between(account_id, from, to).await
        }

        async fn summary_exists(
            &self,
            account_id: Uuid,
            week_start: chrono::NaiveDate,
        ) -> std::result::Result<bool, crate::error::DatabaseError> {
            self.inner.summary_exists(account_id, week_start).await
        }

        async fn record_summary(
            &self,
            summary: &crate::journal::WeeklySummary,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.record_summary(summary).await
        }

        async fn enqueue_outbox(
            &self,
            msg: NewOutboxMessage,
        ) -> std::result::Result<Uuid, crate::error::DatabaseError> {
            self.inner.enqueue_outbox(msg).await
        }

        async fn due_outbox(
            &self,
            limit: usize,
            now: DateTime<Utc>,
        ) -> std::result::Result<Vec<crate::outbox::model::OutboxMessage>, crate::error::DatabaseError>
        {
            self.inner.due_outbox(limit, now).await
        }

        async fn claim_outbox(
            &self,
            id: Uuid,
        ) -> std::result::Result<bool, crate::error::DatabaseError> {
            self.inner.claim_outbox(id).await
        }

        async fn mark_outbox_sent(
            &self,
            id: Uuid,
            provider_id: &str,
            at: DateTime<Utc>,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.mark_outbox_sent(id, provider_id, at).await
        }

        async fn mark_outbox_failed(
            &self,
            id: Uuid,
            error: &str,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.mark_outbox_failed(id, error).await
        }

        async fn requeue_failed(
            &self,
            id: Uuid,
        ) -> std::result::Result<bool, crate::error::DatabaseError> {
            self.inner.requeue_failed(id).await
        }

        async fn release_stale_claims(
            &self,
        ) -> std::result::Result<usize, crate::error::DatabaseError> {
            self.inner.release_stale_claims().await
        }

        async fn get_outbox_message(
            &self,
            id: Uuid,
        ) -> std::result::Result<Option<crate::outbox::model::OutboxMessage>, crate::error::DatabaseError>
        {
            self.inner.get_outbox_message(id).await
        }

        async fn is_processed(
            &self,
            external_id: &str,
        ) -> std::result::Result<bool, crate::error::DatabaseError> {
            self.inner.is_processed(external_id).await
        }

        async fn mark_processed(
            &self,
            external_id: &str,
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            self.inner.mark_processed(external_id).await
        }
    }

    #[tokio::test]
    async fn storage_fault_mid_reply_queues_one_clarification() {
        let inner = Arc::new(LibSqlStore::open_in_memory().await.unwrap());
        verified_account(&inner, "a@b.c").await;
        let faulty = Arc::new(EntryWriteFault { inner: inner.clone() });
        let interp = ReplyInterpreter::new(faulty);
        let now = Utc::now();

        let outcome = interp
            .handle_reply(
                "a@b.c",
                "Re: prompt",
                "<pause>2 days</pause><entry>did stuff</entry>",
                now,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::ClarificationSent);

        let due = inner.due_outbox(10, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].category, MessageCategory::Clarification);
    }

    #[tokio::test]
    async fn pause_past_calendar_range_gets_clarification_not_panic() {
        let (store, interp) = setup().await;
        let acct = verified_account(&store, "a@b.c").await;
        let now = Utc::now();

        // Within the span parser's bounds but past what a timestamp can hold.
        let outcome = interp
            .handle_reply("a@b.c", "Re: prompt", "<pause>99999999999 days</pause>", now)
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::ClarificationSent);

        let refreshed = store.find_account_by_email(&acct.email).await.unwrap().unwrap();
        assert_eq!(refreshed.status(now), AccountStatus::Active);

        let due = store.due_outbox(10, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].category, MessageCategory::Clarification);
    }

    #[tokio::test]
    async fn signup_intent_from_unverified_account_reissues_code() {
        let (store, interp) = setup().await;
        let acct = store.create_pending_account("a@b.c", "111111").await.unwrap();

        let outcome = interp
            .handle_reply("a@b.c", "verify", "I lost my code, please sign me up again", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::CodeReissued);

        let refreshed = store.find_account_by_email("a@b.c").await.unwrap().unwrap();
        assert!(refreshed.verification_code.is_some());
        assert_ne!(refreshed.verification_code, acct.verification_code);
    }
}
