//! `JournalStore` trait — the single async interface for all persistence.
//!
//! The interpreter, issuers, and dispatcher depend on this trait (passed
//! in at construction), never on a concrete backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::account::Account;
use crate::error::DatabaseError;
use crate::interpreter::preferences::Preferences;
use crate::journal::{JournalEntry, WeeklySummary};
use crate::outbox::model::{NewOutboxMessage, OutboxMessage};

/// Backend-agnostic storage trait covering accounts, entries, summaries,
/// the outbox, and inbound dedup.
#[async_trait]
pub trait JournalStore: Send + Sync {
    // ── Accounts ────────────────────────────────────────────────────

    /// Look up an account by email address (case-insensitive).
    async fn find_account_by_email(&self, email: &str)
    -> Result<Option<Account>, DatabaseError>;

    /// Create an unverified account holding a fresh verification code.
    async fn create_pending_account(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Account, DatabaseError>;

    /// Replace the active verification code (reissuance for an existing
    /// unverified account).
    async fn set_verification_code(&self, id: Uuid, code: &str) -> Result<(), DatabaseError>;

    /// Accept verification: persist preferences, set verified, clear the code.
    async fn mark_verified(&self, id: Uuid, prefs: &Preferences) -> Result<(), DatabaseError>;

    /// Pause daily prompts until `until`.
    async fn pause_account(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), DatabaseError>;

    /// Overwrite the project-focus tag.
    async fn set_project_focus(&self, id: Uuid, project: &str) -> Result<(), DatabaseError>;

    /// All verified accounts (prompt and summary candidates).
    async fn list_verified_accounts(&self) -> Result<Vec<Account>, DatabaseError>;

    // ── Journal entries ─────────────────────────────────────────────

    /// Insert or overwrite the entry for (account, date). Last write wins.
    async fn upsert_entry(
        &self,
        account_id: Uuid,
        date: NaiveDate,
        raw: &str,
        parsed: &str,
        project_tag: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Entries for an account in the inclusive date range, oldest first.
    async fn entries_between(
        &self,
        account_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<JournalEntry>, DatabaseError>;

    // ── Weekly summaries ────────────────────────────────────────────

    /// Whether a summary is already recorded for (account, week start).
    async fn summary_exists(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<bool, DatabaseError>;

    /// Record a generated summary. Uniqueness on (account, week start) is
    /// enforced here — a duplicate is a `Constraint` error.
    async fn record_summary(&self, summary: &WeeklySummary) -> Result<(), DatabaseError>;

    // ── Outbox ──────────────────────────────────────────────────────

    /// Append a pending outbox row. Duplicates are legitimate (resends).
    async fn enqueue_outbox(&self, msg: NewOutboxMessage) -> Result<Uuid, DatabaseError>;

    /// Up to `limit` pending messages whose not-before has elapsed or is
    /// unset, oldest first.
    async fn due_outbox(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DatabaseError>;

    /// Atomically claim a message for delivery (`pending` → `sending`).
    /// Returns false if another batch already claimed it.
    async fn claim_outbox(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Terminal success update: status `sent`, provider id recorded.
    async fn mark_outbox_sent(
        &self,
        id: Uuid,
        provider_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Terminal failure update: status `failed`, error recorded, retry
    /// counter incremented.
    async fn mark_outbox_failed(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    /// Operator-level replay: move a failed message back to pending.
    /// Returns false if the message was not in `failed`.
    async fn requeue_failed(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Return claims stranded in `sending` (crash recovery) to `pending`.
    /// Returns the number of rows released.
    async fn release_stale_claims(&self) -> Result<usize, DatabaseError>;

    /// Fetch one outbox row by id.
    async fn get_outbox_message(&self, id: Uuid) -> Result<Option<OutboxMessage>, DatabaseError>;

    // ── Inbound dedup ───────────────────────────────────────────────

    /// Whether an inbound message id has already been handled.
    async fn is_processed(&self, external_id: &str) -> Result<bool, DatabaseError>;

    /// Record an inbound message id as handled.
    async fn mark_processed(&self, external_id: &str) -> Result<(), DatabaseError>;
}
