//! libSQL backend — async `JournalStore` implementation.
//!
//! Supports local file and in-memory databases. All timestamps are stored
//! as RFC 3339 text, dates as `YYYY-MM-DD`, times of day as `HH:MM:SS`.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::account::Account;
use crate::error::DatabaseError;
use crate::interpreter::preferences::Preferences;
use crate::journal::{JournalEntry, WeeklySummary};
use crate::outbox::model::{MessageCategory, NewOutboxMessage, OutboxMessage, OutboxStatus};
use crate::store::migrations;
use crate::store::traits::JournalStore;

/// libSQL database backend.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn open_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self { db: Arc::new(db), conn })
    }

    /// Create an in-memory database (for tests).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self { db: Arc::new(db), conn })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> DatabaseError {
    let text = e.to_string();
    if text.contains("UNIQUE constraint") {
        DatabaseError::Constraint(text)
    } else {
        DatabaseError::Query(text)
    }
}

/// Parse an RFC 3339 or SQLite datetime string into `DateTime<Utc>`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .unwrap_or(NaiveTime::MIN)
}

/// Convert `Option<&str>` to a libsql value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, name, timezone, prompt_time, verification_code, \
     verified, paused, pause_until, project_focus, created_at, updated_at";

const ENTRY_COLUMNS: &str =
    "id, account_id, entry_date, raw_content, parsed_content, project_tag, created_at, updated_at";

const OUTBOX_COLUMNS: &str = "id, account_id, recipient, category, subject, body, status, \
     provider_message_id, last_error, retry_count, not_before, sent_at, created_at, updated_at";

/// Map a libsql row (ACCOUNT_COLUMNS order) to an Account.
fn row_to_account(row: &libsql::Row) -> Result<Account, libsql::Error> {
    let id_str: String = row.get(0)?;
    let prompt_time_str: String = row.get(4)?;
    let verification_code: Option<String> = row.get(5).ok();
    let verified: i64 = row.get(6)?;
    let paused: i64 = row.get(7)?;
    let pause_until: Option<String> = row.get(8).ok();
    let project_focus: Option<String> = row.get(9).ok();
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;

    Ok(Account {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        email: row.get(1)?,
        name: row.get(2)?,
        timezone: row.get(3)?,
        prompt_time: parse_time(&prompt_time_str),
        verification_code,
        verified: verified != 0,
        paused: paused != 0,
        pause_until: parse_optional_datetime(pause_until),
        project_focus,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql row (ENTRY_COLUMNS order) to a JournalEntry.
fn row_to_entry(row: &libsql::Row) -> Result<JournalEntry, libsql::Error> {
    let id_str: String = row.get(0)?;
    let account_str: String = row.get(1)?;
    let date_str: String = row.get(2)?;
    let project_tag: Option<String> = row.get(5).ok();
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(JournalEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        account_id: Uuid::parse_str(&account_str).unwrap_or_else(|_| Uuid::nil()),
        entry_date: parse_date(&date_str),
        raw_content: row.get(3)?,
        parsed_content: row.get(4)?,
        project_tag,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql row (OUTBOX_COLUMNS order) to an OutboxMessage.
fn row_to_outbox(row: &libsql::Row) -> Result<OutboxMessage, libsql::Error> {
    let id_str: String = row.get(0)?;
    let account_str: Option<String> = row.get(1).ok();
    let category_str: String = row.get(3)?;
    let status_str: String = row.get(6)?;
    let provider_message_id: Option<String> = row.get(7).ok();
    let last_error: Option<String> = row.get(8).ok();
    let retry_count: i64 = row.get(9)?;
    let not_before: Option<String> = row.get(10).ok();
    let sent_at: Option<String> = row.get(11).ok();
    let created_str: String = row.get(12)?;
    let updated_str: String = row.get(13)?;

    Ok(OutboxMessage {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        account_id: account_str.and_then(|s| Uuid::parse_str(&s).ok()),
        recipient: row.get(2)?,
        category: MessageCategory::from_str(&category_str)
            .unwrap_or(MessageCategory::Clarification),
        subject: row.get(4)?,
        body: row.get(5)?,
        status: OutboxStatus::from_str(&status_str).unwrap_or(OutboxStatus::Pending),
        provider_message_id,
        last_error,
        retry_count,
        not_before: parse_optional_datetime(not_before),
        sent_at: parse_optional_datetime(sent_at),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl JournalStore for LibSqlStore {
    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
                params![email.trim().to_lowercase()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_account(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn create_pending_account(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Account, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let email = email.trim().to_lowercase();

        self.conn()
            .execute(
                "INSERT INTO accounts
                     (id, email, name, timezone, verification_code, created_at, updated_at)
                 VALUES (?1, ?2, 'New User', 'UTC', ?3, ?4, ?4)",
                params![id.to_string(), email.clone(), code, now.to_rfc3339()],
            )
            .await
            .map_err(query_err)?;

        self.find_account_by_email(&email)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "account".into(),
                id: id.to_string(),
            })
    }

    async fn set_verification_code(&self, id: Uuid, code: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET verification_code = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), code, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, prefs: &Preferences) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts
                 SET name = ?2, timezone = ?3, prompt_time = ?4, project_focus = ?5,
                     verified = 1, verification_code = NULL, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    prefs.name.clone(),
                    prefs.timezone.clone(),
                    prefs.prompt_time.format("%H:%M:%S").to_string(),
                    opt_text(prefs.project_focus.as_deref()),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn pause_account(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET paused = 1, pause_until = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), until.to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn set_project_focus(&self, id: Uuid, project: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET project_focus = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), project, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_verified_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE verified = 1 ORDER BY email"
                ),
                (),
            )
            .await
            .map_err(query_err)?;

        let mut accounts = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            accounts.push(row_to_account(&row).map_err(query_err)?);
        }
        Ok(accounts)
    }

    async fn upsert_entry(
        &self,
        account_id: Uuid,
        date: NaiveDate,
        raw: &str,
        parsed: &str,
        project_tag: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO entries
                     (id, account_id, entry_date, raw_content, parsed_content, project_tag,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (account_id, entry_date) DO UPDATE SET
                     raw_content = excluded.raw_content,
                     parsed_content = excluded.parsed_content,
                     project_tag = excluded.project_tag,
                     updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    account_id.to_string(),
                    date.format("%Y-%m-%d").to_string(),
                    raw,
                    parsed,
                    opt_text(project_tag),
                    now
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn entries_between(
        &self,
        account_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<JournalEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries
                     WHERE account_id = ?1 AND entry_date >= ?2 AND entry_date <= ?3
                     ORDER BY entry_date ASC"
                ),
                params![
                    account_id.to_string(),
                    from.format("%Y-%m-%d").to_string(),
                    to.format("%Y-%m-%d").to_string()
                ],
            )
            .await
            .map_err(query_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            entries.push(row_to_entry(&row).map_err(query_err)?);
        }
        Ok(entries)
    }

    async fn summary_exists(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM weekly_summaries WHERE account_id = ?1 AND week_start = ?2",
                params![
                    account_id.to_string(),
                    week_start.format("%Y-%m-%d").to_string()
                ],
            )
            .await
            .map_err(query_err)?;

        let count: i64 = match rows.next().await.map_err(query_err)? {
            Some(row) => row.get(0).map_err(query_err)?,
            None => 0,
        };
        Ok(count > 0)
    }

    async fn record_summary(&self, summary: &WeeklySummary) -> Result<(), DatabaseError> {
        let bullets = serde_json::to_string(&summary.bullet_points)
            .map_err(|e| DatabaseError::Query(format!("Failed to encode bullet points: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO weekly_summaries
                     (id, account_id, week_start, paragraph, bullet_points, model, cost_cents,
                      created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    summary.id.to_string(),
                    summary.account_id.to_string(),
                    summary.week_start.format("%Y-%m-%d").to_string(),
                    summary.paragraph.clone(),
                    bullets,
                    summary.model.clone(),
                    summary.cost_cents,
                    summary.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn enqueue_outbox(&self, msg: NewOutboxMessage) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO outbox
                     (id, account_id, recipient, category, subject, body, status, not_before,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?8)",
                params![
                    id.to_string(),
                    opt_text(msg.account_id.map(|a| a.to_string()).as_deref()),
                    msg.recipient,
                    msg.category.as_str(),
                    msg.subject,
                    msg.body,
                    opt_text(msg.not_before.map(|t| t.to_rfc3339()).as_deref()),
                    now
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn due_outbox(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {OUTBOX_COLUMNS} FROM outbox
                     WHERE status = 'pending' AND (not_before IS NULL OR not_before <= ?1)
                     ORDER BY created_at ASC
                     LIMIT ?2"
                ),
                params![now.to_rfc3339(), limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            messages.push(row_to_outbox(&row).map_err(query_err)?);
        }
        Ok(messages)
    }

    async fn claim_outbox(&self, id: Uuid) -> Result<bool, DatabaseError> {
        // Single conditional update: the status check makes the claim
        // atomic, so overlapping batches never both send one message.
        let changed = self
            .conn()
            .execute(
                "UPDATE outbox SET status = 'sending', updated_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(changed == 1)
    }

    async fn mark_outbox_sent(
        &self,
        id: Uuid,
        provider_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE outbox
                 SET status = 'sent', provider_message_id = ?2, sent_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                params![id.to_string(), provider_id, at.to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn mark_outbox_failed(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE outbox
                 SET status = 'failed', last_error = ?2, retry_count = retry_count + 1,
                     updated_at = ?3
                 WHERE id = ?1",
                params![id.to_string(), error, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn requeue_failed(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE outbox SET status = 'pending', updated_at = ?2
                 WHERE id = ?1 AND status = 'failed'",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(changed == 1)
    }

    async fn release_stale_claims(&self) -> Result<usize, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE outbox SET status = 'pending', updated_at = ?1 WHERE status = 'sending'",
                params![Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(changed as usize)
    }

    async fn get_outbox_message(
        &self,
        id: Uuid,
    ) -> Result<Option<OutboxMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {OUTBOX_COLUMNS} FROM outbox WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_outbox(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn is_processed(&self, external_id: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM processed_messages WHERE external_id = ?1",
                params![external_id],
            )
            .await
            .map_err(query_err)?;

        let count: i64 = match rows.next().await.map_err(query_err)? {
            Some(row) => row.get(0).map_err(query_err)?,
            None => 0,
        };
        Ok(count > 0)
    }

    async fn mark_processed(&self, external_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO processed_messages (external_id, processed_at)
                 VALUES (?1, ?2)",
                params![external_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::model::MessageCategory;
    use chrono::TimeDelta;

    async fn store() -> LibSqlStore {
        LibSqlStore::open_in_memory().await.unwrap()
    }

    fn prefs() -> Preferences {
        Preferences {
            name: "Ada".into(),
            timezone: "America/New_York".into(),
            prompt_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            project_focus: Some("infra".into()),
        }
    }

    #[tokio::test]
    async fn account_roundtrip_and_case_insensitive_lookup() {
        let store = store().await;
        let acct = store
            .create_pending_account("Ada@Example.COM", "123456")
            .await
            .unwrap();
        assert_eq!(acct.email, "ada@example.com");
        assert!(!acct.verified);
        assert_eq!(acct.verification_code.as_deref(), Some("123456"));

        let found = store
            .find_account_by_email("ADA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, acct.id);
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = store().await;
        store.create_pending_account("x@y.z", "111111").await.unwrap();
        let dup = store.create_pending_account("X@Y.Z", "222222").await;
        assert!(matches!(dup, Err(DatabaseError::Constraint(_))));
    }

    #[tokio::test]
    async fn verification_persists_preferences_and_clears_code() {
        let store = store().await;
        let acct = store.create_pending_account("x@y.z", "123456").await.unwrap();
        store.mark_verified(acct.id, &prefs()).await.unwrap();

        let acct = store.find_account_by_email("x@y.z").await.unwrap().unwrap();
        assert!(acct.verified);
        assert!(acct.verification_code.is_none());
        assert_eq!(acct.name, "Ada");
        assert_eq!(acct.timezone, "America/New_York");
        assert_eq!(acct.prompt_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(acct.project_focus.as_deref(), Some("infra"));
    }

    #[tokio::test]
    async fn entry_upsert_is_last_write_wins() {
        let store = store().await;
        let acct = store.create_pending_account("x@y.z", "123456").await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();

        store
            .upsert_entry(acct.id, date, "first", "first", None)
            .await
            .unwrap();
        store
            .upsert_entry(acct.id, date, "second", "second", Some("infra"))
            .await
            .unwrap();

        let entries = store.entries_between(acct.id, date, date).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_content, "second");
        assert_eq!(entries[0].project_tag.as_deref(), Some("infra"));
    }

    #[tokio::test]
    async fn outbox_claim_is_exclusive() {
        let store = store().await;
        let id = store
            .enqueue_outbox(NewOutboxMessage::new(
                None,
                "x@y.z",
                MessageCategory::Verification,
                "Welcome",
                "body",
            ))
            .await
            .unwrap();

        assert!(store.claim_outbox(id).await.unwrap());
        // Second claim must lose.
        assert!(!store.claim_outbox(id).await.unwrap());
    }

    #[tokio::test]
    async fn due_outbox_honors_not_before_and_order() {
        let store = store().await;
        let now = Utc::now();

        let deferred = store
            .enqueue_outbox(
                NewOutboxMessage::new(None, "a@b.c", MessageCategory::DailyPrompt, "s", "b")
                    .not_before(now + TimeDelta::hours(1)),
            )
            .await
            .unwrap();
        let ready = store
            .enqueue_outbox(NewOutboxMessage::new(
                None,
                "a@b.c",
                MessageCategory::DailyPrompt,
                "s",
                "b",
            ))
            .await
            .unwrap();

        let due = store.due_outbox(10, now).await.unwrap();
        let ids: Vec<Uuid> = due.iter().map(|m| m.id).collect();
        assert!(ids.contains(&ready));
        assert!(!ids.contains(&deferred));
    }

    #[tokio::test]
    async fn failed_requeue_and_stale_release() {
        let store = store().await;
        let id = store
            .enqueue_outbox(NewOutboxMessage::new(
                None,
                "a@b.c",
                MessageCategory::Clarification,
                "s",
                "b",
            ))
            .await
            .unwrap();

        assert!(store.claim_outbox(id).await.unwrap());
        store.mark_outbox_failed(id, "550 mailbox unavailable").await.unwrap();

        let msg = store.get_outbox_message(id).await.unwrap().unwrap();
        assert_eq!(msg.status, OutboxStatus::Failed);
        assert_eq!(msg.retry_count, 1);
        assert_eq!(msg.last_error.as_deref(), Some("550 mailbox unavailable"));

        // Operator replay path.
        assert!(store.requeue_failed(id).await.unwrap());
        assert!(!store.requeue_failed(id).await.unwrap());

        // Strand a claim, then release it.
        assert!(store.claim_outbox(id).await.unwrap());
        assert_eq!(store.release_stale_claims().await.unwrap(), 1);
        let msg = store.get_outbox_message(id).await.unwrap().unwrap();
        assert_eq!(msg.status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn summary_uniqueness_per_week() {
        let store = store().await;
        let acct = store.create_pending_account("x@y.z", "123456").await.unwrap();
        let week = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();

        let summary = WeeklySummary {
            id: Uuid::new_v4(),
            account_id: acct.id,
            week_start: week,
            paragraph: "Shipped.".into(),
            bullet_points: vec!["a".into(), "b".into()],
            model: "claude-3-haiku".into(),
            cost_cents: 1,
            created_at: Utc::now(),
        };
        store.record_summary(&summary).await.unwrap();
        assert!(store.summary_exists(acct.id, week).await.unwrap());

        let dup = WeeklySummary { id: Uuid::new_v4(), ..summary };
        assert!(matches!(
            store.record_summary(&dup).await,
            Err(DatabaseError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn local_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");

        {
            let store = LibSqlStore::open_local(&path).await.unwrap();
            store.create_pending_account("x@y.z", "123456").await.unwrap();
        }

        let store = LibSqlStore::open_local(&path).await.unwrap();
        let acct = store.find_account_by_email("x@y.z").await.unwrap().unwrap();
        assert_eq!(acct.verification_code.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn processed_message_dedup() {
        let store = store().await;
        assert!(!store.is_processed("<msg-1@mail>").await.unwrap());
        store.mark_processed("<msg-1@mail>").await.unwrap();
        assert!(store.is_processed("<msg-1@mail>").await.unwrap());
        // Marking again is a no-op.
        store.mark_processed("<msg-1@mail>").await.unwrap();
    }
}
