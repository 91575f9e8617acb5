//! Weekly summary issuer.
//!
//! Fires once a week (Friday afternoon by default). For every verified
//! account with at least one Monday–Friday entry and no summary recorded
//! for that week yet, it summarizes the week, persists the result, and
//! queues the review email.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::journal::{self, WeeklySummary};
use crate::outbox::model::{MessageCategory, NewOutboxMessage};
use crate::render;
use crate::store::JournalStore;
use crate::summary::WeeklySummarizer;

pub struct WeeklySummaryIssuer {
    store: Arc<dyn JournalStore>,
    summarizer: Arc<dyn WeeklySummarizer>,
}

impl WeeklySummaryIssuer {
    pub fn new(store: Arc<dyn JournalStore>, summarizer: Arc<dyn WeeklySummarizer>) -> Self {
        Self { store, summarizer }
    }

    /// Issue summaries for the week containing `now`. Returns how many
    /// were queued. Per-account failures are logged and skipped.
    pub async fn issue_weekly_summaries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let week_start = journal::week_start(now.date_naive());
        let week_end = journal::week_end(week_start);
        let accounts = self.store.list_verified_accounts().await?;
        let mut issued = 0;

        for account in accounts {
            let entries = self
                .store
                .entries_between(account.id, week_start, week_end)
                .await?;
            if entries.is_empty() {
                continue;
            }
            if self.store.summary_exists(account.id, week_start).await? {
                continue;
            }

            let output = match self.summarizer.summarize(&entries).await {
                Ok(output) => output,
                Err(e) => {
                    error!(email = %account.email, error = %e, "Summarization failed");
                    continue;
                }
            };

            let summary = WeeklySummary {
                id: Uuid::new_v4(),
                account_id: account.id,
                week_start,
                paragraph: output.paragraph.clone(),
                bullet_points: output.bullet_points.clone(),
                model: output.model,
                cost_cents: output.cost_cents,
                created_at: now,
            };
            match self.store.record_summary(&summary).await {
                Ok(()) => {}
                Err(DatabaseError::Constraint(_)) => {
                    // Another run already recorded this week.
                    warn!(email = %account.email, "Summary already recorded, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            }

            let (subject, body) =
                render::weekly_summary_email(week_start, &output.paragraph, &output.bullet_points);
            self.store
                .enqueue_outbox(NewOutboxMessage::new(
                    Some(account.id),
                    &account.email,
                    MessageCategory::WeeklySummary,
                    &subject,
                    &body,
                ))
                .await?;
            issued += 1;
        }

        info!(issued, week_start = %week_start, "Weekly summaries queued");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::preferences::Preferences;
    use crate::store::LibSqlStore;
    use crate::summary::CannedSummarizer;
    use chrono::{NaiveTime, TimeDelta, TimeZone};

    async fn verified(store: &LibSqlStore, email: &str) -> crate::account::Account {
        let acct = store.create_pending_account(email, "123456").await.unwrap();
        let prefs = Preferences {
            name: "Ada".into(),
            timezone: "UTC".into(),
            prompt_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            project_focus: None,
        };
        store.mark_verified(acct.id, &prefs).await.unwrap();
        store.find_account_by_email(email).await.unwrap().unwrap()
    }

    fn issuer(store: Arc<LibSqlStore>) -> WeeklySummaryIssuer {
        WeeklySummaryIssuer::new(store, Arc::new(CannedSummarizer))
    }

    #[tokio::test]
    async fn summarizes_accounts_with_entries_once() {
        let store = Arc::new(LibSqlStore::open_in_memory().await.unwrap());
        let acct = verified(&store, "a@b.c").await;
        verified(&store, "idle@b.c").await;

        // Friday afternoon; Monday of that week is Aug 24.
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 16, 30, 0).unwrap();
        let monday = journal::week_start(now.date_naive());
        store
            .upsert_entry(acct.id, monday, "Wrote migrations", "Wrote migrations", None)
            .await
            .unwrap();
        store
            .upsert_entry(
                acct.id,
                monday + TimeDelta::days(2),
                "Fixed CI",
                "Fixed CI",
                None,
            )
            .await
            .unwrap();

        let issuer = issuer(store.clone());
        assert_eq!(issuer.issue_weekly_summaries(now).await.unwrap(), 1);
        assert!(store.summary_exists(acct.id, monday).await.unwrap());

        let due = store.due_outbox(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].recipient, "a@b.c");
        assert_eq!(due[0].category, MessageCategory::WeeklySummary);
        assert!(due[0].body.contains("2 days"));

        // A second run in the same week is a no-op.
        assert_eq!(issuer.issue_weekly_summaries(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn accounts_without_entries_are_skipped() {
        let store = Arc::new(LibSqlStore::open_in_memory().await.unwrap());
        verified(&store, "idle@b.c").await;

        let now = Utc.with_ymd_and_hms(2026, 8, 28, 16, 30, 0).unwrap();
        assert_eq!(issuer(store.clone()).issue_weekly_summaries(now).await.unwrap(), 0);
        assert!(store.due_outbox(10, Utc::now()).await.unwrap().is_empty());
    }
}
