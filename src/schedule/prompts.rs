//! Daily prompt issuer.
//!
//! Runs once an hour. Every verified, active account whose local clock has
//! reached its preferred hour gets one prompt queued through the outbox.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::DatabaseError;
use crate::outbox::model::{MessageCategory, NewOutboxMessage};
use crate::render;
use crate::schedule::selector;
use crate::store::JournalStore;

pub struct DailyPromptIssuer {
    store: Arc<dyn JournalStore>,
}

impl DailyPromptIssuer {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Queue prompts for every account due at `now`. Returns how many
    /// were queued. A failure for one account never blocks the others.
    pub async fn issue_due_prompts(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let accounts = self.store.list_verified_accounts().await?;
        let mut issued = 0;

        for account in accounts {
            if !selector::prompt_due(&account, now) {
                continue;
            }

            let (subject, body) = render::daily_prompt(now, account.project_focus.as_deref());
            match self
                .store
                .enqueue_outbox(NewOutboxMessage::new(
                    Some(account.id),
                    &account.email,
                    MessageCategory::DailyPrompt,
                    &subject,
                    &body,
                ))
                .await
            {
                Ok(_) => issued += 1,
                Err(e) => {
                    error!(email = %account.email, error = %e, "Failed to queue daily prompt");
                }
            }
        }

        if issued > 0 {
            info!(issued, "Daily prompts queued");
        }
        Ok(issued)
    }
}
