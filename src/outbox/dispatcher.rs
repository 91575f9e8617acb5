//! Outbox dispatcher — drains pending messages through the mailer.
//!
//! Each message moves `pending → sending → sent | failed`. The claim is a
//! conditional update, so two overlapping batches never send the same
//! message twice. Every claimed message reaches exactly one terminal state
//! even when the send times out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{DatabaseError, TransportError};
use crate::outbox::model::OutboxMessage;
use crate::store::JournalStore;
use crate::transport::Mailer;

/// What one `process_batch` call did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub sent: usize,
    pub failed: usize,
    /// Messages another dispatcher claimed first.
    pub skipped: usize,
}

pub struct OutboxDispatcher {
    store: Arc<dyn JournalStore>,
    mailer: Arc<dyn Mailer>,
    send_timeout: Duration,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn JournalStore>,
        mailer: Arc<dyn Mailer>,
        send_timeout: Duration,
    ) -> Self {
        Self { store, mailer, send_timeout }
    }

    /// Drain up to `limit` due messages. One message failing never stops
    /// the rest of the batch.
    pub async fn process_batch(&self, limit: usize) -> Result<BatchStats, DatabaseError> {
        let due = self.store.due_outbox(limit, Utc::now()).await?;
        let mut stats = BatchStats::default();

        for message in due {
            if !self.store.claim_outbox(message.id).await? {
                stats.skipped += 1;
                continue;
            }
            match self.deliver(&message).await {
                Ok(()) => stats.sent += 1,
                Err(()) => stats.failed += 1,
            }
        }

        if stats.sent > 0 || stats.failed > 0 {
            info!(
                sent = stats.sent,
                failed = stats.failed,
                skipped = stats.skipped,
                "Outbox batch processed"
            );
        }
        Ok(stats)
    }

    /// Send one claimed message and record its terminal state.
    async fn deliver(&self, message: &OutboxMessage) -> Result<(), ()> {
        let attempt = tokio::time::timeout(
            self.send_timeout,
            self.mailer
                .send(&message.recipient, &message.subject, &message.body),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout { timeout: self.send_timeout }));

        match attempt {
            Ok(provider_id) => {
                if let Err(e) = self
                    .store
                    .mark_outbox_sent(message.id, &provider_id, Utc::now())
                    .await
                {
                    error!(id = %message.id, error = %e, "Sent message could not be recorded");
                }
                Ok(())
            }
            Err(send_err) => {
                warn!(
                    id = %message.id,
                    recipient = %message.recipient,
                    error = %send_err,
                    "Outbox delivery failed"
                );
                if let Err(e) = self
                    .store
                    .mark_outbox_failed(message.id, &send_err.to_string())
                    .await
                {
                    error!(id = %message.id, error = %e, "Failed message could not be recorded");
                }
                Err(())
            }
        }
    }
}
