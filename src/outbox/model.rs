//! Outbox message model — a durable outbound email intent.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What kind of email a message is; the transport maps each category to a
/// rendering template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Verification,
    DailyPrompt,
    WeeklySummary,
    Clarification,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::DailyPrompt => "daily_prompt",
            Self::WeeklySummary => "weekly_summary",
            Self::Clarification => "clarification",
        }
    }
}

impl std::str::FromStr for MessageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verification" => Ok(Self::Verification),
            "daily_prompt" => Ok(Self::DailyPrompt),
            "weekly_summary" => Ok(Self::WeeklySummary),
            "clarification" => Ok(Self::Clarification),
            other => Err(format!("unknown message category: {other}")),
        }
    }
}

/// Delivery status. Transitions are forward-only: `Pending` → `Sending`
/// (claim) → `Sent` or `Failed`. A failed message may be moved back to
/// `Pending` only by the operator-level requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    /// Claimed by a dispatcher batch; transient.
    Sending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// A queued email intent. Rows are append-only audit records: mutated only
/// by the dispatcher, never deleted.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    /// Absent for mail that precedes account activation (welcome mail).
    pub account_id: Option<Uuid>,
    pub recipient: String,
    pub category: MessageCategory,
    pub subject: String,
    pub body: String,
    pub status: OutboxStatus,
    /// Provider message id, recorded on successful delivery.
    pub provider_message_id: Option<String>,
    /// Last delivery error, recorded on failure.
    pub last_error: Option<String>,
    pub retry_count: i64,
    /// Deferred sends are held until this instant.
    pub not_before: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a producer supplies when enqueueing.
#[derive(Debug, Clone)]
pub struct NewOutboxMessage {
    pub account_id: Option<Uuid>,
    pub recipient: String,
    pub category: MessageCategory,
    pub subject: String,
    pub body: String,
    pub not_before: Option<DateTime<Utc>>,
}

impl NewOutboxMessage {
    pub fn new(
        account_id: Option<Uuid>,
        recipient: impl Into<String>,
        category: MessageCategory,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            recipient: recipient.into(),
            category,
            subject: subject.into(),
            body: body.into(),
            not_before: None,
        }
    }

    /// Defer delivery until `at`.
    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }
}
