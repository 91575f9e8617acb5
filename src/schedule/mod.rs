//! Scheduling: who gets mail when.
//!
//! Tickers are thin; all decisions live in the issuers so they can be
//! driven directly from tests with a fixed clock.

pub mod prompts;
pub mod selector;
pub mod weekly;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::outbox::OutboxDispatcher;

pub use prompts::DailyPromptIssuer;
pub use selector::prompt_due;
pub use weekly::WeeklySummaryIssuer;

/// Parse a cron expression and compute the next fire time after `now`.
pub fn next_cron_fire(
    expression: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, String> {
    let schedule =
        cron::Schedule::from_str(expression).map_err(|e| format!("invalid cron: {e}"))?;
    Ok(schedule.after(&now).next())
}

/// Spawn the hourly daily-prompt ticker.
pub fn spawn_prompt_ticker(
    issuer: Arc<DailyPromptIssuer>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = issuer.issue_due_prompts(Utc::now()).await {
                error!(error = %e, "Daily prompt pass failed");
            }
        }
    })
}

/// Spawn the outbox drain ticker.
pub fn spawn_outbox_ticker(
    dispatcher: Arc<OutboxDispatcher>,
    interval: Duration,
    batch_limit: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = dispatcher.process_batch(batch_limit).await {
                error!(error = %e, "Outbox batch failed");
            }
        }
    })
}

/// Spawn the weekly summary task, sleeping until each cron fire.
pub fn spawn_weekly_ticker(
    issuer: Arc<WeeklySummaryIssuer>,
    cron_expression: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = match next_cron_fire(&cron_expression, Utc::now()) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    error!(cron = %cron_expression, "Cron schedule has no future fires");
                    return;
                }
                Err(e) => {
                    error!(cron = %cron_expression, error = %e, "Bad weekly cron expression");
                    return;
                }
            };

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next, "Weekly summary scheduled");
            tokio::time::sleep(wait).await;

            if let Err(e) = issuer.issue_weekly_summaries(Utc::now()).await {
                error!(error = %e, "Weekly summary pass failed");
            }
        }
    })
}
