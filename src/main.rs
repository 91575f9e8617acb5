use std::sync::Arc;

use jotmail::config::Config;
use jotmail::interpreter::ReplyInterpreter;
use jotmail::outbox::OutboxDispatcher;
use jotmail::schedule::{self, DailyPromptIssuer, WeeklySummaryIssuer};
use jotmail::store::{JournalStore, LibSqlStore};
use jotmail::summary::{AnthropicSummarizer, CannedSummarizer, WeeklySummarizer};
use jotmail::transport::inbound::spawn_inbound_poller;
use jotmail::transport::{Mailer, SmtpMailer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("📬 jotmail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Weekly cron: {}", config.weekly_cron);

    // ── Storage ─────────────────────────────────────────────────────
    let store: Arc<dyn JournalStore> = Arc::new(LibSqlStore::open_local(&config.db_path).await?);

    // Startup recovery: claims stranded by a previous crash go back to
    // the queue so the dispatcher can retry them.
    let released = store.release_stale_claims().await?;
    if released > 0 {
        eprintln!("   Recovered {released} stranded outbox messages");
    }

    // ── Delivery ────────────────────────────────────────────────────
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(config.smtp.clone()));
    let dispatcher = Arc::new(OutboxDispatcher::new(
        Arc::clone(&store),
        mailer,
        config.outbox_send_timeout,
    ));
    let _outbox_handle = schedule::spawn_outbox_ticker(
        Arc::clone(&dispatcher),
        config.outbox_poll_interval,
        config.outbox_batch_limit,
    );

    // ── Scheduling ──────────────────────────────────────────────────
    let prompt_issuer = Arc::new(DailyPromptIssuer::new(Arc::clone(&store)));
    let _prompt_handle =
        schedule::spawn_prompt_ticker(prompt_issuer, config.prompt_tick_interval);

    let summarizer: Arc<dyn WeeklySummarizer> = match &config.anthropic_api_key {
        Some(key) => Arc::new(AnthropicSummarizer::new(
            key.clone(),
            config.summary_model.clone(),
        )),
        None => {
            eprintln!("   ANTHROPIC_API_KEY not set; using canned weekly summaries");
            Arc::new(CannedSummarizer)
        }
    };
    let weekly_issuer = Arc::new(WeeklySummaryIssuer::new(Arc::clone(&store), summarizer));
    let _weekly_handle = schedule::spawn_weekly_ticker(weekly_issuer, config.weekly_cron.clone());

    // ── Inbound ─────────────────────────────────────────────────────
    if let Some(imap) = config.imap.clone() {
        let interpreter = Arc::new(ReplyInterpreter::new(Arc::clone(&store)));
        let _inbound_handle = spawn_inbound_poller(
            imap,
            Arc::clone(&store),
            interpreter,
            config.inbound_poll_interval,
        );
    } else {
        eprintln!("   JOTMAIL_IMAP_HOST not set; inbound polling disabled");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    Ok(())
}
