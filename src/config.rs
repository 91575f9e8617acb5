//! Service configuration, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::transport::inbound::ImapConfig;
use crate::transport::SmtpConfig;

/// Weekly summaries go out Friday 16:30 UTC unless overridden.
const DEFAULT_WEEKLY_CRON: &str = "0 30 16 * * FRI";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub smtp: SmtpConfig,
    /// Inbound polling is disabled when unset.
    pub imap: Option<ImapConfig>,
    pub inbound_poll_interval: Duration,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_limit: usize,
    pub outbox_send_timeout: Duration,
    pub prompt_tick_interval: Duration,
    pub weekly_cron: String,
    /// Without a key the canned summarizer is used.
    pub anthropic_api_key: Option<SecretString>,
    pub summary_model: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("JOTMAIL_DB_PATH")
            .unwrap_or_else(|_| "./data/jotmail.db".to_string())
            .into();

        let smtp_host = require("JOTMAIL_SMTP_HOST")?;
        let smtp = SmtpConfig {
            host: smtp_host,
            port: parse_var("JOTMAIL_SMTP_PORT", 587)?,
            username: require("JOTMAIL_SMTP_USERNAME")?,
            password: SecretString::from(require("JOTMAIL_SMTP_PASSWORD")?),
            from_address: require("JOTMAIL_FROM_ADDRESS")?,
        };

        let imap = match std::env::var("JOTMAIL_IMAP_HOST") {
            Ok(host) => Some(ImapConfig {
                host,
                port: parse_var("JOTMAIL_IMAP_PORT", 993)?,
                username: std::env::var("JOTMAIL_IMAP_USERNAME")
                    .unwrap_or_else(|_| smtp.username.clone()),
                password: std::env::var("JOTMAIL_IMAP_PASSWORD")
                    .map_err(|_| ConfigError::MissingEnvVar("JOTMAIL_IMAP_PASSWORD".into()))?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            db_path,
            smtp,
            imap,
            inbound_poll_interval: Duration::from_secs(parse_var(
                "JOTMAIL_INBOUND_POLL_SECS",
                60,
            )?),
            outbox_poll_interval: Duration::from_secs(parse_var("JOTMAIL_OUTBOX_POLL_SECS", 15)?),
            outbox_batch_limit: parse_var("JOTMAIL_OUTBOX_BATCH_LIMIT", 25)?,
            outbox_send_timeout: Duration::from_secs(parse_var(
                "JOTMAIL_OUTBOX_SEND_TIMEOUT_SECS",
                30,
            )?),
            prompt_tick_interval: Duration::from_secs(parse_var(
                "JOTMAIL_PROMPT_TICK_SECS",
                3600,
            )?),
            weekly_cron: std::env::var("JOTMAIL_WEEKLY_CRON")
                .unwrap_or_else(|_| DEFAULT_WEEKLY_CRON.to_string()),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok().map(SecretString::from),
            summary_model: std::env::var("JOTMAIL_SUMMARY_MODEL").ok(),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
