//! Error types for jotmail.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    /// Mail from an address with no account and no signup intent.
    /// Surfaced to the inbound collaborator as a hard failure; re-delivery
    /// of the same message cannot change the outcome, so it is not retried.
    #[error("Unknown sender: {email}")]
    UnknownSender { email: String },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Reply-parsing errors. Every variant resolves to a clarification email,
/// never to an operator escalation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("No meaningful content found in reply")]
    EmptyReply,

    #[error("Invalid pause duration: {0:?}")]
    InvalidDuration(String),

    #[error("Required preference missing: {field}")]
    MissingPreference { field: &'static str },

    #[error("Unable to parse time: {0:?}")]
    InvalidTime(String),

    #[error("Invalid timezone: {0:?}")]
    InvalidTimezone(String),
}

/// Outbound delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    BuildFailed(String),

    #[error("SMTP send failed: {0}")]
    SendFailed(String),

    #[error("Delivery attempt timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Weekly-summarization errors.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Summarizer request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid summarizer response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
