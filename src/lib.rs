//! jotmail — an email-based work journal.
//!
//! Users reply to a daily email with what they got done; replies are
//! parsed into journal entries, commands adjust the account, and a weekly
//! recap goes out on Fridays. All outbound mail flows through a durable
//! outbox.

pub mod account;
pub mod config;
pub mod error;
pub mod grammar;
pub mod interpreter;
pub mod journal;
pub mod outbox;
pub mod render;
pub mod schedule;
pub mod store;
pub mod summary;
pub mod transport;

pub use error::{Error, Result};
