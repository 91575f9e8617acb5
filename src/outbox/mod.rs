//! Reliable delivery: outbox rows plus the dispatcher that drains them.

pub mod dispatcher;
pub mod model;

pub use dispatcher::{BatchStats, OutboxDispatcher};
pub use model::{MessageCategory, NewOutboxMessage, OutboxMessage, OutboxStatus};
