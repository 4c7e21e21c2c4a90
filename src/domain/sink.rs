//! Persistence sink trait.
//!
//! The broker only needs a best-effort append and a one-shot bulk
//! recovery at startup; the concrete implementation lives in the
//! infrastructure layer (dependency inversion).

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::Message;

/// Durable logging collaborator for accepted messages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Enqueue a message for durable logging. Fire-and-forget: must never
    /// block the broker's critical section on persistence latency.
    fn append(&self, message: &Message);

    /// Read back every previously persisted message, in the order it was
    /// written. Missing or malformed data yields an empty history, never
    /// an error; losing the log must not prevent startup.
    async fn recover_all(&self) -> Vec<Message>;
}
