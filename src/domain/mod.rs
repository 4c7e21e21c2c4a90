//! Domain model for the long-polling chat broker.
//!
//! Contains the immutable message type, the in-memory message history,
//! the sanitization step applied to inbound text, and the persistence
//! sink trait implemented by the infrastructure layer.

mod message;
mod sanitize;
mod sink;
mod store;

pub use message::Message;
pub use sanitize::sanitize_incoming;
#[cfg(test)]
pub use sink::MockMessageSink;
pub use sink::MessageSink;
pub use store::{MAX_HISTORY, MessageStore};
