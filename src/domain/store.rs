//! Append-only in-memory message history.

use std::collections::VecDeque;

use super::Message;

/// Maximum number of messages kept in memory. Older messages are trimmed
/// from the front; the on-disk log keeps the full record.
pub const MAX_HISTORY: usize = 1000;

/// Ordered log of every message the broker has accepted, capped at
/// [`MAX_HISTORY`]. Owned exclusively by the broker and mutated only
/// inside its critical section.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: VecDeque<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from messages recovered by the persistence sink at
    /// startup. Only the newest [`MAX_HISTORY`] entries are retained.
    pub fn recover(recovered: Vec<Message>) -> Self {
        let mut store = Self::new();
        for message in recovered {
            store.append(message);
        }
        store
    }

    /// Append a message to the end of the history, trimming the oldest
    /// entry once the cap is reached.
    pub fn append(&mut self, message: Message) {
        if self.messages.len() == MAX_HISTORY {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// The last `limit` messages in acceptance order, used to seed the
    /// buffer of a newly created client slot.
    pub fn snapshot_tail(&self, limit: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
