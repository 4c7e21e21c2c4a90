//! Per-client slot state machine.
//!
//! A slot is either **Idle** (no held response, buffer may be non-empty)
//! or **Holding** (a poll response is held open, buffer empty). The
//! invariant the whole broker hangs on is that a held response and a
//! non-empty buffer never coexist: whenever both would exist, the buffer
//! is flushed to the response and both are cleared in the same transition.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::domain::Message;

use super::PollReply;

/// Maximum number of undelivered messages buffered per client. The oldest
/// message is dropped once the cap is reached, so a client that never
/// polls cannot grow the buffer without bound.
pub(crate) const MAX_BUFFER: usize = 256;

/// Connection state for a single client id.
///
/// All mutation happens inside the broker's critical section, so no two
/// transitions on the same slot ever interleave.
pub(crate) struct Slot {
    id: u64,
    buffer: VecDeque<Message>,
    held: Option<oneshot::Sender<PollReply>>,
    renewal: Option<JoinHandle<()>>,
    /// Bumped on every transition that answers or discards the held
    /// response. A renewal timer captures the generation it was armed
    /// under and becomes a no-op if the slot has moved on since.
    generation: u64,
    /// When this client last polled, UTC milliseconds. Drives idle
    /// eviction.
    last_poll: i64,
}

impl Slot {
    /// Create a slot for `id`, pre-seeding its buffer with the replay
    /// window so the client's first poll returns recent history.
    pub(crate) fn new(id: u64, seed: Vec<Message>, now: i64) -> Self {
        Self {
            id,
            buffer: VecDeque::from(seed),
            held: None,
            renewal: None,
            generation: 0,
            last_poll: now,
        }
    }

    pub(crate) fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn last_poll(&self) -> i64 {
        self.last_poll
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.last_poll = now;
    }

    pub(crate) fn buffer_is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take the whole buffer, leaving it empty.
    pub(crate) fn drain_buffer(&mut self) -> Vec<Message> {
        self.buffer.drain(..).collect()
    }

    /// Deliver a newly accepted message to this client: answer the held
    /// poll immediately when Holding, otherwise buffer for the next poll.
    pub(crate) fn add_message(&mut self, message: Message) {
        if self.held.is_some() {
            self.answer(vec![message]);
        } else {
            if self.buffer.len() == MAX_BUFFER {
                self.buffer.pop_front();
                tracing::warn!(
                    client_id = self.id,
                    "slot buffer full, dropping oldest undelivered message"
                );
            }
            self.buffer.push_back(message);
        }
        debug_assert!(self.buffer_invariant_holds());
    }

    /// Answer the held response (if any) with `messages`, cancel the
    /// renewal timer and transition to Idle.
    ///
    /// A send failure means the client's transport already went away; the
    /// reply is dropped and the transition completes as if delivered.
    pub(crate) fn answer(&mut self, messages: Vec<Message>) {
        self.generation += 1;
        if let Some(timer) = self.renewal.take() {
            timer.abort();
        }
        if let Some(held) = self.held.take()
            && held.send(PollReply { messages }).is_err()
        {
            tracing::debug!(
                client_id = self.id,
                "poll response handle closed before reply, dropping"
            );
        }
    }

    /// Hold a new response handle. Only legal while Idle with an empty
    /// buffer; callers flush or answer first.
    pub(crate) fn hold(&mut self, sender: oneshot::Sender<PollReply>) {
        debug_assert!(self.held.is_none());
        debug_assert!(self.buffer.is_empty());
        self.held = Some(sender);
    }

    /// Attach the renewal timer armed for the currently held response,
    /// aborting any stale one first.
    pub(crate) fn set_renewal(&mut self, timer: JoinHandle<()>) {
        if let Some(stale) = self.renewal.take() {
            stale.abort();
        }
        self.renewal = Some(timer);
    }

    /// The state-machine invariant: never Holding with a non-empty buffer.
    pub(crate) fn buffer_invariant_holds(&self) -> bool {
        self.held.is_none() || self.buffer.is_empty()
    }
}
