//! The message broker: client id allocation, per-client slots, message
//! fan-out and the renewal/eviction timers.
//!
//! All broker state lives behind a single `tokio::sync::Mutex`, so every
//! state transition on a slot is serialized with every other one. Holding
//! a long-poll open never occupies a worker: the held response is just a
//! stored `oneshot::Sender` answered from whichever task triggers the
//! next transition.

mod slot;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::common::time::now_millis;
use crate::domain::{Message, MessageSink, MessageStore};

use slot::Slot;

/// Reply sent to a held or immediately answered poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReply {
    pub messages: Vec<Message>,
}

impl PollReply {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

/// Broker tuning knobs.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long a poll is held before being renewed with an empty reply.
    /// Kept under typical 60s client/proxy timeouts.
    pub poll_timeout: Duration,
    /// How many recent messages a newly created slot is seeded with.
    pub replay_limit: usize,
    /// How long a slot may stay Idle without polling before eviction.
    pub slot_ttl: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(50),
            replay_limit: 50,
            slot_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct BrokerInner {
    next_id: u64,
    slots: HashMap<u64, Slot>,
    history: MessageStore,
}

/// The broker owns the message history and one [`Slot`] per known client,
/// and routes every inbound message and poll through them.
pub struct Broker {
    inner: Arc<Mutex<BrokerInner>>,
    sink: Arc<dyn MessageSink>,
    config: BrokerConfig,
}

impl Broker {
    pub fn new(sink: Arc<dyn MessageSink>, config: BrokerConfig, history: MessageStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BrokerInner {
                next_id: 0,
                slots: HashMap::new(),
                history,
            })),
            sink,
            config,
        }
    }

    /// Allocate a fresh client id. Ids increase monotonically for the
    /// lifetime of the process and are never reused.
    pub async fn next_id(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        id
    }

    /// Route a poll to the client's slot, creating it lazily.
    ///
    /// Answers `sender` immediately when the slot has buffered messages.
    /// Otherwise the sender is held until a message arrives or the
    /// renewal timer fires; a stale previously-held sender is answered
    /// with an empty reply rather than dropped.
    pub async fn provide_response(&self, id: u64, sender: oneshot::Sender<PollReply>) {
        let now = now_millis();
        let mut inner = self.inner.lock().await;
        let BrokerInner { slots, history, .. } = &mut *inner;
        let replay_limit = self.config.replay_limit;
        let slot = slots
            .entry(id)
            .or_insert_with(|| Slot::new(id, history.snapshot_tail(replay_limit), now));
        slot.touch(now);

        if !slot.buffer_is_empty() {
            let messages = slot.drain_buffer();
            tracing::debug!(
                client_id = id,
                count = messages.len(),
                "answering poll from buffer"
            );
            if sender.send(PollReply { messages }).is_err() {
                tracing::debug!(client_id = id, "poll response handle closed before reply");
            }
            debug_assert!(slot.buffer_invariant_holds());
            return;
        }

        if slot.is_holding() {
            // A second poll for the same id: answer the old handle before
            // installing the new one so no connection leaks unanswered.
            tracing::debug!(client_id = id, "replacing held poll, answering stale handle");
            slot.answer(Vec::new());
        }

        slot.hold(sender);
        let generation = slot.generation();
        let timer = self.spawn_renewal(id, generation);
        slot.set_renewal(timer);
        debug_assert!(slot.buffer_invariant_holds());
    }

    /// Accept a message: attach sender id and timestamp (sanitization has
    /// already happened in the handler), record it in the history and the
    /// persistence sink, then fan it out to every known slot, including
    /// the sender's, which clients de-duplicate by `id`.
    pub async fn add_message(&self, username: String, message: String, sender_id: Option<u64>) {
        let now = now_millis();
        let mut inner = self.inner.lock().await;
        let BrokerInner { slots, history, .. } = &mut *inner;

        // An unknown sender id behaves exactly like a fresh one: the slot
        // is created here so the sender starts receiving fan-out without
        // having polled first.
        if let Some(sender) = sender_id {
            let replay_limit = self.config.replay_limit;
            slots
                .entry(sender)
                .or_insert_with(|| Slot::new(sender, history.snapshot_tail(replay_limit), now));
        }

        let msg = Message::new(sender_id, username, message, now);
        tracing::info!(
            sender_id = ?msg.id,
            username = %msg.username,
            "message accepted, fanning out to {} slot(s)",
            slots.len()
        );

        history.append(msg.clone());
        self.sink.append(&msg);

        for slot in slots.values_mut() {
            slot.add_message(msg.clone());
        }
    }

    /// Arm the renewal timer for a held poll. When it fires, the held
    /// response gets an empty reply so the client re-polls instead of
    /// hitting its own transport timeout. The generation guard makes the
    /// timer a no-op if the slot transitioned after the timer was armed.
    fn spawn_renewal(&self, id: u64, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let timeout = self.config.poll_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut inner = inner.lock().await;
            if let Some(slot) = inner.slots.get_mut(&id)
                && slot.generation() == generation
                && slot.is_holding()
            {
                tracing::debug!(client_id = id, "renewing held poll with empty reply");
                slot.answer(Vec::new());
            }
        })
    }

    /// Drop slots that are Idle and have not polled within `slot_ttl`.
    /// Holding slots are never evicted, so a pending poll is never
    /// orphaned. Returns the number of slots evicted.
    pub async fn evict_idle_slots(&self) -> usize {
        let now = now_millis();
        let ttl_millis = self.config.slot_ttl.as_millis() as i64;
        let mut inner = self.inner.lock().await;
        let before = inner.slots.len();
        inner
            .slots
            .retain(|_, slot| slot.is_holding() || now - slot.last_poll() < ttl_millis);
        let evicted = before - inner.slots.len();
        if evicted > 0 {
            tracing::info!("evicted {} idle slot(s)", evicted);
        }
        evicted
    }

    /// Spawn the periodic idle-slot eviction sweep.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(broker.config.sweep_interval);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                broker.evict_idle_slots().await;
            }
        })
    }

    /// Number of slots currently tracked.
    pub async fn slot_count(&self) -> usize {
        self.inner.lock().await.slots.len()
    }
}
