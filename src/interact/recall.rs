// src/interact/recall.rs
//! Short-lived map from a triggering message to the reply it caused.
//!
//! An inbound message is marked pending before we answer it. If the sender
//! recalls it in the meantime the entry disappears, which tells the replier to
//! stay silent (or to delete a reply that already went out). Once the reply id
//! is known the entry is bound to it, so a later recall can delete the reply.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

use crate::feed::types::MessageId;
use crate::push::cache::TtlCache;

pub const RECALL_WATCH_TTL: Duration = Duration::from_secs(3 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watch {
    Pending,
    Replied(MessageId),
}

#[derive(Debug)]
pub struct RecallWatch {
    inner: Mutex<TtlCache<MessageId, Watch>>,
}

impl Default for RecallWatch {
    fn default() -> Self {
        Self::new(RECALL_WATCH_TTL)
    }
}

impl RecallWatch {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn mark_pending(&self, inbound: MessageId, now: DateTime<Utc>) {
        let mut w = self.inner.lock().expect("recall watch mutex poisoned");
        w.insert(inbound, Watch::Pending, now);
    }

    /// True when the inbound message is no longer watched (recalled or expired).
    pub fn is_withdrawn(&self, inbound: MessageId, now: DateTime<Utc>) -> bool {
        let mut w = self.inner.lock().expect("recall watch mutex poisoned");
        !w.contains(&inbound, now)
    }

    /// Bind the outgoing reply to its trigger. Returns false if the trigger was
    /// withdrawn meanwhile; the caller must then delete `outgoing` itself.
    pub fn bind(&self, inbound: MessageId, outgoing: MessageId, now: DateTime<Utc>) -> bool {
        let mut w = self.inner.lock().expect("recall watch mutex poisoned");
        if !w.contains(&inbound, now) {
            return false;
        }
        w.insert(inbound, Watch::Replied(outgoing), now);
        true
    }

    /// Stop watching a message that produced no reply.
    pub fn release(&self, inbound: MessageId) {
        let mut w = self.inner.lock().expect("recall watch mutex poisoned");
        w.remove(&inbound);
    }

    /// The inbound message was recalled: forget it and return the reply to delete, if any.
    pub fn on_recall(&self, inbound: MessageId, now: DateTime<Utc>) -> Option<MessageId> {
        let mut w = self.inner.lock().expect("recall watch mutex poisoned");
        let live = w.contains(&inbound, now);
        match w.remove(&inbound) {
            Some(Watch::Replied(out)) if live => Some(out),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("recall watch mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
