// SPDX-License-Identifier: GPL-3.0-or-later
//! Subscribers and the live subscriber set (spec §3 `Subscriber`,
//! `SubscriberSet`, §4.F).
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Per-subscriber event queue capacity (spec §3, §5).
pub const QUEUE_CAPACITY: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberState {
    Initial,
    Active,
}

pub struct Subscriber {
    pub out: mpsc::Sender<String>,
    pub state: SubscriberState,
}

/// Opaque handle identifying a subscriber within a [SubscriberSet].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The live set of subscribers, serialized behind a single lock covering
/// insertion, removal, iteration and queue closure (spec §5).
pub struct SubscriberSet {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscriber with a fresh bounded queue in the
    /// `Initial` state, returning its id and the receiving half of the
    /// queue for the response-writer task to drain.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().insert(
            id,
            Subscriber {
                out: tx,
                state: SubscriberState::Initial,
            },
        );
        (id, rx)
    }

    /// Remove a subscriber if it is still present. Used by the disconnect
    /// watcher: if the broadcaster already evicted this id, this is a
    /// no-op, which is exactly the "do nothing" branch spec §4.F asks for.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Run `f` with exclusive access to the subscriber map. The broadcaster
    /// uses this to scan state, build frames, and fan them out within a
    /// single critical section per spec §4.E step 3.
    pub fn with_subscribers<R>(&self, f: impl FnOnce(&mut HashMap<SubscriberId, Subscriber>) -> R) -> R {
        let mut guard = self.subscribers.lock();
        f(&mut guard)
    }
}

impl Default for SubscriberSet {
    fn default() -> Self {
        Self::new()
    }
}
