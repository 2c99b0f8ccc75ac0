// SPDX-License-Identifier: GPL-3.0-or-later
//! The broadcaster (spec §4.E): a single, lazily-started loop that ticks
//! at ~500ms, drives the frame builder, and fans results out to every
//! subscriber without blocking on a slow one.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::frame::{self, SENTINEL};
use crate::grid::PixelGrid;
use crate::subscriber::{SubscriberSet, SubscriberState};

const TICK: Duration = Duration::from_millis(500);

/// Holds the at-most-one-running invariant for the broadcaster loop.
pub struct Broadcaster {
    grid: Arc<PixelGrid>,
    subscribers: Arc<SubscriberSet>,
    running: AtomicBool,
}

impl Broadcaster {
    pub fn new(grid: Arc<PixelGrid>, subscribers: Arc<SubscriberSet>) -> Arc<Self> {
        Arc::new(Self {
            grid,
            subscribers,
            running: AtomicBool::new(false),
        })
    }

    /// Start the broadcaster task if it isn't already running. A second
    /// call while active is a no-op, enforced by the compare-and-swap on
    /// `running` (spec §4.E, §9 "Broadcaster lazy start").
    pub fn ensure_running(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run().await });
        }
    }

    async fn run(self: Arc<Self>) {
        info!("broadcaster starting");
        loop {
            let done = self.tick();
            if done {
                break;
            }
            tokio::time::sleep(TICK).await;
        }
        info!("broadcaster idling, subscriber set empty");
    }

    /// Run one tick. Returns `true` if the broadcaster should go idle
    /// (subscriber set was empty).
    fn tick(&self) -> bool {
        let grid = &self.grid;
        self.subscribers.with_subscribers(|subs| {
            if subs.is_empty() {
                self.running.store(false, Ordering::Release);
                return true;
            }

            let need_full = subs
                .values()
                .any(|s| s.state == SubscriberState::Initial);
            let need_incremental = subs
                .values()
                .any(|s| s.state == SubscriberState::Active);

            let snapshot = grid.snapshot(need_full, need_incremental);
            let (full_event, incremental_event) = frame::render(&snapshot);

            let mut evict = Vec::new();
            for (id, sub) in subs.iter_mut() {
                match sub.state {
                    SubscriberState::Initial => {
                        sub.state = SubscriberState::Active;
                        // Queue-full on a brand new subscriber is fine: it
                        // will pick up an incremental frame next tick.
                        let _ = sub.out.try_send(full_event.clone());
                    }
                    SubscriberState::Active => {
                        if incremental_event != SENTINEL {
                            if sub.out.try_send(incremental_event.clone()).is_err() {
                                // Not keeping up: evict.
                                evict.push(*id);
                            }
                        }
                    }
                }
            }
            for id in evict {
                debug!(?id, "evicting slow subscriber");
                subs.remove(&id);
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::SubscriberState;

    #[test]
    fn tick_on_empty_set_reports_idle() {
        let grid = Arc::new(PixelGrid::new());
        let subs = Arc::new(SubscriberSet::new());
        let broadcaster = Broadcaster::new(grid, subs);
        assert!(broadcaster.tick());
    }

    #[tokio::test]
    async fn initial_subscriber_receives_full_frame_first() {
        let grid = Arc::new(PixelGrid::new());
        let subs = Arc::new(SubscriberSet::new());
        let (id, mut rx) = subs.register();
        let broadcaster = Broadcaster::new(grid, subs.clone());

        assert!(!broadcaster.tick());
        let first = rx.recv().await.unwrap();
        assert!(first.starts_with("event: u\ndata:"));
        subs.with_subscribers(|s| {
            assert_eq!(s.get(&id).unwrap().state, SubscriberState::Active);
        });
    }

    #[tokio::test]
    async fn no_paints_means_no_incremental_after_initial() {
        let grid = Arc::new(PixelGrid::new());
        let subs = Arc::new(SubscriberSet::new());
        let (_id, mut rx) = subs.register();
        let broadcaster = Broadcaster::new(grid, subs);

        broadcaster.tick();
        let _full = rx.recv().await.unwrap();
        broadcaster.tick();
        let second = rx.recv().await.unwrap();
        assert_eq!(second, SENTINEL.to_string());
    }

    #[tokio::test]
    async fn slow_subscriber_is_evicted_after_filling_its_queue() {
        let grid = Arc::new(PixelGrid::new());
        let subs = Arc::new(SubscriberSet::new());
        let (id, _rx) = subs.register(); // never drained
        let broadcaster = Broadcaster::new(grid, subs.clone());

        // First tick: INITIAL -> ACTIVE, full frame enqueued (1/40).
        broadcaster.tick();
        // Paint so each subsequent tick has a non-sentinel incremental
        // frame to enqueue.
        broadcaster.grid.apply(1, 1, 1, 1, 1);
        for i in 0..40u8 {
            broadcaster.grid.apply(1, 1, i, 1, 1);
            broadcaster.tick();
        }
        subs.with_subscribers(|s| {
            assert!(!s.contains_key(&id), "subscriber should have been evicted");
        });
    }
}
