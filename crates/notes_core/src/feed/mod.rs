//! Live subscription feed over the note collection.
//!
//! # Responsibility
//! - Keep one retained "latest snapshot" per store instance.
//! - Push every new snapshot to all registered subscribers.
//! - Hold the retained snapshot for a grace window after the last subscriber
//!   detaches, then release it.
//!
//! # Invariants
//! - Snapshots are published and subscribers registered under one lock, so a
//!   new subscriber never misses or duplicates a snapshot.
//! - Each subscriber channel is unbounded; delivery order equals publish order.
//! - The retained snapshot is a cache of store state, never a source of truth.

mod subscription;

pub use subscription::Subscription;

use crate::model::note::Note;
use log::debug;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One full copy of the ordered note collection.
pub type Snapshot = Arc<[Note]>;

/// Handle identifying one registered subscriber.
pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    tx: Sender<Snapshot>,
}

struct FeedState {
    next_id: SubscriptionId,
    subscribers: Vec<Subscriber>,
    retained: Option<Snapshot>,
    /// Set while `retained` is held with no subscriber attached.
    idle_since: Option<Instant>,
}

impl FeedState {
    fn mark_idle_if_unobserved(&mut self, now: Instant) {
        if self.subscribers.is_empty() && self.retained.is_some() && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    fn release_if_expired(&mut self, now: Instant, grace: Duration) -> bool {
        let expired = self.subscribers.is_empty()
            && self
                .idle_since
                .is_some_and(|idle_since| now.saturating_duration_since(idle_since) >= grace);
        if expired {
            self.retained = None;
            self.idle_since = None;
        }
        expired
    }
}

/// Called when a grace window starts off the worker thread.
pub(crate) type Waker = Box<dyn Fn() + Send + Sync>;

/// Publish/subscribe primitive scoped to one `NoteStore`.
pub(crate) struct NoteFeed {
    state: Mutex<FeedState>,
    idle_grace: Duration,
    waker: Option<Waker>,
}

impl NoteFeed {
    pub(crate) fn new(idle_grace: Duration) -> Arc<Self> {
        Self::build(idle_grace, None)
    }

    /// Like `new`, but `waker` runs whenever `detach` starts a grace window.
    pub(crate) fn with_waker(idle_grace: Duration, waker: Waker) -> Arc<Self> {
        Self::build(idle_grace, Some(waker))
    }

    fn build(idle_grace: Duration, waker: Option<Waker>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FeedState {
                next_id: 1,
                subscribers: Vec::new(),
                retained: None,
                idle_since: None,
            }),
            idle_grace,
            waker,
        })
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_fresh(&self) -> MutexGuard<'_, FeedState> {
        let mut state = self.lock();
        if state.release_if_expired(Instant::now(), self.idle_grace) {
            debug!("event=feed_release module=feed status=ok trigger=access");
        }
        state
    }

    /// Returns the retained snapshot when it is still within its lifetime.
    pub(crate) fn retained(&self) -> Option<Snapshot> {
        self.lock_fresh().retained.clone()
    }

    /// Whether a store refresh has anyone (or any cache) to deliver to.
    pub(crate) fn is_observed(&self) -> bool {
        let state = self.lock_fresh();
        !state.subscribers.is_empty() || state.retained.is_some()
    }

    /// Registers a subscriber against the retained snapshot, if one is held.
    pub(crate) fn attach_retained(self: &Arc<Self>) -> Option<Subscription> {
        let mut state = self.lock_fresh();
        let snapshot = state.retained.clone()?;
        Some(self.register(&mut state, snapshot))
    }

    /// Retains `snapshot` as the latest value and registers a subscriber on it.
    pub(crate) fn attach(self: &Arc<Self>, snapshot: Snapshot) -> Subscription {
        let mut state = self.lock_fresh();
        state.retained = Some(Arc::clone(&snapshot));
        self.register(&mut state, snapshot)
    }

    fn register(self: &Arc<Self>, state: &mut FeedState, snapshot: Snapshot) -> Subscription {
        let id = state.next_id;
        state.next_id += 1;

        let (tx, rx) = mpsc::channel();
        state.subscribers.push(Subscriber { id, tx });
        state.idle_since = None;

        debug!(
            "event=feed_subscribe module=feed status=ok subscription_id={} subscribers={} notes={}",
            id,
            state.subscribers.len(),
            snapshot.len()
        );
        Subscription::new(id, snapshot, rx, Arc::downgrade(self))
    }

    /// Retains `snapshot` without registering anyone; the grace window starts now.
    pub(crate) fn retain(&self, snapshot: Snapshot) {
        let mut state = self.lock_fresh();
        state.retained = Some(snapshot);
        state.mark_idle_if_unobserved(Instant::now());
    }

    /// Delivers `snapshot` to every subscriber and makes it the retained value.
    ///
    /// Returns the number of subscribers that received it. Subscribers whose
    /// receiver is gone are pruned.
    pub(crate) fn publish(&self, snapshot: Snapshot) -> usize {
        let mut state = self.lock_fresh();
        if state.subscribers.is_empty() && state.retained.is_none() {
            return 0;
        }

        state.retained = Some(Arc::clone(&snapshot));
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| subscriber.tx.send(Arc::clone(&snapshot)).is_ok());
        let delivered = state.subscribers.len();
        if delivered < before {
            debug!(
                "event=feed_prune module=feed status=ok pruned={}",
                before - delivered
            );
        }
        state.mark_idle_if_unobserved(Instant::now());
        delivered
    }

    /// Drops the retained snapshot so the next reader queries the store.
    pub(crate) fn invalidate(&self) {
        let mut state = self.lock();
        state.retained = None;
        state.idle_since = None;
    }

    /// Removes a subscriber. Unknown or already removed ids are ignored.
    pub(crate) fn detach(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        let removed = state.subscribers.len() < before;
        let mut went_idle = false;
        if removed {
            let was_idle = state.idle_since.is_some();
            state.mark_idle_if_unobserved(Instant::now());
            went_idle = !was_idle && state.idle_since.is_some();
            debug!(
                "event=feed_unsubscribe module=feed status=ok subscription_id={} subscribers={}",
                id,
                state.subscribers.len()
            );
        }
        drop(state);

        if went_idle {
            if let Some(waker) = &self.waker {
                waker();
            }
        }
        removed
    }

    /// Instant at which an idle retained snapshot becomes releasable.
    pub(crate) fn release_deadline(&self) -> Option<Instant> {
        let state = self.lock();
        if !state.subscribers.is_empty() {
            return None;
        }
        state
            .idle_since
            .and_then(|idle_since| idle_since.checked_add(self.idle_grace))
    }

    /// Releases the retained snapshot if its grace window has elapsed.
    pub(crate) fn release_expired(&self) -> bool {
        let released = self.lock().release_if_expired(Instant::now(), self.idle_grace);
        if released {
            debug!("event=feed_release module=feed status=ok trigger=timer");
        }
        released
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
