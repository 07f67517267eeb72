//! Subscriber-side handle of the note feed.

use super::{NoteFeed, Snapshot, SubscriptionId};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A live view of the note collection.
///
/// Carries the snapshot current at subscribe time and receives one new
/// snapshot per state-changing mutation, in mutation order. Dropping the
/// handle unsubscribes it.
pub struct Subscription {
    id: SubscriptionId,
    latest: Snapshot,
    rx: Receiver<Snapshot>,
    feed: Weak<NoteFeed>,
    attached: bool,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriptionId,
        initial: Snapshot,
        rx: Receiver<Snapshot>,
        feed: Weak<NoteFeed>,
    ) -> Self {
        Self {
            id,
            latest: initial,
            rx,
            feed,
            attached: true,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Most recent snapshot seen by this subscriber.
    ///
    /// Equals the initial value until a pushed snapshot has been received.
    pub fn snapshot(&self) -> &Snapshot {
        &self.latest
    }

    /// Blocks until the next snapshot arrives.
    ///
    /// Returns `None` once the subscription is detached (or the store is
    /// closed) and every snapshot already queued has been drained.
    pub fn recv(&mut self) -> Option<Snapshot> {
        let snapshot = self.rx.recv().ok()?;
        Some(self.observe(snapshot))
    }

    /// Returns the next queued snapshot without blocking.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        let snapshot = self.rx.try_recv().ok()?;
        Some(self.observe(snapshot))
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Snapshot> {
        match self.rx.recv_timeout(timeout) {
            Ok(snapshot) => Some(self.observe(snapshot)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stops future deliveries. Safe to call repeatedly.
    ///
    /// Snapshots queued before the call can still be drained.
    pub fn unsubscribe(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Some(feed) = self.feed.upgrade() {
            feed.detach(self.id);
        }
    }

    fn observe(&mut self, snapshot: Snapshot) -> Snapshot {
        self.latest = Arc::clone(&snapshot);
        snapshot
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("notes", &self.latest.len())
            .field("attached", &self.attached)
            .finish()
    }
}
