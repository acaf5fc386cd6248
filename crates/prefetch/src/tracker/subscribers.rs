//! Snapshot listeners

use super::{PrefetchEntry, PrefetchTracker, TrackerInner};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

pub(crate) type Listener = Arc<dyn Fn(&[PrefetchEntry]) + Send + Sync>;

/// Registration returned by [`PrefetchTracker::subscribe`].
///
/// Dropping it keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to stop deliveries.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    tracker: Weak<TrackerInner>,
}

impl Subscription {
    /// Stop deliveries. Returns false if the listener was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.tracker.upgrade() else {
            return false;
        };
        let mut listeners = inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

impl PrefetchTracker {
    /// Register a listener for entry snapshots.
    ///
    /// The current snapshot is delivered before this returns, then again after
    /// every mutation. A panicking listener is logged and stays registered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[PrefetchEntry]) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.write().push((id, Arc::clone(&listener)));

        let snapshot = self.inner.snapshot();
        deliver(id, &listener, &snapshot);

        Subscription {
            id,
            tracker: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    pub(super) fn notify_listeners(&self, snapshot: &[PrefetchEntry]) {
        let listeners: Vec<(u64, Listener)> = self.inner.listeners.read().clone();
        for (id, listener) in &listeners {
            deliver(*id, listener, snapshot);
        }
    }
}

fn deliver(id: u64, listener: &Listener, snapshot: &[PrefetchEntry]) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        tracing::warn!(listener = id, "Prefetch entry listener panicked");
    }
}
