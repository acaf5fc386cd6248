//! Deterministic idle runner for tests

use super::{IdleCallback, IdleHandle, IdleRunner};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

struct Scheduled {
    id: u64,
    timeout: Duration,
    callback: IdleCallback,
}

/// Queues callbacks until [`run_pending`](Self::run_pending) is called
#[derive(Default)]
pub struct ManualIdleRunner {
    next_id: AtomicU64,
    queue: Mutex<Vec<Scheduled>>,
}

impl ManualIdleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback queued so far, in scheduling order.
    ///
    /// Callbacks scheduled while this runs stay queued for the next call.
    /// Returns the number of callbacks run.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for scheduled in batch {
            (scheduled.callback)();
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Timeouts of the queued callbacks, in scheduling order
    pub fn pending_timeouts(&self) -> Vec<Duration> {
        self.queue.lock().iter().map(|s| s.timeout).collect()
    }
}

impl IdleRunner for ManualIdleRunner {
    fn schedule(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push(Scheduled {
            id,
            timeout,
            callback,
        });
        IdleHandle::new(id)
    }

    fn cancel(&self, handle: IdleHandle) {
        self.queue.lock().retain(|s| s.id != handle.id());
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}
