//! Idle-driven sweep of expired entries

use super::{PrefetchTracker, TrackerInner};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use warmup_core::constants::CLEANUP_TTL_MULTIPLIER;

impl PrefetchTracker {
    /// Queue a sweep unless one is already outstanding
    pub(super) fn schedule_cleanup(&self) {
        if self
            .inner
            .cleanup_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        let handle = self.inner.idle.schedule_idle(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    PrefetchTracker { inner }.run_cleanup();
                }
            }),
            self.inner.cleanup_timeout,
        );
        *self.inner.cleanup_handle.lock() = Some(handle);
    }

    pub(super) fn cancel_cleanup(&self) {
        let handle = self.inner.cleanup_handle.lock().take();
        if let Some(handle) = handle {
            self.inner.idle.cancel_idle(handle);
        }
        self.inner.cleanup_scheduled.store(false, Ordering::Release);
    }

    /// Drop loaded entries older than `ttl * 4` and reschedule while loaded
    /// entries remain. Returns the number of entries removed.
    pub fn run_cleanup(&self) -> usize {
        self.inner.cleanup_handle.lock().take();
        self.inner.cleanup_scheduled.store(false, Ordering::Release);

        let now = self.now_ms();
        let (removed, remaining_loaded) = {
            let mut entries = self.inner.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now, CLEANUP_TTL_MULTIPLIER));
            let remaining = entries.values().filter(|e| e.status.is_loaded()).count();
            (before - entries.len(), remaining)
        };

        if removed > 0 {
            tracing::debug!(removed, remaining_loaded, "Swept expired prefetch entries");
            self.publish();
        }
        if remaining_loaded > 0 {
            self.schedule_cleanup();
        }
        removed
    }

    /// True while a sweep is queued with the idle scheduler
    pub fn cleanup_pending(&self) -> bool {
        self.inner.cleanup_scheduled.load(Ordering::Acquire)
    }
}
