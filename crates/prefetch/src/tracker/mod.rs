//! Registry of prefetch attempts.
//!
//! # State Machine
//!
//! ```text
//! begin ──► Pending ──finalize──► Completed | Error | Aborted | Skipped
//!                                     │
//!                                     └──mark_reuse──► Reused
//! ```
//!
//! One entry exists per key. A new `begin` for a key overwrites the previous
//! entry, and finalizations carrying an older attempt id are dropped, so the
//! latest attempt always wins. A denied request never starts an attempt: it
//! finalizes the existing entry in place (or leaves a pending one alone).
//!
//! Every mutation publishes the full entry list (ordered by start time) to
//! subscribers and to a `watch` channel for external debug tooling.

mod cleanup;
mod entry;
mod subscribers;

pub use entry::{AttemptId, PrefetchEntry};
pub use subscribers::Subscription;

use crate::idle::{IdleHandle, IdleScheduler};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subscribers::Listener;
use tokio::sync::watch;
use tokio::time::Instant;
use warmup_core::{Meta, PrefetchSource, PrefetchStatus, ResourceKey};

/// Snapshot of every tracked entry, ordered by start time
pub type EntriesSnapshot = Arc<[PrefetchEntry]>;

/// Per-status entry counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub error: usize,
    pub aborted: usize,
    pub skipped: usize,
    pub reused: usize,
}

/// Shared, cheaply cloneable prefetch registry
#[derive(Clone)]
pub struct PrefetchTracker {
    inner: Arc<TrackerInner>,
}

pub(crate) struct TrackerInner {
    epoch: Instant,
    default_ttl: Duration,
    cleanup_timeout: Duration,
    idle: IdleScheduler,
    entries: Mutex<HashMap<ResourceKey, PrefetchEntry>>,
    next_attempt: AtomicU64,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    snapshot_tx: watch::Sender<EntriesSnapshot>,
    publish_lock: Mutex<()>,
    publish_pending: AtomicBool,
    cleanup_scheduled: AtomicBool,
    cleanup_handle: Mutex<Option<IdleHandle>>,
}

impl PrefetchTracker {
    pub fn new(idle: IdleScheduler, default_ttl: Duration, cleanup_timeout: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(EntriesSnapshot::from(Vec::new()));
        Self {
            inner: Arc::new(TrackerInner {
                epoch: Instant::now(),
                default_ttl,
                cleanup_timeout,
                idle,
                entries: Mutex::new(HashMap::new()),
                next_attempt: AtomicU64::new(1),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                snapshot_tx,
                publish_lock: Mutex::new(()),
                publish_pending: AtomicBool::new(false),
                cleanup_scheduled: AtomicBool::new(false),
                cleanup_handle: Mutex::new(None),
            }),
        }
    }

    /// Monotonic milliseconds since this tracker was created
    pub fn now_ms(&self) -> u64 {
        Instant::now()
            .saturating_duration_since(self.inner.epoch)
            .as_millis() as u64
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Start tracking a new attempt in `Pending`, replacing any entry for the key
    pub fn begin(
        &self,
        key: &ResourceKey,
        source: PrefetchSource,
        meta: Option<Meta>,
        ttl: Option<Duration>,
    ) -> AttemptId {
        let entry = self.new_entry(key, source, meta, ttl, PrefetchStatus::Pending);
        let attempt = entry.attempt;

        let replaced = self.inner.entries.lock().insert(key.clone(), entry);
        if let Some(previous) = replaced {
            tracing::trace!(
                key = %key,
                previous_attempt = previous.attempt,
                previous_status = %previous.status,
                "Replaced prefetch entry"
            );
        }

        self.publish();
        attempt
    }

    /// Record an attempt that admission control refused.
    ///
    /// An existing entry is finalized in place as `Skipped` and keeps its
    /// attempt id. A `Pending` entry is left to the attempt that owns it. When
    /// nothing is tracked for the key a new `Skipped` entry is written so the
    /// denial stays visible.
    pub fn record_skip(
        &self,
        key: &ResourceKey,
        source: PrefetchSource,
        meta: Option<Meta>,
        ttl: Option<Duration>,
    ) -> AttemptId {
        let now = self.now_ms();
        let (attempt, changed) = {
            let mut entries = self.inner.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    if entry.status == PrefetchStatus::Pending {
                        tracing::trace!(
                            key = %key,
                            attempt = entry.attempt,
                            "Denied request leaves in-flight attempt untouched"
                        );
                        (entry.attempt, false)
                    } else {
                        entry.status = PrefetchStatus::Skipped;
                        entry.finished_at_ms = Some(now);
                        entry.error = None;
                        (entry.attempt, true)
                    }
                }
                Entry::Vacant(vacant) => {
                    let entry =
                        vacant.insert(self.new_entry(key, source, meta, ttl, PrefetchStatus::Skipped));
                    (entry.attempt, true)
                }
            }
        };

        if changed {
            self.publish();
        }
        attempt
    }

    /// Freshness window for a request TTL; zero or unset means the default
    pub fn resolve_ttl(&self, ttl: Option<Duration>) -> Duration {
        normalize_ttl(ttl).unwrap_or(self.inner.default_ttl)
    }

    fn new_entry(
        &self,
        key: &ResourceKey,
        source: PrefetchSource,
        meta: Option<Meta>,
        ttl: Option<Duration>,
        status: PrefetchStatus,
    ) -> PrefetchEntry {
        let now = self.now_ms();
        PrefetchEntry {
            key: key.clone(),
            source,
            status,
            started_at_ms: now,
            finished_at_ms: (status == PrefetchStatus::Skipped).then_some(now),
            last_hit_at_ms: now,
            ttl_ms: self.resolve_ttl(ttl).as_millis() as u64,
            meta,
            error: None,
            attempt: self.inner.next_attempt.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Move the entry for `key` into a terminal status.
    ///
    /// Returns false (and changes nothing) when the key is not tracked or the
    /// status is not terminal.
    pub fn finalize(&self, key: &ResourceKey, status: PrefetchStatus, error: Option<String>) -> bool {
        self.finalize_inner(key, None, status, error)
    }

    /// Like [`finalize`](Self::finalize), but only if `attempt` still owns the entry
    pub fn finalize_attempt(
        &self,
        key: &ResourceKey,
        attempt: AttemptId,
        status: PrefetchStatus,
        error: Option<String>,
    ) -> bool {
        self.finalize_inner(key, Some(attempt), status, error)
    }

    fn finalize_inner(
        &self,
        key: &ResourceKey,
        attempt: Option<AttemptId>,
        status: PrefetchStatus,
        error: Option<String>,
    ) -> bool {
        if !status.is_terminal() {
            tracing::warn!(key = %key, status = %status, "Refusing to finalize into a non-terminal status");
            return false;
        }

        let now = self.now_ms();
        let updated = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(key) {
                Some(entry) if attempt.map_or(true, |a| a == entry.attempt) => {
                    entry.status = status;
                    entry.finished_at_ms = Some(now);
                    entry.error = match status {
                        PrefetchStatus::Error | PrefetchStatus::Aborted => error,
                        _ => None,
                    };
                    true
                }
                Some(entry) => {
                    tracing::trace!(
                        key = %key,
                        stale_attempt = ?attempt,
                        current_attempt = entry.attempt,
                        "Dropping finalize from superseded attempt"
                    );
                    false
                }
                None => false,
            }
        };

        if updated {
            self.publish();
            if status == PrefetchStatus::Completed {
                self.schedule_cleanup();
            }
        }
        updated
    }

    /// Record that a prefetched resource was used
    pub fn touch(&self, key: &ResourceKey) -> bool {
        self.touch_inner(key, None)
    }

    /// Like [`touch`](Self::touch), but only if `attempt` still owns the entry
    pub fn touch_attempt(&self, key: &ResourceKey, attempt: AttemptId) -> bool {
        self.touch_inner(key, Some(attempt))
    }

    fn touch_inner(&self, key: &ResourceKey, attempt: Option<AttemptId>) -> bool {
        let now = self.now_ms();
        let updated = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(key) {
                Some(entry) if attempt.map_or(true, |a| a == entry.attempt) => {
                    entry.last_hit_at_ms = now;
                    true
                }
                _ => false,
            }
        };

        if updated {
            self.publish();
        }
        updated
    }

    /// Mark an existing entry as reused by a later request
    pub fn mark_reuse(&self, key: &ResourceKey, source: PrefetchSource, meta: Option<Meta>) -> bool {
        let updated = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.status = PrefetchStatus::Reused;
                    entry.source = source;
                    entry.merge_meta(meta);
                    true
                }
                None => false,
            }
        };

        if updated {
            self.publish();
        }
        updated
    }

    /// True if the key holds a loaded entry that finished within `ttl`.
    ///
    /// Loaded covers both `Completed` and `Reused`: a reused entry stays
    /// fresh for the rest of its window, counted from when it completed.
    /// Without an explicit (non-zero) `ttl` the entry's own window is used.
    pub fn is_fresh(&self, key: &ResourceKey, ttl: Option<Duration>) -> bool {
        let now = self.now_ms();
        let ttl = normalize_ttl(ttl);
        let entries = self.inner.entries.lock();
        entries.get(key).is_some_and(|entry| {
            let ttl_ms = ttl.map_or(entry.ttl_ms, |ttl| ttl.as_millis() as u64);
            entry.is_fresh_at(now, ttl_ms)
        })
    }

    pub fn get(&self, key: &ResourceKey) -> Option<PrefetchEntry> {
        self.inner.entries.lock().get(key).cloned()
    }

    /// All entries ordered by start time
    pub fn entries(&self) -> Vec<PrefetchEntry> {
        self.inner.snapshot().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TrackerStats {
        let entries = self.inner.entries.lock();
        let mut stats = TrackerStats {
            total: entries.len(),
            ..TrackerStats::default()
        };
        for entry in entries.values() {
            match entry.status {
                PrefetchStatus::Pending => stats.pending += 1,
                PrefetchStatus::Completed => stats.completed += 1,
                PrefetchStatus::Error => stats.error += 1,
                PrefetchStatus::Aborted => stats.aborted += 1,
                PrefetchStatus::Skipped => stats.skipped += 1,
                PrefetchStatus::Reused => stats.reused += 1,
            }
        }
        stats
    }

    /// Drop every entry and any scheduled cleanup
    pub fn reset(&self) {
        self.inner.entries.lock().clear();
        self.cancel_cleanup();
        self.publish();
        tracing::debug!("Prefetch entries reset");
    }

    /// Receiver for the read-only snapshot published on every mutation
    pub fn watch(&self) -> watch::Receiver<EntriesSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Deliver the current entries to the watch channel and listeners.
    ///
    /// Publishing is serialized and every round re-reads the map, so the last
    /// snapshot delivered always matches the latest mutation. A caller that
    /// finds another thread (or a listener on its own thread) mid-publish
    /// leaves the pending flag set for that publisher to pick up.
    fn publish(&self) {
        let inner = &self.inner;
        inner.publish_pending.store(true, Ordering::SeqCst);
        while inner.publish_pending.load(Ordering::SeqCst) {
            let Some(_publishing) = inner.publish_lock.try_lock() else {
                return;
            };
            while inner.publish_pending.swap(false, Ordering::SeqCst) {
                let snapshot = inner.snapshot();
                inner.snapshot_tx.send_replace(Arc::clone(&snapshot));
                self.notify_listeners(&snapshot);
            }
        }
    }
}

fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

impl TrackerInner {
    fn snapshot(&self) -> EntriesSnapshot {
        let mut entries: Vec<PrefetchEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by_key(|entry| (entry.started_at_ms, entry.attempt));
        entries.into()
    }
}
