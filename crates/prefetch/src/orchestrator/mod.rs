//! Prefetch entry point.
//!
//! Each request resolves one of three ways:
//!
//! 1. **Reuse**: the key holds a fresh loaded entry. The entry is marked
//!    reused and no producer runs.
//! 2. **Skip**: admission control refuses the request. A skipped entry is
//!    recorded and no producer runs.
//! 3. **Attempt**: a new attempt is tracked, its cancellation token is
//!    registered for the key, and the producer is raced against that token
//!    on the runtime.
//!
//! Concurrent requests for the same key are not coalesced. Each starts its
//! own producer and the latest attempt owns the entry.

mod active;
mod handle;
mod producer;

pub use handle::PrefetchHandle;
pub use producer::{producer, Producer, ProducerFuture, SharedProducer};

use crate::network::NetworkGuard;
use crate::tracker::{AttemptId, PrefetchTracker};
use active::ActiveAttempts;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use warmup_core::{
    constants::ABORT_REASON, Meta, PrefetchOutcome, PrefetchSource, PrefetchStatus, ResourceKey,
};
use warmup_utils::tracing::{
    prefetch_finished, prefetch_reused, prefetch_skipped, prefetch_span, prefetch_started,
};

/// One prefetch request
pub struct PrefetchRequest {
    pub key: ResourceKey,
    pub producer: SharedProducer,
    pub source: PrefetchSource,
    /// Freshness window; the configured default when unset or zero
    pub ttl: Option<Duration>,
    pub meta: Option<Meta>,
    /// Caller token; cancelling it cancels the attempt but not the reverse
    pub cancellation: Option<CancellationToken>,
}

impl PrefetchRequest {
    pub fn new(key: ResourceKey, producer: SharedProducer, source: PrefetchSource) -> Self {
        Self {
            key,
            producer,
            source,
            ttl: None,
            meta: None,
            cancellation: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for PrefetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchRequest")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("ttl", &self.ttl)
            .field("meta", &self.meta)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// Decides reuse, skip or attempt and drives tracker transitions
#[derive(Clone)]
pub struct PrefetchOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    tracker: PrefetchTracker,
    guard: Arc<NetworkGuard>,
    active: Arc<ActiveAttempts>,
    runtime: Handle,
}

impl PrefetchOrchestrator {
    pub fn new(tracker: PrefetchTracker, guard: Arc<NetworkGuard>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                tracker,
                guard,
                active: Arc::new(ActiveAttempts::default()),
                runtime,
            }),
        }
    }

    pub fn tracker(&self) -> &PrefetchTracker {
        &self.inner.tracker
    }

    pub fn guard(&self) -> &Arc<NetworkGuard> {
        &self.inner.guard
    }

    /// Number of keys with a registered in-flight attempt
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Start, reuse or skip a prefetch. Never blocks and never fails.
    pub fn prefetch(&self, request: PrefetchRequest) -> PrefetchHandle {
        let PrefetchRequest {
            key,
            producer,
            source,
            ttl,
            meta,
            cancellation,
        } = request;
        let tracker = &self.inner.tracker;

        if tracker.is_fresh(&key, ttl) {
            tracker.mark_reuse(&key, source, meta);
            prefetch_reused(&key, source);
            return PrefetchHandle::resolved(key, PrefetchOutcome::Reused);
        }

        let decision = self.inner.guard.decide(source);
        if !decision.is_allowed() {
            tracker.record_skip(&key, source, meta, ttl);
            prefetch_skipped(&key, source, decision.as_str());
            return PrefetchHandle::resolved(key, PrefetchOutcome::Skipped);
        }

        let token = match cancellation {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let attempt = tracker.begin(&key, source, meta, ttl);
        self.inner.active.register(&key, attempt, token.clone());
        prefetch_started(&key, source, attempt);

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let span = prefetch_span(&key, source, attempt);
        let producer_task = self.inner.runtime.spawn(producer.produce(token.clone()));
        let this = self.clone();
        let task_key = key.clone();

        self.inner.runtime.spawn(
            async move {
                let started = Instant::now();
                let mut producer_task = producer_task;
                let outcome = tokio::select! {
                    biased;
                    result = &mut producer_task => classify(result, &token),
                    () = token.cancelled() => PrefetchOutcome::Aborted(ABORT_REASON.to_string()),
                };
                this.settle(&task_key, attempt, &outcome, started);
                outcome_tx.send_replace(Some(outcome));
            }
            .instrument(span),
        );

        PrefetchHandle::in_flight(key, attempt, Arc::clone(&self.inner.active), outcome_rx)
    }

    /// Cancel whatever attempt currently owns `key`
    pub fn abort_prefetch(&self, key: &ResourceKey) -> bool {
        let aborted = self.inner.active.abort(key);
        if aborted {
            tracing::debug!(key = %key, "Prefetch aborted by key");
        }
        aborted
    }

    fn settle(&self, key: &ResourceKey, attempt: AttemptId, outcome: &PrefetchOutcome, started: Instant) {
        let tracker = &self.inner.tracker;
        let status = outcome.status();
        if status == PrefetchStatus::Completed {
            tracker.touch_attempt(key, attempt);
        }
        let reason = outcome.reason().map(str::to_string);
        let applied = tracker.finalize_attempt(key, attempt, status, reason);
        self.inner.active.release_if_owner(key, attempt);

        prefetch_finished(
            key,
            status,
            started.elapsed().as_millis() as u64,
            outcome.reason(),
        );
        if !applied {
            tracing::debug!(key = %key, attempt, status = %status, "Superseded attempt settled");
        }
    }
}

impl fmt::Debug for PrefetchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchOrchestrator")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

fn classify(result: Result<anyhow::Result<()>, JoinError>, token: &CancellationToken) -> PrefetchOutcome {
    match result {
        Ok(Ok(())) => PrefetchOutcome::Completed,
        Ok(Err(err)) if token.is_cancelled() => {
            PrefetchOutcome::Aborted(format!("{ABORT_REASON}: {err:#}"))
        }
        Ok(Err(err)) => PrefetchOutcome::Failed(format!("{err:#}")),
        Err(err) if err.is_panic() => PrefetchOutcome::Failed("producer panicked".to_string()),
        Err(_) => PrefetchOutcome::Aborted(ABORT_REASON.to_string()),
    }
}

#[cfg(test)]
mod tests;
