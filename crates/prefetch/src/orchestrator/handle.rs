//! Caller-facing handle for one prefetch request

use super::active::ActiveAttempts;
use crate::tracker::AttemptId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use warmup_core::{PrefetchOutcome, ResourceKey};

/// Result of [`PrefetchOrchestrator::prefetch`](super::PrefetchOrchestrator::prefetch).
///
/// Dropping the handle does not cancel the attempt. Awaiting
/// [`completion`](Self::completion) is optional and never fails; the outcome
/// carries the failure reason instead.
pub struct PrefetchHandle {
    key: ResourceKey,
    reused: bool,
    cancelled: AtomicBool,
    attempt: Option<(AttemptId, Arc<ActiveAttempts>)>,
    outcome: watch::Receiver<Option<PrefetchOutcome>>,
}

impl PrefetchHandle {
    /// Handle for a request that was settled without running a producer
    pub(crate) fn resolved(key: ResourceKey, outcome: PrefetchOutcome) -> Self {
        let reused = outcome == PrefetchOutcome::Reused;
        let (_, rx) = watch::channel(Some(outcome));
        Self {
            key,
            reused,
            cancelled: AtomicBool::new(false),
            attempt: None,
            outcome: rx,
        }
    }

    pub(crate) fn in_flight(
        key: ResourceKey,
        attempt: AttemptId,
        active: Arc<ActiveAttempts>,
        outcome: watch::Receiver<Option<PrefetchOutcome>>,
    ) -> Self {
        Self {
            key,
            reused: false,
            cancelled: AtomicBool::new(false),
            attempt: Some((attempt, active)),
            outcome,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Satisfied from a fresh entry; no producer ran
    pub fn reused(&self) -> bool {
        self.reused
    }

    pub fn attempt(&self) -> Option<AttemptId> {
        self.attempt.as_ref().map(|(attempt, _)| *attempt)
    }

    /// True once [`cancel`](Self::cancel) has been called on this handle
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel this attempt.
    ///
    /// Only takes effect while this attempt still owns the key; a newer
    /// attempt for the same key is left alone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some((attempt, active)) = &self.attempt {
            if active.cancel_if_owner(&self.key, *attempt) {
                tracing::debug!(key = %self.key, attempt, "Prefetch cancelled through handle");
            }
        }
    }

    /// Outcome if the attempt has settled
    pub fn outcome(&self) -> Option<PrefetchOutcome> {
        self.outcome.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Wait for the attempt to settle
    pub async fn completion(&self) -> PrefetchOutcome {
        let mut rx = self.outcome.clone();
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());
        // Sender gone without an outcome: the runtime dropped the task
        settled
            .or_else(|| rx.borrow().clone())
            .unwrap_or_else(|| PrefetchOutcome::Aborted("prefetch task dropped".to_string()))
    }
}

impl fmt::Debug for PrefetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchHandle")
            .field("key", &self.key)
            .field("reused", &self.reused)
            .field("attempt", &self.attempt())
            .field("cancelled", &self.is_cancelled())
            .field("outcome", &self.outcome())
            .finish()
    }
}
