//! Tracked prefetch entries

use serde::{Deserialize, Serialize};
use warmup_core::{Meta, PrefetchSource, PrefetchStatus, ResourceKey};

/// Identifies one prefetch attempt; a newer attempt for the same key has a larger id
pub type AttemptId = u64;

/// One tracked prefetch attempt.
///
/// Timestamps are monotonic milliseconds since the owning tracker was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchEntry {
    pub key: ResourceKey,
    pub source: PrefetchSource,
    pub status: PrefetchStatus,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub last_hit_at_ms: u64,
    pub ttl_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempt: AttemptId,
}

impl PrefetchEntry {
    /// Milliseconds since the attempt finished, if it has
    pub fn age_since_finish_ms(&self, now_ms: u64) -> Option<u64> {
        self.finished_at_ms
            .map(|finished| now_ms.saturating_sub(finished))
    }

    /// Loaded and finished no more than `ttl_ms` ago
    pub fn is_fresh_at(&self, now_ms: u64, ttl_ms: u64) -> bool {
        self.status.is_loaded()
            && self
                .age_since_finish_ms(now_ms)
                .is_some_and(|age| age <= ttl_ms)
    }

    /// Loaded and old enough for the cleanup sweep to drop it
    pub fn is_expired_at(&self, now_ms: u64, multiplier: u32) -> bool {
        self.status.is_loaded()
            && self
                .age_since_finish_ms(now_ms)
                .is_some_and(|age| age > self.ttl_ms.saturating_mul(u64::from(multiplier)))
    }

    pub(crate) fn merge_meta(&mut self, meta: Option<Meta>) {
        if let Some(meta) = meta {
            self.meta.get_or_insert_with(Meta::new).extend(meta);
        }
    }
}
