//! Application root for the prefetch subsystem
//!
//! A [`PrefetchManager`] owns one tracker, guard, orchestrator and registry,
//! wired to a shared idle scheduler. Hosts construct it once and pass it
//! around (it is cheap to clone).

mod builder;

pub use builder::PrefetchManagerBuilder;

use crate::idle::{IdleHandle, IdleScheduler};
use crate::network::NetworkGuard;
use crate::orchestrator::{PrefetchHandle, PrefetchOrchestrator, PrefetchRequest, SharedProducer};
use crate::registry::{PrefetchOptions, ResourceRegistry};
use crate::tracker::{EntriesSnapshot, PrefetchEntry, PrefetchTracker, Subscription, TrackerStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use warmup_config::PrefetchConfig;
use warmup_core::{PrefetchSource, ResourceKey, Result};

#[derive(Clone)]
pub struct PrefetchManager {
    config: PrefetchConfig,
    idle: IdleScheduler,
    tracker: PrefetchTracker,
    guard: Arc<NetworkGuard>,
    orchestrator: PrefetchOrchestrator,
    registry: ResourceRegistry,
}

impl PrefetchManager {
    pub fn builder() -> PrefetchManagerBuilder {
        PrefetchManagerBuilder::new()
    }

    /// Build with configuration from the environment on the current runtime
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    pub fn prefetch(&self, request: PrefetchRequest) -> PrefetchHandle {
        self.orchestrator.prefetch(request)
    }

    /// Cancel the in-flight attempt for `key`, if any
    pub fn abort_prefetch(&self, key: &str) -> bool {
        ResourceKey::new(key).is_ok_and(|key| self.orchestrator.abort_prefetch(&key))
    }

    pub fn warm_route(
        &self,
        producer: SharedProducer,
        key: ResourceKey,
        source: PrefetchSource,
        options: PrefetchOptions,
    ) -> PrefetchHandle {
        self.registry.warm_route(producer, key, source, options)
    }

    pub fn prefetch_by_key(
        &self,
        key: &str,
        source: PrefetchSource,
        options: Option<PrefetchOptions>,
    ) -> Option<PrefetchHandle> {
        self.registry.prefetch_by_key(key, source, options)
    }

    pub fn warm_neighbors(&self, key: &str) -> Option<IdleHandle> {
        self.registry.warm_neighbors(key)
    }

    pub fn register_prefetch(&self, key: &str, producer: SharedProducer) -> Result<()> {
        self.registry.register(key, producer)
    }

    pub fn register_neighbors<I, S>(&self, key: &str, neighbors: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry.register_neighbors(key, neighbors)
    }

    /// Record a hit on a prefetched resource
    pub fn touch_prefetch(&self, key: &str) -> bool {
        ResourceKey::new(key).is_ok_and(|key| self.tracker.touch(&key))
    }

    pub fn is_prefetch_fresh(&self, key: &str, ttl: Option<Duration>) -> bool {
        ResourceKey::new(key).is_ok_and(|key| self.tracker.is_fresh(&key, ttl))
    }

    pub fn entries(&self) -> Vec<PrefetchEntry> {
        self.tracker.entries()
    }

    pub fn subscribe_entries<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[PrefetchEntry]) + Send + Sync + 'static,
    {
        self.tracker.subscribe(listener)
    }

    pub fn watch_entries(&self) -> watch::Receiver<EntriesSnapshot> {
        self.tracker.watch()
    }

    pub fn reset_entries(&self) {
        self.tracker.reset();
    }

    pub fn stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    pub fn tracker(&self) -> &PrefetchTracker {
        &self.tracker
    }

    pub fn guard(&self) -> &NetworkGuard {
        &self.guard
    }

    pub fn idle(&self) -> &IdleScheduler {
        &self.idle
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for PrefetchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchManager")
            .field("config", &self.config)
            .field("idle", &self.idle)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::ManualIdleRunner;
    use warmup_config::PrefetchConfigBuilder;

    #[test]
    fn test_build_requires_runtime() {
        let err = PrefetchManager::builder()
            .with_config(PrefetchConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, warmup_core::Error::Runtime { .. }));
    }

    #[tokio::test]
    async fn test_build_wires_config_and_runner() {
        let config = PrefetchConfigBuilder::new()
            .with_default_ttl(Duration::from_secs(5))
            .build();
        let manager = PrefetchManager::builder()
            .with_config(config)
            .with_idle_runner(Arc::new(ManualIdleRunner::new()))
            .build()
            .unwrap();

        assert_eq!(manager.config().default_ttl, Duration::from_secs(5));
        assert_eq!(manager.tracker().default_ttl(), Duration::from_secs(5));
        assert_eq!(manager.idle().runner_name(), "manual");
        assert!(manager.entries().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_keys_are_noops() {
        let manager = PrefetchManager::builder()
            .with_config(PrefetchConfig::default())
            .with_idle_runner(Arc::new(ManualIdleRunner::new()))
            .build()
            .unwrap();

        assert!(!manager.abort_prefetch(""));
        assert!(!manager.touch_prefetch("\n"));
        assert!(!manager.is_prefetch_fresh("", None));
        assert!(manager.prefetch_by_key("", PrefetchSource::Nav, None).is_none());
        assert!(manager.warm_neighbors("").is_none());
    }
}
