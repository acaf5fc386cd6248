//! Producer table and neighbor graph
//!
//! Call sites register a producer per resource key once, then trigger
//! prefetches by key. Neighbor edges describe which resources are likely to
//! be requested next, so they can be warmed during idle time.

use crate::idle::{IdleHandle, IdleScheduler};
use crate::orchestrator::{PrefetchHandle, PrefetchOrchestrator, PrefetchRequest, SharedProducer};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warmup_core::{Error, Meta, PrefetchSource, ResourceKey, Result};

/// Optional request settings shared by the registry entry points
#[derive(Debug, Clone, Default)]
pub struct PrefetchOptions {
    pub ttl: Option<Duration>,
    pub meta: Option<Meta>,
    pub cancellation: Option<CancellationToken>,
}

impl PrefetchOptions {
    pub fn new() -> Self {
        Self::default()
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

    fn into_request(self, key: ResourceKey, producer: SharedProducer, source: PrefetchSource) -> PrefetchRequest {
        PrefetchRequest {
            key,
            producer,
            source,
            ttl: self.ttl,
            meta: self.meta,
            cancellation: self.cancellation,
        }
    }
}

#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    orchestrator: PrefetchOrchestrator,
    idle: IdleScheduler,
    neighbor_timeout: Duration,
    producers: DashMap<ResourceKey, SharedProducer>,
    neighbors: DashMap<ResourceKey, Vec<ResourceKey>>,
}

impl ResourceRegistry {
    pub fn new(orchestrator: PrefetchOrchestrator, idle: IdleScheduler, neighbor_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                orchestrator,
                idle,
                neighbor_timeout,
                producers: DashMap::new(),
                neighbors: DashMap::new(),
            }),
        }
    }

    /// Register (or replace) the producer for `key`
    pub fn register(&self, key: &str, producer: SharedProducer) -> Result<()> {
        let key = ResourceKey::new(key)?;
        if self.inner.producers.insert(key.clone(), producer).is_some() {
            tracing::debug!(key = %key, "Replaced registered producer");
        }
        Ok(())
    }

    /// Declare the resources likely to be requested after `key`.
    ///
    /// Replaces any earlier list. Fails without changes if any key is malformed.
    pub fn register_neighbors<I, S>(&self, key: &str, neighbors: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = ResourceKey::new(key)?;
        let neighbors = neighbors
            .into_iter()
            .map(ResourceKey::new)
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!(key = %key, count = neighbors.len(), "Registered neighbors");
        self.inner.neighbors.insert(key, neighbors);
        Ok(())
    }

    /// Registered producer for `key`
    pub fn producer(&self, key: &str) -> Result<SharedProducer> {
        self.inner.lookup(key).map(|(_, producer)| producer)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.inner.producers.contains_key(key)
    }

    pub fn neighbors_of(&self, key: &str) -> Vec<ResourceKey> {
        self.inner
            .neighbors
            .get(key)
            .map(|n| n.value().clone())
            .unwrap_or_default()
    }

    /// Prefetch with a caller-chosen producer, bypassing the table
    pub fn warm_route(
        &self,
        producer: SharedProducer,
        key: ResourceKey,
        source: PrefetchSource,
        options: PrefetchOptions,
    ) -> PrefetchHandle {
        self.inner
            .orchestrator
            .prefetch(options.into_request(key, producer, source))
    }

    /// Prefetch the registered producer for `key`.
    ///
    /// Returns `None` for malformed or unregistered keys.
    pub fn prefetch_by_key(
        &self,
        key: &str,
        source: PrefetchSource,
        options: Option<PrefetchOptions>,
    ) -> Option<PrefetchHandle> {
        self.inner.prefetch_by_key(key, source, options)
    }

    /// Warm every neighbor of `key` once the host is idle.
    ///
    /// Schedules a single idle callback that prefetches each neighbor with
    /// source `idle`. Returns `None` when `key` has no neighbors.
    pub fn warm_neighbors(&self, key: &str) -> Option<IdleHandle> {
        let neighbors = self.neighbors_of(key);
        if neighbors.is_empty() {
            return None;
        }

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let origin = key.to_string();
        let handle = self.inner.idle.schedule_idle(
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                tracing::debug!(key = %origin, count = neighbors.len(), "Warming neighbors");
                for neighbor in &neighbors {
                    inner.prefetch_by_key(neighbor, PrefetchSource::Idle, None);
                }
            }),
            self.inner.neighbor_timeout,
        );
        Some(handle)
    }
}

impl RegistryInner {
    fn prefetch_by_key(
        &self,
        key: &str,
        source: PrefetchSource,
        options: Option<PrefetchOptions>,
    ) -> Option<PrefetchHandle> {
        let (key, producer) = match self.lookup(key) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring prefetch by key");
                return None;
            }
        };
        let request = options.unwrap_or_default().into_request(key, producer, source);
        Some(self.orchestrator.prefetch(request))
    }

    fn lookup(&self, key: &str) -> Result<(ResourceKey, SharedProducer)> {
        let key = ResourceKey::new(key)?;
        let producer = self
            .producers
            .get(&key)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| Error::unknown_resource(key.as_str()))?;
        Ok((key, producer))
    }
}
