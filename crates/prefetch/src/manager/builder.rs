//! Construction of [`PrefetchManager`]

use super::PrefetchManager;
use crate::idle::{IdleRunner, IdleScheduler, TimerIdleRunner};
use crate::network::{NetworkGuard, NetworkSource, SharedNetworkSource};
use crate::orchestrator::PrefetchOrchestrator;
use crate::registry::ResourceRegistry;
use crate::tracker::PrefetchTracker;
use std::sync::Arc;
use tokio::runtime::Handle;
use warmup_config::{PrefetchConfig, PrefetchConfigLoader};
use warmup_core::{Error, Result};

/// Builder for [`PrefetchManager`].
///
/// Unset pieces fall back to: configuration from the environment, a network
/// source reporting unknown quality, the deferred-timer idle runner and the
/// ambient tokio runtime.
#[derive(Default)]
pub struct PrefetchManagerBuilder {
    config: Option<PrefetchConfig>,
    network: Option<Arc<dyn NetworkSource>>,
    idle_runner: Option<Arc<dyn IdleRunner>>,
    native_idle_runner: Option<Arc<dyn IdleRunner>>,
    runtime: Option<Handle>,
}

impl PrefetchManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PrefetchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_network_source(mut self, source: Arc<dyn NetworkSource>) -> Self {
        self.network = Some(source);
        self
    }

    /// Use exactly this idle runner, bypassing runner selection
    pub fn with_idle_runner(mut self, runner: Arc<dyn IdleRunner>) -> Self {
        self.idle_runner = Some(runner);
        self
    }

    /// Offer a platform idle runner; it is ignored when headless
    pub fn with_native_idle_runner(mut self, runner: Arc<dyn IdleRunner>) -> Self {
        self.native_idle_runner = Some(runner);
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<PrefetchManager> {
        let config = match self.config {
            Some(config) => config,
            None => PrefetchConfigLoader::load()?,
        };

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| Error::runtime("building prefetch manager", e.to_string()))?,
        };

        let idle = match self.idle_runner {
            Some(runner) => IdleScheduler::with_runner(runner),
            None => IdleScheduler::select(
                self.native_idle_runner,
                TimerIdleRunner::new(runtime.clone()),
                warmup_utils::is_headless(),
            ),
        };

        let network: Arc<dyn NetworkSource> = match self.network {
            Some(source) => source,
            None => Arc::new(SharedNetworkSource::default()),
        };

        let guard = Arc::new(NetworkGuard::new(network, config.disabled));
        let tracker = PrefetchTracker::new(
            idle.clone(),
            config.default_ttl,
            config.cleanup_idle_timeout,
        );
        let orchestrator = PrefetchOrchestrator::new(tracker.clone(), Arc::clone(&guard), runtime);
        let registry = ResourceRegistry::new(orchestrator.clone(), idle.clone(), config.neighbor_idle_timeout);

        tracing::debug!(
            idle_runner = idle.runner_name(),
            default_ttl_ms = config.default_ttl.as_millis() as u64,
            disabled = config.disabled,
            config_source = ?config.source,
            "Prefetch manager ready"
        );

        Ok(PrefetchManager {
            config,
            idle,
            tracker,
            guard,
            orchestrator,
            registry,
        })
    }
}
