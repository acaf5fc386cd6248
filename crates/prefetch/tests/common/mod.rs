#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warmup_prefetch::{
    producer, CancellationToken, ManualIdleRunner, NetworkSnapshot, PrefetchConfigBuilder,
    PrefetchManager, SharedNetworkSource, SharedProducer,
};

/// Manager wired to deterministic collaborators
pub struct Harness {
    pub manager: PrefetchManager,
    pub idle: Arc<ManualIdleRunner>,
    pub network: Arc<SharedNetworkSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let idle = Arc::new(ManualIdleRunner::new());
        let network = Arc::new(SharedNetworkSource::new(NetworkSnapshot::default()));
        let config = PrefetchConfigBuilder::new().with_default_ttl(ttl).build();

        let manager = PrefetchManager::builder()
            .with_config(config)
            .with_idle_runner(idle.clone())
            .with_network_source(network.clone())
            .build()
            .expect("manager builds inside a runtime");

        // Isolate from the process-level kill switch
        manager.guard().update_overrides(|o| o.disabled = Some(false));

        Self {
            manager,
            idle,
            network,
        }
    }
}

/// Producer that counts invocations and succeeds immediately
#[derive(Clone, Default)]
pub struct CountingProducer {
    calls: Arc<AtomicUsize>,
}

impl CountingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> SharedProducer {
        let calls = Arc::clone(&self.calls);
        producer(move |_token: CancellationToken| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(()) }
        })
    }

    /// Succeeds after `delay`, ignoring cancellation
    pub fn delayed(&self, delay: Duration) -> SharedProducer {
        let calls = Arc::clone(&self.calls);
        producer(move |_token: CancellationToken| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(delay).await;
                anyhow::Ok(())
            }
        })
    }
}

/// Producer that never settles
pub fn never_resolves() -> SharedProducer {
    producer(|_token: CancellationToken| std::future::pending::<anyhow::Result<()>>())
}

/// Producer that records the key it was registered under
pub fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str) -> SharedProducer {
    let log = Arc::clone(log);
    let name = name.to_string();
    producer(move |_token: CancellationToken| {
        log.lock().push(name.clone());
        async { anyhow::Ok(()) }
    })
}

/// Restores an environment variable when dropped
pub struct EnvGuard {
    name: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    pub fn set(name: &'static str, value: &str) -> Self {
        let original = std::env::var(name).ok();
        std::env::set_var(name, value);
        Self { name, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(self.name, value),
            None => std::env::remove_var(self.name),
        }
    }
}
