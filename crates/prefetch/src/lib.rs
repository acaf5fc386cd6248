//! Predictive resource prefetching for warmup.
//!
//! Resources are warmed before they are requested, subject to network-quality
//! admission control, TTL-based reuse and cooperative cancellation.
//!
//! ## Key Components
//!
//! - **`idle`**: run background work when the host is idle, with a deadline.
//! - **`network`**: admission decisions from the current network snapshot.
//! - **`tracker`**: the per-key state machine, subscriptions and cleanup.
//! - **`orchestrator`**: reuse, skip or attempt for each request.
//! - **`registry`**: producers keyed by resource and the neighbor graph.
//! - **`manager`**: the application root owning one of each.

pub mod idle;
pub mod manager;
pub mod network;
pub mod orchestrator;
pub mod registry;
pub mod tracker;

pub use self::{
    idle::{IdleCallback, IdleHandle, IdleRunner, IdleScheduler, ManualIdleRunner, TimerIdleRunner},
    manager::{PrefetchManager, PrefetchManagerBuilder},
    network::{AdmissionDecision, GuardOverrides, NetworkGuard, NetworkSnapshot, NetworkSource, SharedNetworkSource},
    orchestrator::{producer, PrefetchHandle, PrefetchOrchestrator, PrefetchRequest, Producer, ProducerFuture, SharedProducer},
    registry::{PrefetchOptions, ResourceRegistry},
    tracker::{AttemptId, EntriesSnapshot, PrefetchEntry, PrefetchTracker, Subscription, TrackerStats},
};
pub use tokio_util::sync::CancellationToken;
pub use warmup_config::{PrefetchConfig, PrefetchConfigBuilder};
pub use warmup_core::{Meta, PrefetchOutcome, PrefetchSource, PrefetchStatus, ResourceKey};
