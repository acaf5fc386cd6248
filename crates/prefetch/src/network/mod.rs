//! Network quality snapshots and admission control

mod guard;

pub use guard::{AdmissionDecision, GuardOverrides, NetworkGuard};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Read-only view of the current network quality.
///
/// Every field is optional: unknown values never cause a denial on their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Estimated downlink bandwidth in Mbps
    pub downlink: Option<f64>,
    /// Connection class as reported by the platform, e.g. `4g`
    pub effective_type: Option<String>,
    /// Estimated round-trip time in milliseconds
    pub rtt: Option<u32>,
    /// The user asked to reduce data usage
    pub save_data: Option<bool>,
    pub online: Option<bool>,
}

impl NetworkSnapshot {
    pub fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink = Some(mbps);
        self
    }

    pub fn with_rtt(mut self, rtt_ms: u32) -> Self {
        self.rtt = Some(rtt_ms);
        self
    }

    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = Some(save_data);
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn with_effective_type(mut self, effective_type: impl Into<String>) -> Self {
        self.effective_type = Some(effective_type.into());
        self
    }
}

/// Capability that reports the current network quality
pub trait NetworkSource: Send + Sync {
    fn snapshot(&self) -> NetworkSnapshot;
}

/// Network source fed by the host application.
///
/// The host pushes updates whenever the platform reports a connectivity change;
/// readers always see the latest snapshot.
#[derive(Debug, Default)]
pub struct SharedNetworkSource {
    current: RwLock<NetworkSnapshot>,
}

impl SharedNetworkSource {
    pub fn new(snapshot: NetworkSnapshot) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// Replace the current snapshot
    pub fn set(&self, snapshot: NetworkSnapshot) {
        tracing::debug!(?snapshot, "Network snapshot updated");
        *self.current.write() = snapshot;
    }

    /// Modify the current snapshot in place
    pub fn update(&self, f: impl FnOnce(&mut NetworkSnapshot)) {
        let mut current = self.current.write();
        f(&mut *current);
        tracing::debug!(snapshot = ?*current, "Network snapshot updated");
    }
}

impl NetworkSource for SharedNetworkSource {
    fn snapshot(&self) -> NetworkSnapshot {
        self.current.read().clone()
    }
}
