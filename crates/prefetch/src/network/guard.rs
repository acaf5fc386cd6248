//! Admission control for prefetch attempts.
//!
//! # Decision order
//!
//! ```text
//! disabled?            -> Disabled
//! offline?             -> Offline
//! save-data?           -> SaveData
//! downlink < 1.5 Mbps  -> LowBandwidth unless hover/keyboard
//! rtt > 400 ms         -> HighLatency for viewport/idle
//! otherwise            -> Allowed
//! ```
//!
//! The first matching rule wins. Evaluation performs no I/O.

use super::{NetworkSnapshot, NetworkSource};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use warmup_config::kill_switch_from_env;
use warmup_core::{
    constants::{HIGH_LATENCY_MS, LOW_BANDWIDTH_MBPS},
    PrefetchSource,
};

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed,
    /// Kill switch or explicit disable override
    Disabled,
    Offline,
    SaveData,
    LowBandwidth,
    HighLatency,
}

impl AdmissionDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AdmissionDecision::Allowed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionDecision::Allowed => "allowed",
            AdmissionDecision::Disabled => "disabled",
            AdmissionDecision::Offline => "offline",
            AdmissionDecision::SaveData => "save_data",
            AdmissionDecision::LowBandwidth => "low_bandwidth",
            AdmissionDecision::HighLatency => "high_latency",
        }
    }
}

impl fmt::Display for AdmissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values that take precedence over the network source and kill switch.
///
/// Intended for deterministic tests and for hosts that know better than the
/// platform's connectivity estimate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardOverrides {
    pub disabled: Option<bool>,
    /// Used instead of the network source's snapshot
    pub snapshot: Option<NetworkSnapshot>,
    pub save_data: Option<bool>,
    pub online: Option<bool>,
}

/// Decides whether a prefetch attempt may proceed
pub struct NetworkGuard {
    source: Arc<dyn NetworkSource>,
    config_disabled: bool,
    overrides: RwLock<GuardOverrides>,
}

impl NetworkGuard {
    pub fn new(source: Arc<dyn NetworkSource>, config_disabled: bool) -> Self {
        Self {
            source,
            config_disabled,
            overrides: RwLock::new(GuardOverrides::default()),
        }
    }

    /// Decide admission for `source` against the current network state
    pub fn decide(&self, source: PrefetchSource) -> AdmissionDecision {
        let overrides = self.overrides.read().clone();

        let disabled = overrides
            .disabled
            .unwrap_or_else(|| self.config_disabled || kill_switch_from_env());

        let mut snapshot = match overrides.snapshot {
            Some(snapshot) => snapshot,
            None => self.source.snapshot(),
        };
        if let Some(save_data) = overrides.save_data {
            snapshot.save_data = Some(save_data);
        }
        if let Some(online) = overrides.online {
            snapshot.online = Some(online);
        }

        let decision = Self::evaluate(&snapshot, source, disabled);
        tracing::trace!(
            source = %source,
            decision = %decision,
            downlink = ?snapshot.downlink,
            rtt = ?snapshot.rtt,
            "Admission decision"
        );
        decision
    }

    pub fn can_prefetch(&self, source: PrefetchSource) -> bool {
        self.decide(source).is_allowed()
    }

    /// Pure admission rule over an explicit snapshot
    pub fn evaluate(
        snapshot: &NetworkSnapshot,
        source: PrefetchSource,
        disabled: bool,
    ) -> AdmissionDecision {
        if disabled {
            return AdmissionDecision::Disabled;
        }

        if snapshot.online == Some(false) {
            return AdmissionDecision::Offline;
        }

        if snapshot.save_data == Some(true) {
            return AdmissionDecision::SaveData;
        }

        if let Some(downlink) = snapshot.downlink {
            if downlink < LOW_BANDWIDTH_MBPS && !source.is_high_intent() {
                return AdmissionDecision::LowBandwidth;
            }
        }

        if let Some(rtt) = snapshot.rtt {
            if rtt > HIGH_LATENCY_MS && source.is_background() {
                return AdmissionDecision::HighLatency;
            }
        }

        AdmissionDecision::Allowed
    }

    pub fn overrides(&self) -> GuardOverrides {
        self.overrides.read().clone()
    }

    pub fn set_overrides(&self, overrides: GuardOverrides) {
        *self.overrides.write() = overrides;
    }

    pub fn update_overrides(&self, f: impl FnOnce(&mut GuardOverrides)) {
        f(&mut *self.overrides.write());
    }

    pub fn clear_overrides(&self) {
        self.set_overrides(GuardOverrides::default());
    }
}
