//! Prefetch configuration and its builder

use serde::{Deserialize, Serialize};
use std::time::Duration;
use warmup_core::constants::{
    DEFAULT_CLEANUP_IDLE_TIMEOUT, DEFAULT_NEIGHBOR_IDLE_TIMEOUT, DEFAULT_PREFETCH_TTL,
};

/// Runtime configuration for the prefetch subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Freshness window given to entries created without an explicit TTL
    pub default_ttl: Duration,
    /// Kill switch: when set every admission decision is a denial
    pub disabled: bool,
    /// Idle deadline for the tracker's cleanup sweep
    pub cleanup_idle_timeout: Duration,
    /// Idle deadline for neighbor warming
    pub neighbor_idle_timeout: Duration,
    /// Where the configuration came from
    pub source: ConfigSource,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_PREFETCH_TTL,
            disabled: false,
            cleanup_idle_timeout: DEFAULT_CLEANUP_IDLE_TIMEOUT,
            neighbor_idle_timeout: DEFAULT_NEIGHBOR_IDLE_TIMEOUT,
            source: ConfigSource::Default,
        }
    }
}

impl PrefetchConfig {
    /// Convert a raw millisecond TTL, falling back to the default when it is not positive
    pub fn ttl_from_millis(ttl_ms: i64) -> Duration {
        if ttl_ms > 0 {
            Duration::from_millis(ttl_ms as u64)
        } else {
            DEFAULT_PREFETCH_TTL
        }
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Environment variable
    EnvironmentVariable(String),
    /// Set in code, typically by tests or the embedding application
    Programmatic,
}

/// Builder for creating prefetch configurations
pub struct PrefetchConfigBuilder {
    config: PrefetchConfig,
}

impl PrefetchConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: PrefetchConfig {
                source: ConfigSource::Programmatic,
                ..PrefetchConfig::default()
            },
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: PrefetchConfig) -> Self {
        Self { config }
    }

    /// Set the default TTL; a zero duration keeps the built-in default
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.config.default_ttl = ttl;
        }
        self
    }

    /// Set the kill switch
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.config.disabled = disabled;
        self
    }

    /// Set the cleanup idle timeout
    pub fn with_cleanup_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.cleanup_idle_timeout = timeout;
        self
    }

    /// Set the neighbor warming idle timeout
    pub fn with_neighbor_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.neighbor_idle_timeout = timeout;
        self
    }

    /// Set configuration source
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.config.source = source;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PrefetchConfig {
        self.config
    }
}

impl Default for PrefetchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
