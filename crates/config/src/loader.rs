//! Configuration loader for the prefetch subsystem
//!
//! Precedence is defaults < environment variables. Values set in code go
//! through [`PrefetchConfigBuilder`](crate::PrefetchConfigBuilder) instead.

use crate::config::{ConfigSource, PrefetchConfig};
use std::time::Duration;
use warmup_core::{
    constants::{
        WARMUP_PREFETCH_CLEANUP_TIMEOUT_VAR, WARMUP_PREFETCH_DISABLED_VAR,
        WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_VAR, WARMUP_PREFETCH_TTL_VAR,
    },
    Error, Result, ResultExt,
};

/// Configuration loader that handles precedence
pub struct PrefetchConfigLoader;

impl PrefetchConfigLoader {
    /// Load configuration from defaults and the process environment
    pub fn load() -> Result<PrefetchConfig> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Load configuration using a custom variable lookup
    pub fn load_with<F>(lookup: F) -> Result<PrefetchConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PrefetchConfig::default();
        let mut overridden = Vec::new();

        if let Some(raw) = lookup(WARMUP_PREFETCH_TTL_VAR) {
            let ttl_ms = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("invalid value for {WARMUP_PREFETCH_TTL_VAR}"))?;
            config.default_ttl = PrefetchConfig::ttl_from_millis(ttl_ms);
            overridden.push(WARMUP_PREFETCH_TTL_VAR);
        }

        if let Some(raw) = lookup(WARMUP_PREFETCH_DISABLED_VAR) {
            config.disabled = parse_bool(&raw).ok_or_else(|| {
                Error::environment(
                    WARMUP_PREFETCH_DISABLED_VAR,
                    format!("expected a boolean, got '{raw}'"),
                )
            })?;
            overridden.push(WARMUP_PREFETCH_DISABLED_VAR);
        }

        if let Some(raw) = lookup(WARMUP_PREFETCH_CLEANUP_TIMEOUT_VAR) {
            config.cleanup_idle_timeout = parse_millis(WARMUP_PREFETCH_CLEANUP_TIMEOUT_VAR, &raw)?;
            overridden.push(WARMUP_PREFETCH_CLEANUP_TIMEOUT_VAR);
        }

        if let Some(raw) = lookup(WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_VAR) {
            config.neighbor_idle_timeout =
                parse_millis(WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_VAR, &raw)?;
            overridden.push(WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_VAR);
        }

        if !overridden.is_empty() {
            config.source = ConfigSource::EnvironmentVariable(overridden.join(","));
        }

        tracing::debug!(
            default_ttl_ms = config.default_ttl.as_millis() as u64,
            disabled = config.disabled,
            source = ?config.source,
            "Loaded prefetch configuration"
        );

        Ok(config)
    }
}

/// Read the environment kill switch.
///
/// Admission control calls this once per decision, so flipping the variable
/// takes effect without rebuilding anything. Unrecognised values read as off.
pub fn kill_switch_from_env() -> bool {
    match std::env::var(WARMUP_PREFETCH_DISABLED_VAR) {
        Ok(raw) => match parse_bool(&raw) {
            Some(disabled) => disabled,
            None => {
                tracing::debug!(value = %raw, "Ignoring unrecognised kill switch value");
                false
            }
        },
        Err(_) => false,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_millis(variable: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::environment(variable, e.to_string()))
}
