/// Constants used throughout the warmup codebase
use std::time::Duration;

// Environment variable names
pub const WARMUP_PREFETCH_TTL_VAR: &str = "WARMUP_PREFETCH_TTL_MS";
pub const WARMUP_PREFETCH_DISABLED_VAR: &str = "WARMUP_PREFETCH_DISABLED";
pub const WARMUP_PREFETCH_CLEANUP_TIMEOUT_VAR: &str = "WARMUP_PREFETCH_CLEANUP_TIMEOUT_MS";
pub const WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_VAR: &str = "WARMUP_PREFETCH_NEIGHBOR_TIMEOUT_MS";
pub const WARMUP_LOG_VAR: &str = "WARMUP_LOG";

// Freshness
pub const DEFAULT_PREFETCH_TTL_MS: u64 = 60_000;
pub const DEFAULT_PREFETCH_TTL: Duration = Duration::from_millis(DEFAULT_PREFETCH_TTL_MS);

/// Completed entries are swept once they are older than `ttl * CLEANUP_TTL_MULTIPLIER`
pub const CLEANUP_TTL_MULTIPLIER: u32 = 4;

// Idle scheduling
pub const DEFAULT_CLEANUP_IDLE_TIMEOUT: Duration = Duration::from_millis(1_000);
pub const DEFAULT_NEIGHBOR_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

// Admission thresholds
pub const LOW_BANDWIDTH_MBPS: f64 = 1.5;
pub const HIGH_LATENCY_MS: u32 = 400;

// Reason recorded on entries aborted through cancellation
pub const ABORT_REASON: &str = "prefetch aborted";
