use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warmup_core::{constants::WARMUP_LOG_VAR, PrefetchSource, PrefetchStatus};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// The filter is read from `WARMUP_LOG`, then `RUST_LOG`, defaulting to `info`.
/// TTY sessions get coloured output; everything else gets a plain compact
/// formatter on stderr.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_env(WARMUP_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(crate::terminal::is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Create a span covering one prefetch attempt
pub fn prefetch_span(key: &str, source: PrefetchSource, attempt: u64) -> Span {
    span!(Level::DEBUG, "prefetch", key = %key, source = %source, attempt = attempt)
}

/// Emit a structured event for a prefetch attempt starting
pub fn prefetch_started(key: &str, source: PrefetchSource, attempt: u64) {
    debug!(
        key = %key,
        source = %source,
        attempt = attempt,
        "prefetch_started"
    );
}

/// Emit a structured event for a prefetch attempt settling
pub fn prefetch_finished(key: &str, status: PrefetchStatus, duration_ms: u64, error: Option<&str>) {
    match status {
        PrefetchStatus::Error => {
            warn!(
                key = %key,
                status = %status,
                duration_ms = duration_ms,
                error = error.unwrap_or(""),
                "prefetch_finished"
            );
        }
        _ => {
            debug!(
                key = %key,
                status = %status,
                duration_ms = duration_ms,
                "prefetch_finished"
            );
        }
    }
}

/// Emit a structured event for a prefetch denied by admission control
pub fn prefetch_skipped(key: &str, source: PrefetchSource, reason: &str) {
    debug!(
        key = %key,
        source = %source,
        reason = %reason,
        "prefetch_skipped"
    );
}

/// Emit a structured event for a request satisfied from a fresh entry
pub fn prefetch_reused(key: &str, source: PrefetchSource) {
    debug!(key = %key, source = %source, "prefetch_reused");
}
