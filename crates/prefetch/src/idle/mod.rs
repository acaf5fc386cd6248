//! Idle-time scheduling
//!
//! Background work (cleanup sweeps, neighbor warming) is deferred until the
//! host is idle, but never later than a caller-supplied deadline. The actual
//! mechanism is an [`IdleRunner`] capability:
//!
//! - a native runner injected by the host is preferred when the process is
//!   interactive;
//! - otherwise, and always when headless, [`TimerIdleRunner`] runs the
//!   callback once the deadline elapses;
//! - tests inject [`ManualIdleRunner`] and fire callbacks explicitly.

mod manual;
mod timer;

pub use manual::ManualIdleRunner;
pub use timer::TimerIdleRunner;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Work deferred until the host is idle
pub type IdleCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one scheduled callback so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleHandle(u64);

impl IdleHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Capability that runs callbacks when the host is idle
pub trait IdleRunner: Send + Sync {
    /// Run `callback` once idle, or once `timeout` has elapsed, whichever is first
    fn schedule(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle;

    /// Cancel a scheduled callback.
    ///
    /// Must be a no-op for handles that already fired or were already cancelled.
    fn cancel(&self, handle: IdleHandle);

    /// Runner name for debugging
    fn name(&self) -> &'static str;
}

/// Front door for idle scheduling used by the tracker and registry
#[derive(Clone)]
pub struct IdleScheduler {
    runner: Arc<dyn IdleRunner>,
}

impl IdleScheduler {
    /// Pick a runner: the native one when available and interactive, the
    /// deferred timer otherwise
    pub fn select(
        native: Option<Arc<dyn IdleRunner>>,
        fallback: TimerIdleRunner,
        headless: bool,
    ) -> Self {
        let runner: Arc<dyn IdleRunner> = match native {
            Some(native) if !headless => native,
            Some(native) => {
                tracing::debug!(
                    runner = native.name(),
                    "Headless context, using deferred timer instead of native idle runner"
                );
                Arc::new(fallback)
            }
            None => Arc::new(fallback),
        };
        Self { runner }
    }

    /// Use exactly this runner, regardless of execution context
    pub fn with_runner(runner: Arc<dyn IdleRunner>) -> Self {
        Self { runner }
    }

    pub fn schedule_idle(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle {
        let handle = self.runner.schedule(callback, timeout);
        tracing::trace!(
            runner = self.runner.name(),
            handle = handle.id(),
            timeout_ms = timeout.as_millis() as u64,
            "Scheduled idle callback"
        );
        handle
    }

    pub fn cancel_idle(&self, handle: IdleHandle) {
        self.runner.cancel(handle);
    }

    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }
}

impl fmt::Debug for IdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleScheduler")
            .field("runner", &self.runner.name())
            .finish()
    }
}
