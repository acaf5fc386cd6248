//! Deferred-timer idle runner

use super::{IdleCallback, IdleHandle, IdleRunner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Runs each callback on the tokio runtime once its timeout elapses.
///
/// There is no idleness signal here, so the deadline is the only trigger.
pub struct TimerIdleRunner {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TimerIdleRunner {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of callbacks waiting for their deadline
    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl IdleRunner for TimerIdleRunner {
    fn schedule(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Hold the map lock until the join handle is stored so the task's own
        // removal cannot run first.
        let mut pending = self.tasks.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            tasks.lock().remove(&id);
            callback();
        });
        pending.insert(id, task);

        IdleHandle::new(id)
    }

    fn cancel(&self, handle: IdleHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.id()) {
            task.abort();
        }
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

impl Drop for TimerIdleRunner {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}
