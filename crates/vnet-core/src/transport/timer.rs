//! Timer service backed by the tokio clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;

use super::{TimerError, TimerHandle, TimerHook, Timers};

type ActiveTimers = Arc<Mutex<HashMap<i64, AbortHandle>>>;

fn lock(active: &ActiveTimers) -> MutexGuard<'_, HashMap<i64, AbortHandle>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot timers as sleeping tokio tasks. Must be used from inside a tokio runtime.
#[derive(Debug, Default)]
pub struct TokioTimers {
    next_id: AtomicI64,
    active: ActiveTimers,
}

impl TokioTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers started and neither fired nor cancelled.
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

impl Timers for TokioTimers {
    fn start(&self, delay: Duration, hook: TimerHook) -> Result<TimerHandle, TimerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::clone(&self.active);

        // Hold the table while spawning so a zero-delay timer cannot remove
        // itself before it was inserted.
        let mut table = lock(&self.active);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&active).remove(&id);
            hook.fire();
        });
        table.insert(id, task.abort_handle());
        Ok(TimerHandle(id))
    }

    fn cancel(&self, timer: TimerHandle) {
        if let Some(task) = lock(&self.active).remove(&timer.0) {
            task.abort();
        }
    }
}
