//! The attenuated timer endowment.
//!
//! Timer delays are floored at [`MIN_DELAY_MS`] so a snap cannot schedule a
//! tight busy-loop through the host. Handles are opaque and scoped to the
//! [`Timers`] instance that created them: a handle minted by one snap's
//! timers cannot cancel another snap's timer, because each snap holds its
//! own instance with its own handle table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;
use uuid::Uuid;

/// Minimum timer delay and interval period, in milliseconds.
pub const MIN_DELAY_MS: u64 = 10;

/// Opaque handle to a pending timeout or interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(Uuid);

impl TimerHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type TimerTable = Arc<Mutex<HashMap<TimerHandle, AbortHandle>>>;

/// Per-snap timer capability.
#[derive(Debug, Default)]
pub struct Timers {
    pending: TimerTable,
}

impl Timers {
    /// Create an empty timer table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule `callback` to run once after `delay_ms` milliseconds
    /// (floored at [`MIN_DELAY_MS`]).
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TimerHandle::new();
        let delay = Duration::from_millis(delay_ms.max(MIN_DELAY_MS));
        let table = Arc::clone(&self.pending);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Deregister before firing so a callback observing the table
            // sees the timer as settled.
            let live = lock_table(&table).remove(&handle).is_some();
            if live {
                callback();
            }
        });

        lock_table(&self.pending).insert(handle, task.abort_handle());
        handle
    }

    /// Schedule `callback` to run every `period_ms` milliseconds (floored
    /// at [`MIN_DELAY_MS`]) until cleared or torn down.
    pub fn set_interval<F>(&self, period_ms: u64, callback: F) -> TimerHandle
    where
        F: Fn() + Send + 'static,
    {
        let handle = TimerHandle::new();
        let period = Duration::from_millis(period_ms.max(MIN_DELAY_MS));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately; consume
            // it so the first callback honors the period.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                callback();
            }
        });

        lock_table(&self.pending).insert(handle, task.abort_handle());
        handle
    }

    /// Cancel a pending timer. Returns `false` if the handle is unknown to
    /// this instance (settled, already cleared, or minted elsewhere).
    pub fn clear(&self, handle: TimerHandle) -> bool {
        match lock_table(&self.pending).remove(&handle) {
            Some(task) => {
                task.abort();
                true
            },
            None => false,
        }
    }

    /// Number of timers currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock_table(&self.pending).len()
    }

    /// Abort every pending timer. Used by the endowment teardown routine.
    pub fn clear_all(&self) {
        let drained: Vec<AbortHandle> = {
            let mut table = lock_table(&self.pending);
            table.drain().map(|(_, task)| task).collect()
        };
        for task in drained {
            task.abort();
        }
    }
}

fn lock_table(
    table: &Mutex<HashMap<TimerHandle, AbortHandle>>,
) -> MutexGuard<'_, HashMap<TimerHandle, AbortHandle>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}
