//! Teardown epochs.
//!
//! Each snap carries a monotonically increasing epoch counter that is
//! advanced exactly once per idle-teardown cycle. Capability-internal
//! asynchronous work snapshots the epoch when it starts; if the epoch has
//! advanced by the time the work settles, the completion is stale — the
//! snap's resources have been torn down (and possibly rebuilt) since — and
//! its result or error must be discarded rather than delivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A per-snap teardown generation counter.
#[derive(Debug, Default)]
pub struct TeardownEpoch {
    counter: AtomicU64,
}

impl TeardownEpoch {
    /// Create a new epoch counter starting at zero.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The current epoch.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Advance to the next epoch, invalidating all outstanding guards.
    ///
    /// Returns the new epoch value.
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Error yielded when a guarded operation settles after its epoch advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("completion discarded: snap was torn down while the operation was in flight")]
pub struct Stale;

/// Guards one asynchronous operation against outliving a teardown cycle.
#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: Arc<TeardownEpoch>,
}

impl EpochGuard {
    /// Create a guard bound to the given epoch counter.
    #[must_use]
    pub fn new(epoch: Arc<TeardownEpoch>) -> Self {
        Self { epoch }
    }

    /// Run `fut`, discarding its outcome if the epoch advances before it
    /// settles.
    ///
    /// # Errors
    ///
    /// Returns [`Stale`] when the completion arrived after a teardown
    /// boundary; the inner result (success *or* failure) is dropped.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Stale>
    where
        F: Future<Output = T>,
    {
        let started_at = self.epoch.current();
        let out = fut.await;
        if self.epoch.current() == started_at {
            Ok(out)
        } else {
            Err(Stale)
        }
    }
}
