//! The invocation scheduler.
//!
//! Makes "how many calls are in flight for snap X" an observable, races
//! every call against a cooperative stop signal, and fires idle teardown
//! exactly once per transition from "≥1 running" to "0 running". Teardown
//! is per-transition, not once-ever: a snap torn down and invoked again
//! later gets a fresh teardown cycle the next time it goes idle. Teardown
//! never overlaps a live invocation; a call arriving while a cycle is
//! draining is held at admission until the cycle completes.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use warden_core::{InvocationId, SnapId};
use warden_endowments::Teardown;

use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::SnapExecutor;

impl SnapExecutor {
    /// Run `work` as one tracked invocation of `snap_id`.
    ///
    /// The work races a stop trigger: when the host terminates the
    /// sandbox, every live trigger fires and every in-flight call fails
    /// with [`ExecutorError::Terminated`]. The losing future is dropped,
    /// releasing whatever it held.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::UnknownSnap`] if no state exists for
    /// `snap_id`, [`ExecutorError::Terminated`] on forced stop, and the
    /// work's own error otherwise.
    pub async fn execute_in_context<T>(
        &self,
        snap_id: &SnapId,
        work: impl Future<Output = ExecutorResult<T>>,
    ) -> ExecutorResult<T> {
        let invocation = InvocationId::new();
        let token = CancellationToken::new();
        loop {
            let drain = {
                let mut snaps = self.snaps.lock().await;
                let state = snaps
                    .get_mut(snap_id)
                    .ok_or_else(|| ExecutorError::UnknownSnap {
                        snap_id: snap_id.clone(),
                    })?;
                match state.draining.clone() {
                    Some(drain) => drain,
                    None => {
                        state.invocations.insert(invocation, token.clone());
                        break;
                    },
                }
            };
            // A teardown cycle is draining this snap's resources; admit
            // the invocation only once the cycle has completed, so the
            // drain cannot abort what the invocation opens.
            drain.cancelled().await;
        }
        debug!(snap_id = %snap_id, %invocation, "Invocation started");

        let result = tokio::select! {
            out = work => out,
            () = token.cancelled() => Err(ExecutorError::Terminated {
                snap_id: snap_id.clone(),
            }),
        };

        self.settle(snap_id, invocation).await;
        result
    }

    /// Deregister a settled invocation. When the last invocation for the
    /// snap settles, advance the teardown epoch and run the aggregate
    /// teardown — strictly after every concurrent invocation, never while
    /// one is live.
    async fn settle(&self, snap_id: &SnapId, invocation: InvocationId) {
        let cycle: Option<(Teardown, CancellationToken)> = {
            let mut snaps = self.snaps.lock().await;
            match snaps.get_mut(snap_id) {
                Some(state) => {
                    state.invocations.remove(&invocation);
                    if state.invocations.is_empty() {
                        state.epoch.advance();
                        let drain = CancellationToken::new();
                        state.draining = Some(drain.clone());
                        Some((state.idle_teardown.clone(), drain))
                    } else {
                        None
                    }
                },
                // `terminate` already drained the table; it owns teardown.
                None => None,
            }
        };

        if let Some((teardown, drain)) = cycle {
            debug!(snap_id = %snap_id, "Snap idle, running teardown");
            teardown.run().await;
            {
                let mut snaps = self.snaps.lock().await;
                if let Some(state) = snaps.get_mut(snap_id) {
                    state.draining = None;
                }
            }
            // Release invocations waiting for this cycle.
            drain.cancel();
        }
    }
}
