//! The execution context manager.
//!
//! [`SnapExecutor`] owns the per-snap lifecycle state: it provisions
//! capability sets, creates isolated module contexts through the
//! configured [`ModuleLoader`], evaluates snap source inside a tracked
//! invocation, validates the captured exports, and tears everything down
//! on failure or termination.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use warden_core::{HandlerKind, InvocationId, SnapId, TeardownEpoch};
use warden_endowments::{
    Endowments, EndowmentRegistry, OutboundChannel, ProvisionerContext, ProvisionerOptions,
    Teardown, provision,
};

use crate::error::{ExecutorError, ExecutorResult};
use crate::guard::{ChannelFlavor, GuardedChannel};
use crate::module::{ModuleEnv, ModuleLoader, SnapExports};
use crate::notify::{Notifier, SinkRegistry};

/// Lifecycle state for one loaded snap.
pub(crate) struct SnapState {
    pub(crate) exports: SnapExports,
    pub(crate) invocations: HashMap<InvocationId, CancellationToken>,
    pub(crate) idle_teardown: Teardown,
    pub(crate) epoch: Arc<TeardownEpoch>,
    /// Set while an idle-teardown cycle is draining resources; new
    /// invocations are admitted only after it completes.
    pub(crate) draining: Option<CancellationToken>,
}

/// The sandbox core: one executor hosts many snaps, each in its own
/// isolated context with its own capability set.
pub struct SnapExecutor {
    registry: Arc<EndowmentRegistry>,
    loader: Arc<dyn ModuleLoader>,
    notifier: Notifier,
    sinks: SinkRegistry,
    options: ProvisionerOptions,
    outbound: Option<Arc<dyn OutboundChannel>>,
    pub(crate) snaps: Mutex<HashMap<SnapId, SnapState>>,
}

impl SnapExecutor {
    /// Create an executor over the given factory catalog and module
    /// backend.
    #[must_use]
    pub fn new(
        registry: Arc<EndowmentRegistry>,
        loader: Arc<dyn ModuleLoader>,
        notifier: Notifier,
    ) -> Self {
        Self {
            registry,
            loader,
            sinks: SinkRegistry::new(notifier.clone()),
            notifier,
            options: ProvisionerOptions::default(),
            outbound: None,
            snaps: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the host-provided outbound request channel. Snap-facing
    /// views of this channel are always guard-wrapped.
    #[must_use]
    pub fn with_outbound_channel(mut self, channel: Arc<dyn OutboundChannel>) -> Self {
        self.outbound = Some(channel);
        self
    }

    /// Override provisioning behavior (ambient passthrough and values).
    #[must_use]
    pub fn with_provisioner_options(mut self, options: ProvisionerOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether a snap is currently loaded.
    pub async fn has_snap(&self, snap_id: &SnapId) -> bool {
        self.snaps.lock().await.contains_key(snap_id)
    }

    /// Number of in-flight invocations for a snap (0 if unknown).
    pub async fn running_invocations(&self, snap_id: &SnapId) -> usize {
        self.snaps
            .lock()
            .await
            .get(snap_id)
            .map_or(0, |state| state.invocations.len())
    }

    /// The current teardown epoch for a snap, if loaded.
    pub async fn snap_epoch(&self, snap_id: &SnapId) -> Option<u64> {
        self.snaps
            .lock()
            .await
            .get(snap_id)
            .map(|state| state.epoch.current())
    }

    /// Load, evaluate and register a snap.
    ///
    /// The instance state (with the aggregate teardown) is installed
    /// *before* evaluation begins, so a snap erroring mid-evaluation has a
    /// well-defined teardown path. Evaluation itself runs inside a tracked
    /// invocation, subjecting a hung evaluation to the same cancellation
    /// path as a normal call.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::AlreadyStarted`] for a loaded snap id, and
    /// [`ExecutorError::Evaluation`] (after removing all state) when
    /// provisioning, evaluation or export validation fails.
    pub async fn start_snap(
        &self,
        snap_id: SnapId,
        source: &str,
        endowment_names: &[String],
    ) -> ExecutorResult<()> {
        let epoch = TeardownEpoch::new();
        let (endowments, idle_teardown) =
            self.provision_endowments(&snap_id, &epoch, endowment_names)?;

        {
            let mut snaps = self.snaps.lock().await;
            if snaps.contains_key(&snap_id) {
                return Err(ExecutorError::AlreadyStarted { snap_id });
            }
            snaps.insert(
                snap_id.clone(),
                SnapState {
                    exports: SnapExports::empty(),
                    invocations: HashMap::new(),
                    idle_teardown,
                    epoch: Arc::clone(&epoch),
                    draining: None,
                },
            );
        }

        // The start is committed; supersede only this id's prior error
        // listeners. A rejected start must leave the incumbent's sink live.
        let error_sink = self.sinks.new_sink(snap_id.clone());

        let env = ModuleEnv {
            snap_id: snap_id.clone(),
            endowments,
            snap_channel: self.guarded_channel(&snap_id, &epoch, ChannelFlavor::SnapChannel),
            error_sink,
        };

        let source = source.to_string();
        let loader = Arc::clone(&self.loader);
        let evaluated = self
            .execute_in_context(&snap_id, async move { loader.evaluate(&source, env).await })
            .await;

        match evaluated {
            Ok(raw) => {
                let exports = SnapExports::validate(&snap_id, raw);
                let mut snaps = self.snaps.lock().await;
                if let Some(state) = snaps.get_mut(&snap_id) {
                    state.exports = exports;
                }
                info!(snap_id = %snap_id, "Snap started");
                Ok(())
            },
            Err(e) => {
                self.remove_snap(&snap_id).await;
                Err(ExecutorError::Evaluation {
                    snap_id,
                    reason: e.to_string(),
                })
            },
        }
    }

    /// Invoke one of a snap's exported handlers.
    ///
    /// A missing optional handler resolves to `null` without starting an
    /// invocation; a missing mandatory handler is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::UnknownSnap`] for unloaded snaps,
    /// [`ExecutorError::MissingHandler`] for absent mandatory kinds, and
    /// propagates handler failures and termination.
    pub async fn snap_rpc(
        &self,
        snap_id: &SnapId,
        kind: HandlerKind,
        origin: &str,
        request: Value,
    ) -> ExecutorResult<Value> {
        let handler = {
            let snaps = self.snaps.lock().await;
            let state = snaps.get(snap_id).ok_or_else(|| ExecutorError::UnknownSnap {
                snap_id: snap_id.clone(),
            })?;
            state.exports.get(kind)
        };

        let Some(handler) = handler else {
            if kind.is_required() {
                return Err(ExecutorError::MissingHandler {
                    snap_id: snap_id.clone(),
                    kind,
                });
            }
            debug!(snap_id = %snap_id, %kind, "No handler exported, defaulting to null");
            return Ok(Value::Null);
        };

        let origin = origin.to_string();
        let result = self
            .execute_in_context(snap_id, async move { handler.handle(&origin, request).await })
            .await?;
        Ok(result.unwrap_or(Value::Null))
    }

    /// Delete a snap's instance state. Idempotent.
    pub async fn remove_snap(&self, snap_id: &SnapId) {
        if self.snaps.lock().await.remove(snap_id).is_some() {
            debug!(snap_id = %snap_id, "Removed snap state");
        }
    }

    /// Force-end every in-flight invocation across every snap, then clear
    /// the whole state table and drain each snap's resources.
    ///
    /// This is the only path that ends invocations irrespective of their
    /// own completion; each one fails with a termination error.
    pub async fn terminate(&self) {
        let drained: Vec<(SnapId, SnapState)> = {
            let mut snaps = self.snaps.lock().await;
            snaps.drain().collect()
        };

        for (snap_id, state) in &drained {
            for token in state.invocations.values() {
                token.cancel();
            }
            info!(snap_id = %snap_id, "Terminating snap");
        }
        // Drain resources after the stop triggers have fired.
        for (_, state) in drained {
            state.epoch.advance();
            state.idle_teardown.run().await;
        }
    }

    fn provision_endowments(
        &self,
        snap_id: &SnapId,
        epoch: &Arc<TeardownEpoch>,
        names: &[String],
    ) -> ExecutorResult<(Endowments, Teardown)> {
        let ctx = ProvisionerContext {
            snap_id: snap_id.clone(),
            epoch: Arc::clone(epoch),
            provider: self.guarded_channel(snap_id, epoch, ChannelFlavor::Provider),
        };
        Ok(provision(&self.registry, &ctx, names, &self.options)?)
    }

    fn guarded_channel(
        &self,
        snap_id: &SnapId,
        epoch: &Arc<TeardownEpoch>,
        flavor: ChannelFlavor,
    ) -> Option<Arc<dyn OutboundChannel>> {
        self.outbound.as_ref().map(|inner| {
            Arc::new(GuardedChannel::new(
                Arc::clone(inner),
                flavor,
                snap_id.clone(),
                Arc::clone(epoch),
                self.notifier.clone(),
            )) as Arc<dyn OutboundChannel>
        })
    }
}
