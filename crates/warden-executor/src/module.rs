//! The module seam: how snap source becomes callable exports.
//!
//! The executor never runs snap code directly. It hands the snap's source
//! and its provisioned capability set to a [`ModuleLoader`], which
//! evaluates the source inside an isolated context and returns the raw
//! export surface. The executor then validates that surface against the
//! known handler kinds.
//!
//! [`StaticModuleLoader`] is the in-tree backend: a registry of native
//! module factories keyed by name, where the source selects the factory.
//! Interpreter or WASM backends plug in behind the same trait.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use warden_core::{HandlerKind, SnapId};
use warden_endowments::{Endowments, OutboundChannel};

use crate::error::{ExecutorError, ExecutorResult};
use crate::notify::ErrorSink;

/// One exported entry point of a snap.
#[async_trait]
pub trait SnapHandler: Send + Sync {
    /// Handle one invocation. Returning `None` is reported to the host as
    /// `null`.
    async fn handle(&self, origin: &str, request: Value) -> ExecutorResult<Option<Value>>;
}

/// Everything a module can reach while evaluating and handling calls.
///
/// The environment is the *only* window out of the sandbox: the granted
/// endowments, the guard-wrapped control channel back to the host, and an
/// error sink for uncaught failures. There is no ambient access to the
/// host's own environment.
#[derive(Clone)]
pub struct ModuleEnv {
    /// The snap being evaluated.
    pub snap_id: SnapId,
    /// The provisioned capability set.
    pub endowments: Endowments,
    /// The guard-wrapped snap-to-host control channel, when the host
    /// exposes one.
    pub snap_channel: Option<Arc<dyn OutboundChannel>>,
    /// Where the module reports uncaught errors.
    pub error_sink: ErrorSink,
}

/// The unvalidated export surface a loader captured from a module.
#[derive(Default)]
pub struct RawExports {
    entries: Vec<(String, Arc<dyn SnapHandler>)>,
}

impl RawExports {
    /// Create an empty export surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an export under its wire name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn SnapHandler>) -> Self {
        self.entries.push((name.into(), handler));
        self
    }
}

/// The validated handler map for one running snap.
#[derive(Default, Clone)]
pub struct SnapExports {
    handlers: HashMap<HandlerKind, Arc<dyn SnapHandler>>,
}

impl SnapExports {
    /// An empty export map (a snap mid-evaluation has one).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate a raw export surface: exports with unknown names are
    /// dropped with a warning, known kinds are kept.
    #[must_use]
    pub fn validate(snap_id: &SnapId, raw: RawExports) -> Self {
        let mut handlers = HashMap::new();
        for (name, handler) in raw.entries {
            match HandlerKind::from_str(&name) {
                Ok(kind) => {
                    handlers.insert(kind, handler);
                },
                Err(_) => {
                    warn!(snap_id = %snap_id, export = %name, "Dropping unrecognized snap export");
                },
            }
        }
        Self { handlers }
    }

    /// The handler for `kind`, if exported.
    #[must_use]
    pub fn get(&self, kind: HandlerKind) -> Option<Arc<dyn SnapHandler>> {
        self.handlers.get(&kind).map(Arc::clone)
    }

    /// The exported kinds, unordered.
    pub fn kinds(&self) -> impl Iterator<Item = HandlerKind> {
        self.handlers.keys().copied()
    }
}

/// Evaluates snap source inside an isolated context.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Evaluate `source` with only `env` visible, capturing the module's
    /// export surface.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Evaluation`] if the source cannot be
    /// evaluated.
    async fn evaluate(&self, source: &str, env: ModuleEnv) -> ExecutorResult<RawExports>;
}

/// A module factory for [`StaticModuleLoader`].
pub type ModuleFactory =
    Arc<dyn Fn(ModuleEnv) -> BoxFuture<'static, ExecutorResult<RawExports>> + Send + Sync>;

/// The native module backend: source text names a registered factory.
///
/// Mirrors a static engine rather than an interpreter — modules are
/// compiled into the host, and "evaluation" instantiates the named module
/// with the snap's capability set. Useful on its own for trusted built-in
/// modules and as the reference backend for the executor's semantics.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: HashMap<String, ModuleFactory>,
}

impl StaticModuleLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory under `name`.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(ModuleEnv) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExecutorResult<RawExports>> + Send + 'static,
    {
        self.modules
            .insert(name.into(), Arc::new(move |env| Box::pin(factory(env))));
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn evaluate(&self, source: &str, env: ModuleEnv) -> ExecutorResult<RawExports> {
        let name = source.trim();
        let factory = self
            .modules
            .get(name)
            .ok_or_else(|| ExecutorError::Evaluation {
                snap_id: env.snap_id.clone(),
                reason: format!("no module registered for source {name:?}"),
            })?;
        factory(env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl SnapHandler for EchoHandler {
        async fn handle(&self, _origin: &str, request: Value) -> ExecutorResult<Option<Value>> {
            Ok(Some(request))
        }
    }

    fn snap(id: &str) -> SnapId {
        SnapId::new(id).unwrap()
    }

    #[test]
    fn validation_keeps_known_kinds_and_drops_unknown_names() {
        let raw = RawExports::new()
            .with("onRpcRequest", Arc::new(EchoHandler))
            .with("onTeleport", Arc::new(EchoHandler))
            .with("onCronjob", Arc::new(EchoHandler));

        let exports = SnapExports::validate(&snap("npm:demo"), raw);
        assert!(exports.get(HandlerKind::OnRpcRequest).is_some());
        assert!(exports.get(HandlerKind::OnCronjob).is_some());
        assert_eq!(exports.kinds().count(), 2);
    }

    #[test]
    fn empty_exports_have_no_handlers() {
        let exports = SnapExports::empty();
        for kind in HandlerKind::ALL {
            assert!(exports.get(kind).is_none());
        }
    }
}
