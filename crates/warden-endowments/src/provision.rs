//! The endowment provisioner.
//!
//! Turns a snap's requested capability-name list into a plugin-scoped
//! [`Endowments`] set plus one aggregate teardown. Duplicate names — and
//! distinct names served by the same factory — invoke the backing factory
//! exactly once per snap. Unknown names abort provisioning for the whole
//! snap unless the host has opted into the ambient passthrough relaxation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use warden_core::{JsonRpcError, SnapId, TeardownEpoch};

use crate::error::{EndowmentError, EndowmentResult};
use crate::registry::{EndowmentRegistry, EndowmentValue};
use crate::teardown::Teardown;

/// The endowment name bound directly to the host-provided request channel
/// instead of any factory.
pub const PROVIDER_ENDOWMENT: &str = "ethereum";

/// An outbound request channel supplied by the host.
///
/// The provisioner binds this channel as-is; attenuation (method
/// allow-lists, epoch guarding) is applied by the caller before the
/// channel reaches the provisioner.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Send a request out of the sandbox and await its result.
    async fn request(&self, method: &str, params: Value) -> Result<Value, JsonRpcError>;
}

/// Host-configurable provisioning behavior.
#[derive(Default)]
pub struct ProvisionerOptions {
    /// Allow unknown names to fall through to host-supplied ambient
    /// values, passed through un-hardened with only a warning.
    ///
    /// This weakens the isolation guarantee and is off by default.
    pub allow_ambient: bool,
    /// The ambient values available when `allow_ambient` is set.
    pub ambient: HashMap<String, Value>,
}

/// Per-snap inputs shared with every factory invocation.
pub struct ProvisionerContext {
    /// The snap being provisioned.
    pub snap_id: SnapId,
    /// The snap's teardown epoch, for epoch-guarded capabilities.
    pub epoch: Arc<TeardownEpoch>,
    /// The guard-wrapped host channel backing [`PROVIDER_ENDOWMENT`], if
    /// the host exposes one.
    pub provider: Option<Arc<dyn OutboundChannel>>,
}

/// The capability set handed to one snap's execution context.
#[derive(Debug, Default, Clone)]
pub struct Endowments {
    values: HashMap<String, EndowmentValue>,
}

impl Endowments {
    /// Look up a capability by wire name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EndowmentValue> {
        self.values.get(name)
    }

    /// Whether a name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The bound names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The timer capability, if granted.
    #[must_use]
    pub fn timers(&self) -> Option<Arc<crate::timers::Timers>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Timers(t) => Some(Arc::clone(t)),
            _ => None,
        })
    }

    /// The network capability, if granted.
    #[must_use]
    pub fn network(&self) -> Option<Arc<crate::network::NetClient>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Network(n) => Some(Arc::clone(n)),
            _ => None,
        })
    }

    /// The clock capability, if granted.
    #[must_use]
    pub fn clock(&self) -> Option<Arc<crate::clock::SnapClock>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Clock(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// The random source, if granted.
    #[must_use]
    pub fn random(&self) -> Option<Arc<crate::random::SnapRng>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Random(r) => Some(Arc::clone(r)),
            _ => None,
        })
    }

    /// The crypto suite, if granted.
    #[must_use]
    pub fn crypto(&self) -> Option<Arc<crate::crypto::CryptoSuite>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Crypto(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// The console sink, if granted.
    #[must_use]
    pub fn console(&self) -> Option<Arc<crate::console::SnapConsole>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Console(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// The text codec, if granted.
    #[must_use]
    pub fn codec(&self) -> Option<Arc<crate::codec::TextCodec>> {
        self.values.values().find_map(|v| match v {
            EndowmentValue::Codec(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// The channel bound at `name`, if granted.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<Arc<dyn OutboundChannel>> {
        match self.values.get(name) {
            Some(EndowmentValue::Channel(c)) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    fn insert(&mut self, name: String, value: EndowmentValue) {
        self.values.entry(name).or_insert(value);
    }
}

/// Resolve `names` against the registry into a capability set and one
/// aggregate teardown routine.
///
/// # Errors
///
/// Returns [`EndowmentError::UnknownEndowment`] for any name no factory
/// serves (and, for [`PROVIDER_ENDOWMENT`], when the host supplied no
/// channel), and propagates factory failures. On error the whole
/// provisioning attempt is abandoned; no partial set is returned.
pub fn provision(
    registry: &EndowmentRegistry,
    ctx: &ProvisionerContext,
    names: &[String],
    options: &ProvisionerOptions,
) -> EndowmentResult<(Endowments, Teardown)> {
    let mut endowments = Endowments::default();
    let mut teardowns = Vec::new();
    let mut invoked: HashSet<usize> = HashSet::new();

    for name in names {
        if endowments.contains(name) {
            continue;
        }

        if name == PROVIDER_ENDOWMENT {
            let channel = ctx
                .provider
                .clone()
                .ok_or_else(|| EndowmentError::UnknownEndowment { name: name.clone() })?;
            endowments.insert(name.clone(), EndowmentValue::Channel(channel));
            continue;
        }

        match registry.lookup(name) {
            Some(index) => {
                if !invoked.insert(index) {
                    // Another requested name already ran this factory; its
                    // values (including this name) are merged already.
                    continue;
                }
                let output = (registry.factory(index))(ctx)?;
                for (bound_name, value) in output.values {
                    endowments.insert(bound_name, value);
                }
                if let Some(teardown) = output.teardown {
                    teardowns.push(teardown);
                }
            },
            None => {
                if options.allow_ambient {
                    if let Some(value) = options.ambient.get(name) {
                        warn!(
                            snap_id = %ctx.snap_id,
                            endowment = %name,
                            "Passing ambient endowment through un-hardened"
                        );
                        endowments.insert(name.clone(), EndowmentValue::Ambient(value.clone()));
                        continue;
                    }
                }
                return Err(EndowmentError::UnknownEndowment { name: name.clone() });
            },
        }
    }

    Ok((endowments, Teardown::aggregate(teardowns)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::registry::FactoryOutput;

    fn test_ctx() -> ProvisionerContext {
        ProvisionerContext {
            snap_id: SnapId::new("npm:demo").unwrap(),
            epoch: TeardownEpoch::new(),
            provider: None,
        }
    }

    fn counting_registry(counter: Arc<AtomicUsize>) -> EndowmentRegistry {
        let mut registry = EndowmentRegistry::empty();
        registry.register(
            &["setTimeout", "clearTimeout"],
            Arc::new(move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                let timers = Arc::new(crate::timers::Timers::new());
                Ok(FactoryOutput {
                    values: vec![
                        (
                            "setTimeout".to_string(),
                            EndowmentValue::Timers(Arc::clone(&timers)),
                        ),
                        ("clearTimeout".to_string(), EndowmentValue::Timers(timers)),
                    ],
                    teardown: Some(Teardown::noop()),
                })
            }),
        );
        registry
    }

    #[test]
    fn duplicate_names_invoke_the_factory_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(Arc::clone(&calls));

        let names: Vec<String> = ["setTimeout", "setTimeout", "clearTimeout", "setTimeout"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let (endowments, _) = provision(
            &registry,
            &test_ctx(),
            &names,
            &ProvisionerOptions::default(),
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(endowments.contains("setTimeout"));
        assert!(endowments.contains("clearTimeout"));
    }

    #[test]
    fn unknown_name_aborts_provisioning() {
        let registry = EndowmentRegistry::builtin();
        let names = vec!["Date".to_string(), "Worker".to_string()];
        let err = provision(
            &registry,
            &test_ctx(),
            &names,
            &ProvisionerOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EndowmentError::UnknownEndowment { name } if name == "Worker"
        ));
    }

    #[test]
    fn ambient_fallback_is_off_by_default() {
        let registry = EndowmentRegistry::builtin();
        let names = vec!["WebAssembly".to_string()];
        let mut options = ProvisionerOptions::default();
        options
            .ambient
            .insert("WebAssembly".to_string(), json!({"present": true}));

        // Ambient value available, but the relaxation is not enabled.
        assert!(provision(&registry, &test_ctx(), &names, &options).is_err());

        options.allow_ambient = true;
        let (endowments, _) = provision(&registry, &test_ctx(), &names, &options).unwrap();
        assert!(matches!(
            endowments.get("WebAssembly"),
            Some(EndowmentValue::Ambient(_))
        ));
    }

    #[test]
    fn provider_endowment_binds_the_host_channel() {
        struct NullChannel;
        #[async_trait]
        impl OutboundChannel for NullChannel {
            async fn request(&self, _method: &str, _params: Value) -> Result<Value, JsonRpcError> {
                Ok(Value::Null)
            }
        }

        let registry = EndowmentRegistry::builtin();
        let names = vec![PROVIDER_ENDOWMENT.to_string()];

        // Without a host channel the name is unknown.
        assert!(
            provision(
                &registry,
                &test_ctx(),
                &names,
                &ProvisionerOptions::default()
            )
            .is_err()
        );

        let mut ctx = test_ctx();
        ctx.provider = Some(Arc::new(NullChannel));
        let (endowments, _) =
            provision(&registry, &ctx, &names, &ProvisionerOptions::default()).unwrap();
        assert!(endowments.channel(PROVIDER_ENDOWMENT).is_some());
    }

    #[test]
    fn collects_teardowns_from_resourceful_factories() {
        let registry = EndowmentRegistry::builtin();
        let names: Vec<String> = ["setTimeout", "fetch", "Date"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let (_, teardown) = provision(
            &registry,
            &test_ctx(),
            &names,
            &ProvisionerOptions::default(),
        )
        .unwrap();
        // Timers and network contribute teardowns; the clock does not.
        assert_eq!(teardown.len(), 2);
    }

    #[test]
    fn typed_accessors_reach_the_granted_capabilities() {
        let registry = EndowmentRegistry::builtin();
        let names: Vec<String> = [
            "Date",
            "Math.random",
            "crypto",
            "console",
            "TextEncoder",
            "setTimeout",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        let (endowments, _) = provision(
            &registry,
            &test_ctx(),
            &names,
            &ProvisionerOptions::default(),
        )
        .unwrap();

        assert!(endowments.clock().is_some());
        assert!(endowments.random().is_some());
        assert!(endowments.crypto().is_some());
        assert!(endowments.console().is_some());
        assert!(endowments.codec().is_some());
        assert!(endowments.timers().is_some());
        assert!(endowments.network().is_none());
    }
}
