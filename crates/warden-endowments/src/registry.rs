//! The endowment registry.
//!
//! A fixed catalog of capability factories, built once at process start
//! and immutable afterwards. Each factory serves one or more wire names
//! (`setTimeout` and `clearInterval` both resolve to the timers factory)
//! and produces the named capabilities plus an optional teardown routine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::clock::SnapClock;
use crate::codec::TextCodec;
use crate::console::SnapConsole;
use crate::crypto::CryptoSuite;
use crate::error::EndowmentResult;
use crate::network::NetClient;
use crate::provision::{OutboundChannel, ProvisionerContext};
use crate::random::SnapRng;
use crate::teardown::Teardown;
use crate::timers::Timers;

/// A live capability bound to one endowment name.
#[derive(Clone)]
pub enum EndowmentValue {
    /// The jittered monotone clock.
    Clock(Arc<SnapClock>),
    /// The seeded random source.
    Random(Arc<SnapRng>),
    /// Cryptographic primitives.
    Crypto(Arc<CryptoSuite>),
    /// The connection-tracked fetch client.
    Network(Arc<NetClient>),
    /// The attributed logging sink.
    Console(Arc<SnapConsole>),
    /// UTF-8 text codecs.
    Codec(Arc<TextCodec>),
    /// Delay-floored timers.
    Timers(Arc<Timers>),
    /// A host-provided request channel (already guard-wrapped upstream).
    Channel(Arc<dyn OutboundChannel>),
    /// An ambient value passed through un-hardened (opt-in relaxation).
    Ambient(Value),
}

impl std::fmt::Debug for EndowmentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Clock(_) => "Clock",
            Self::Random(_) => "Random",
            Self::Crypto(_) => "Crypto",
            Self::Network(_) => "Network",
            Self::Console(_) => "Console",
            Self::Codec(_) => "Codec",
            Self::Timers(_) => "Timers",
            Self::Channel(_) => "Channel",
            Self::Ambient(_) => "Ambient",
        };
        write!(f, "EndowmentValue::{kind}")
    }
}

/// What one factory invocation produced.
pub struct FactoryOutput {
    /// The named capabilities to merge into the snap's set.
    pub values: Vec<(String, EndowmentValue)>,
    /// Cleanup routine for the resources this factory opens, if any.
    pub teardown: Option<Teardown>,
}

/// A capability factory, invoked at most once per snap.
pub type EndowmentFactory =
    Arc<dyn Fn(&ProvisionerContext) -> EndowmentResult<FactoryOutput> + Send + Sync>;

struct RegistryEntry {
    names: Vec<&'static str>,
    factory: EndowmentFactory,
}

/// The process-wide catalog of endowment factories.
///
/// Built once (normally via [`EndowmentRegistry::builtin`]) and then shared
/// immutably with every provisioning call.
pub struct EndowmentRegistry {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<&'static str, usize>,
}

impl EndowmentRegistry {
    /// Create an empty registry. Tests use this to install counting
    /// factories; production code uses [`EndowmentRegistry::builtin`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a factory under every name it serves.
    ///
    /// Later registrations never shadow earlier ones; the first factory
    /// claiming a name keeps it.
    pub fn register(&mut self, names: &[&'static str], factory: EndowmentFactory) {
        let index = self.entries.len();
        self.entries.push(RegistryEntry {
            names: names.to_vec(),
            factory,
        });
        for name in names {
            self.by_name.entry(name).or_insert(index);
        }
    }

    /// Resolve a name to its factory's index, if registered.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// The factory at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not returned by [`EndowmentRegistry::lookup`].
    #[must_use]
    pub fn factory(&self, index: usize) -> EndowmentFactory {
        Arc::clone(&self.entries[index].factory)
    }

    /// The wire names served by the factory at `index`.
    #[must_use]
    pub fn names(&self, index: usize) -> &[&'static str] {
        &self.entries[index].names
    }

    /// The standard catalog: time, randomness, crypto, network, text
    /// codecs, timers and console.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.register(
            &["Date"],
            Arc::new(|_ctx| {
                Ok(FactoryOutput {
                    values: vec![(
                        "Date".to_string(),
                        EndowmentValue::Clock(Arc::new(SnapClock::new())),
                    )],
                    teardown: None,
                })
            }),
        );

        registry.register(
            &["Math.random"],
            Arc::new(|_ctx| {
                Ok(FactoryOutput {
                    values: vec![(
                        "Math.random".to_string(),
                        EndowmentValue::Random(Arc::new(SnapRng::new())),
                    )],
                    teardown: None,
                })
            }),
        );

        registry.register(
            &["crypto", "SubtleCrypto"],
            Arc::new(|_ctx| {
                let suite = Arc::new(CryptoSuite::new());
                Ok(FactoryOutput {
                    values: vec![
                        ("crypto".to_string(), EndowmentValue::Crypto(Arc::clone(&suite))),
                        ("SubtleCrypto".to_string(), EndowmentValue::Crypto(suite)),
                    ],
                    teardown: None,
                })
            }),
        );

        registry.register(
            &["fetch", "Request", "Response", "Headers"],
            Arc::new(|ctx| {
                let client = Arc::new(NetClient::new(Arc::clone(&ctx.epoch))?);
                let values = ["fetch", "Request", "Response", "Headers"]
                    .iter()
                    .map(|name| {
                        (
                            (*name).to_string(),
                            EndowmentValue::Network(Arc::clone(&client)),
                        )
                    })
                    .collect();
                let for_teardown = Arc::clone(&client);
                Ok(FactoryOutput {
                    values,
                    teardown: Some(Teardown::from_fn(move || {
                        let client = Arc::clone(&for_teardown);
                        async move {
                            client.abort_all();
                            Ok(())
                        }
                    })),
                })
            }),
        );

        registry.register(
            &["TextEncoder", "TextDecoder"],
            Arc::new(|_ctx| {
                let codec = Arc::new(TextCodec::new());
                Ok(FactoryOutput {
                    values: vec![
                        (
                            "TextEncoder".to_string(),
                            EndowmentValue::Codec(Arc::clone(&codec)),
                        ),
                        ("TextDecoder".to_string(), EndowmentValue::Codec(codec)),
                    ],
                    teardown: None,
                })
            }),
        );

        registry.register(
            &["setTimeout", "clearTimeout", "setInterval", "clearInterval"],
            Arc::new(|_ctx| {
                let timers = Arc::new(Timers::new());
                let values = ["setTimeout", "clearTimeout", "setInterval", "clearInterval"]
                    .iter()
                    .map(|name| {
                        (
                            (*name).to_string(),
                            EndowmentValue::Timers(Arc::clone(&timers)),
                        )
                    })
                    .collect();
                let for_teardown = Arc::clone(&timers);
                Ok(FactoryOutput {
                    values,
                    teardown: Some(Teardown::from_fn(move || {
                        let timers = Arc::clone(&for_teardown);
                        async move {
                            timers.clear_all();
                            Ok(())
                        }
                    })),
                })
            }),
        );

        registry.register(
            &["console"],
            Arc::new(|ctx| {
                Ok(FactoryOutput {
                    values: vec![(
                        "console".to_string(),
                        EndowmentValue::Console(Arc::new(SnapConsole::new(ctx.snap_id.clone()))),
                    )],
                    teardown: None,
                })
            }),
        );

        registry
    }
}
