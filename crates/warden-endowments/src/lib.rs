//! Warden Endowments - attenuated capabilities for sandboxed snaps.
//!
//! An *endowment* is a capability intentionally exposed to untrusted snap
//! code, usually an attenuated version of a host primitive: a jittered
//! clock, a seeded CSPRNG, delay-floored timers, a connection-tracked
//! fetch client, an attributed console, and text codecs.
//!
//! The [`registry::EndowmentRegistry`] is a fixed, process-wide table of
//! factories built once at startup; the [`provision`] module turns a
//! snap's requested name list into a plugin-scoped [`Endowments`] set plus
//! a single aggregate teardown routine.
//!
//! Every endowment object is immutable by construction: shared behind an
//! `Arc`, exposing only `&self` methods, with interior state owned
//! privately. Snaps cannot mutate a capability to signal other snaps
//! through it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod clock;
pub mod codec;
pub mod console;
pub mod crypto;
pub mod error;
pub mod network;
pub mod provision;
pub mod random;
pub mod registry;
pub mod teardown;
pub mod timers;

pub use clock::SnapClock;
pub use codec::TextCodec;
pub use console::{ConsoleLevel, SnapConsole};
pub use crypto::CryptoSuite;
pub use error::{EndowmentError, EndowmentResult};
pub use network::{FetchRequest, FetchResponse, NetClient};
pub use provision::{
    Endowments, OutboundChannel, PROVIDER_ENDOWMENT, ProvisionerContext, ProvisionerOptions,
    provision,
};
pub use random::SnapRng;
pub use registry::{EndowmentFactory, EndowmentRegistry, EndowmentValue, FactoryOutput};
pub use teardown::Teardown;
pub use timers::{TimerHandle, Timers};
