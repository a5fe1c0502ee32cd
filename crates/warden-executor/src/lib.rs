//! Warden Executor - the sandbox execution core.
//!
//! This crate provides:
//! - [`SnapExecutor`]: per-snap lifecycle state, isolated context creation
//!   and capability injection
//! - The invocation scheduler racing every call against a cooperative stop
//!   signal, with exactly-once idle teardown
//! - [`CommandHandler`]: the host-facing `ping` / `executeSnap` / `snapRpc`
//!   / `terminate` protocol surface
//! - [`GuardedChannel`]: validation of every request a snap sends back out
//!   through its injected channels

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod command;
pub mod error;
pub mod executor;
pub mod guard;
pub mod invocation;
pub mod module;
pub mod notify;

pub use command::CommandHandler;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::SnapExecutor;
pub use guard::{ChannelFlavor, GuardedChannel};
pub use module::{ModuleEnv, ModuleLoader, RawExports, SnapExports, SnapHandler, StaticModuleLoader};
pub use notify::{ErrorSink, Notifier};
