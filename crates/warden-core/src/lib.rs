//! Warden Core - Foundation types for the warden snap sandbox.
//!
//! This crate provides:
//! - Validated snap identifiers and handler kinds
//! - The JSON-RPC command wire shapes and error codes
//! - The JSON sanitizer guarding every value that crosses the sandbox boundary
//! - Teardown epochs for invalidating late asynchronous completions

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod epoch;
pub mod error;
pub mod handler;
pub mod id;
pub mod rpc;
pub mod serialize;

pub use epoch::{EpochGuard, Stale, TeardownEpoch};
pub use error::{CoreError, CoreResult};
pub use handler::HandlerKind;
pub use id::{InvocationId, SnapId};
pub use rpc::{
    JsonRpcError, JsonRpcId, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, codes,
};
pub use serialize::{sanitize_json, MAX_JSON_BYTES, MAX_JSON_DEPTH};
