//! Executor error taxonomy.
//!
//! Variants map one-to-one onto the wire error classes: protocol errors
//! are built directly in the command layer, everything else flows through
//! [`ExecutorError`] and is converted to a structured response there.

use thiserror::Error;

use warden_core::{CoreError, HandlerKind, JsonRpcError, SnapId};
use warden_endowments::EndowmentError;

/// Errors raised by snap execution and lifecycle management.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A command referenced a snap that is not loaded.
    #[error("unknown snap: {snap_id}")]
    UnknownSnap {
        /// The missing snap.
        snap_id: SnapId,
    },

    /// `executeSnap` was called for a snap that is already running.
    #[error("snap already started: {snap_id}")]
    AlreadyStarted {
        /// The duplicate snap.
        snap_id: SnapId,
    },

    /// The snap's source failed to evaluate or its exports failed
    /// validation; the snap was never registered.
    #[error("evaluation of snap {snap_id} failed: {reason}")]
    Evaluation {
        /// The snap that failed to start.
        snap_id: SnapId,
        /// The underlying failure.
        reason: String,
    },

    /// A mandatory handler kind was invoked but not exported.
    #[error("snap {snap_id} does not export {kind}")]
    MissingHandler {
        /// The invoked snap.
        snap_id: SnapId,
        /// The absent handler kind.
        kind: HandlerKind,
    },

    /// The invocation was force-ended by `terminate`.
    #[error("snap {snap_id} was terminated during execution")]
    Terminated {
        /// The terminated snap.
        snap_id: SnapId,
    },

    /// The snap's handler failed during a call; the snap stays alive.
    #[error("handler failed: {reason}")]
    HandlerFailed {
        /// The failure description.
        reason: String,
    },

    /// An outbound request was rejected or failed on the host side.
    #[error("outbound request failed: {0:?}")]
    Outbound(JsonRpcError),

    /// Endowment provisioning or use failed.
    #[error(transparent)]
    Endowment(#[from] EndowmentError),

    /// A core-type failure (invalid id, non-serializable value, ...).
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// A specialized `Result` for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
