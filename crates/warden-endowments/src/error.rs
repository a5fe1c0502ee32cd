//! Endowment error types.

use thiserror::Error;

/// Errors raised while provisioning or using endowments.
#[derive(Debug, Error)]
pub enum EndowmentError {
    /// A requested endowment name matched no registered factory.
    #[error("unknown endowment: {name}")]
    UnknownEndowment {
        /// The unresolvable name.
        name: String,
    },

    /// A network request failed or was rejected before leaving the sandbox.
    #[error("fetch failed: {reason}")]
    Fetch {
        /// The failure description.
        reason: String,
    },

    /// The operation was cancelled by teardown.
    #[error("operation aborted by teardown")]
    TornDown,

    /// Byte decoding failed.
    #[error("text decoding failed: {reason}")]
    Decode {
        /// The failure description.
        reason: String,
    },
}

/// A specialized `Result` for endowment operations.
pub type EndowmentResult<T> = Result<T, EndowmentError>;
