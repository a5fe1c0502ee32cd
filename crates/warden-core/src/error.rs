//! Shared error types for the warden core.

use thiserror::Error;

/// Errors produced by the foundation types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A snap id failed validation.
    #[error("invalid snap id {id:?}: {reason}")]
    InvalidSnapId {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An export or invocation named a handler kind the sandbox does not know.
    #[error("unknown handler kind: {kind}")]
    UnknownHandlerKind {
        /// The unrecognized kind name.
        kind: String,
    },

    /// A value could not be represented in the JSON-only wire subset.
    #[error("non-serializable value: {reason}")]
    NonSerializable {
        /// Why the value was rejected.
        reason: String,
    },
}

/// A specialized `Result` for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
