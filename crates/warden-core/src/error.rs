//! Error types shared across the control plane.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the control plane.
///
/// Variants map onto the error taxonomy the CLI needs to distinguish
/// without string matching: policy denials (role or mode), state-machine
/// invariant violations, storage faults, and malformed operator input.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller's role does not permit the operation.
    #[error("permission denied: {0}")]
    PolicyDenied(String),

    /// The current operational mode forbids the operation.
    #[error("{0}")]
    ModeDenied(String),

    /// The request would violate a state-machine rule.
    #[error("{0}")]
    InvariantViolation(String),

    /// The relational store failed a primitive.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A filesystem primitive failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input artifact was missing required fields or unparsable.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error is a policy denial (role or mode gated).
    #[must_use]
    pub const fn is_denial(&self) -> bool {
        matches!(self, Self::PolicyDenied(_) | Self::ModeDenied(_))
    }
}
