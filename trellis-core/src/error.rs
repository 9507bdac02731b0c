//! Error types.
//!
//! The tracking engine itself never fails: reads, writes, triggers and
//! effect runs are infallible. Errors only arise at the typed boundaries,
//! where a caller hands in a value of the wrong shape or names a key a
//! model does not back.

use thiserror::Error;

use crate::graph::TargetId;

/// Errors produced at the boundaries of the reactive system.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A model write or key subscription named a key absent from the
    /// model's initial state.
    #[error("model has no key `{0}`")]
    UnknownKey(String),

    /// A record was required but a value of another kind was given.
    #[error("expected a record, found {0}")]
    NotARecord(&'static str),

    /// A structured value was required but a primitive was given.
    #[error("expected a record or sequence, found {0}")]
    NotStructured(&'static str),

    /// A sequence operation was invoked on a record target.
    #[error("target {0} is not a sequence")]
    NotASequence(TargetId),

    /// A sequence length write was out of range or could not be allocated.
    #[error("invalid sequence length {0}")]
    InvalidLength(usize),

    /// Conversion through serde failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
