//! Errors raised while packing or unpacking wire payloads.

use thiserror::Error;

/// Result alias for `distgraph-pack` operations.
pub type PackResult<T> = Result<T, PackError>;

/// Errors raised by the serialization substrate.
#[derive(Debug, Error)]
pub enum PackError {
    /// The buffer ended before the expected value could be fully read.
    #[error("truncated buffer: expected {expected} more bytes, {available} available")]
    Truncated { expected: usize, available: usize },

    /// A declared size did not match what was actually written, or a
    /// cursor operation moved outside the buffer's bounds.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Bytes did not decode to a valid value of the requested type
    /// (invalid UTF-8, unknown enum discriminant, etc).
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// `TemporaryNode::build` was called a second time.
    #[error("temporary node {0} was already materialized")]
    DoubleMaterialization(String),

    /// The JSON mirror path failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
