//! Errors raised by the MPI abstraction layer.

use thiserror::Error;

/// Result alias for `distgraph-mpi` operations.
pub type MpiResult<T> = Result<T, MpiAbstractionError>;

/// Errors raised by the typed MPI wrapper. An `MpiAbstractionError` is
/// treated as fatal to the process group wherever it surfaces; the
/// framework does not retry MPI operations.
#[derive(Debug, Error)]
pub enum MpiAbstractionError {
    /// The underlying `mpi` crate reported a failure.
    #[error("mpi error: {0}")]
    Mpi(String),

    /// The local process tried to address a rank outside `0..size`.
    #[error("rank {0} is out of range for a world of size {1}")]
    RankOutOfRange(i32, i32),

    /// Encoding or decoding a message body failed.
    #[error(transparent)]
    Pack(#[from] distgraph_pack::PackError),

    /// A reply arrived on an unexpected tag, indicating the two sides of
    /// a protocol disagree about the message sequence.
    #[error("unexpected message tag {0}")]
    UnexpectedTag(i32),
}
