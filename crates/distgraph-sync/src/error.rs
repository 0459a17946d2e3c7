//! Errors raised by the location manager and the two synchronization
//! modes.

use thiserror::Error;

use distgraph_core::DistributedId;

/// Result alias for `distgraph-sync` operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] distgraph_core::CoreError),

    #[error(transparent)]
    Mpi(#[from] distgraph_mpi::MpiAbstractionError),

    #[error(transparent)]
    Pack(#[from] distgraph_pack::PackError),

    /// A node referenced by a location query is not known by any manager
    /// on this process (neither local, distant, nor managed).
    #[error("no known location for node {0}")]
    UnknownLocation(DistributedId),

    /// A hard-sync request referenced a node this process does not hold
    /// LOCAL, which should not happen given a correctly updated location
    /// manager.
    #[error("node {0} is not LOCAL on this process")]
    NotLocal(DistributedId),
}
