//! Top-level error type composing every lower-layer failure the
//! orchestrator can surface.

use thiserror::Error;

use distgraph_core::DistributedId;

pub type DistGraphResult<T> = Result<T, DistGraphError>;

#[derive(Debug, Error)]
pub enum DistGraphError {
    #[error(transparent)]
    Core(#[from] distgraph_core::CoreError),

    #[error(transparent)]
    Mpi(#[from] distgraph_mpi::MpiAbstractionError),

    #[error(transparent)]
    Pack(#[from] distgraph_pack::PackError),

    #[error(transparent)]
    Sync(#[from] distgraph_sync::SyncError),

    /// `distribute()` was asked to move an id this process neither owns
    /// LOCAL nor can resolve, which indicates the partition map was built
    /// from a stale view of the graph.
    #[error("distribute: node {0} not found on this process")]
    UnknownInPartition(DistributedId),
}
