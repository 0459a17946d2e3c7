//! Error types shared by the local graph and distributed node/edge layers.

use thiserror::Error;

use crate::id::DistributedId;

/// Result alias for `distgraph-core` operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by local graph storage and distributed node/edge state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was looked up but is not present in the local graph.
    #[error("node {0} is not present in the graph")]
    NodeNotFound(DistributedId),

    /// An edge id was looked up but is not present in the local graph.
    #[error("edge {0} is not present in the graph")]
    EdgeNotFound(DistributedId),

    /// A node that already exists was inserted again with a different id
    /// collision (should not happen; ids are never reused).
    #[error("node {0} already exists in the graph")]
    DuplicateNode(DistributedId),
}
