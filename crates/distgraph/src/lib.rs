//! `distgraph`: a distributed labelled multigraph over MPI, with a
//! ghost-layer (optimistic) and a hard (readers/writers) synchronization
//! mode, and deterministic builders for generating test graphs.
//!
//! Lower crates own one concern each (`distgraph-core`: local graph and
//! ids; `distgraph-pack`: the serialization contract; `distgraph-mpi`:
//! the MPI abstraction; `distgraph-sync`: the location manager and both
//! sync modes). This crate is the orchestrator that ties them into one
//! `DistributedGraph<T>`.

pub mod analysis;
pub mod builders;
pub mod distributed_graph;
pub mod error;
pub mod rng;

pub use analysis::local_clustering_coefficient;
pub use distributed_graph::{DistributedGraph, EdgeHandle, NodeHandle};
pub use error::{DistGraphError, DistGraphResult};
pub use rng::SimRng;

pub use distgraph_core::{
    CoreError, DistEdge, DistNode, DistributedId, Graph, LayerId, LocationState, RuntimeConfig,
    SyncMode,
};
pub use distgraph_mpi::{Epoch, MessageTag, MpiContext};
