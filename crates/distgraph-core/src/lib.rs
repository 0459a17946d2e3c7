//! Identity, local graph storage and distributed node/edge state.
//!
//! This crate is the foundation of the distributed graph: allocation of
//! globally unique ids, the process-local `Graph<T>` with its callback
//! families, and the LOCAL/DISTANT node and edge wrappers that the
//! synchronization layer (`distgraph-sync`) and the orchestrator
//! (`distgraph`) build on top of. It has no MPI dependency and no
//! knowledge of migration or synchronization policy.

pub mod config;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod layer;
pub mod node;

pub use config::{RuntimeConfig, SyncMode};
pub use edge::DistEdge;
pub use error::{CoreError, CoreResult};
pub use graph::{Graph, ResourceContainer};
pub use id::{DistributedId, IdAllocator};
pub use layer::LayerId;
pub use node::{DistNode, LocationState, NodeMutex};
