//! Process-group lifecycle: `MpiContext` owns the `mpi` crate's universe
//! and communicator for the lifetime of the process.
//!
//! Construct one `MpiContext` before building any `DistributedGraph`; drop
//! it only after the last graph using it has been dropped. A second
//! `MpiContext::init()` within the same process is a programmer error (the
//! underlying MPI runtime does not support re-initialization) and panics,
//! matching the `mpi` crate's own behavior.

use mpi::topology::{Communicator, SimpleCommunicator};
use mpi::traits::*;
use tracing::info;

/// Owns the MPI universe and world communicator for this process.
pub struct MpiContext {
    universe: mpi::environment::Universe,
    world: SimpleCommunicator,
}

impl MpiContext {
    /// Initializes the MPI runtime for this process. Must be called
    /// exactly once, before any other `distgraph` component is built.
    pub fn init() -> Self {
        let universe = mpi::initialize().expect("MPI_Init failed");
        let world = universe.world();
        info!(rank = world.rank(), size = world.size(), "MPI initialized");
        Self { universe, world }
    }

    /// This process's rank within the world communicator.
    pub fn rank(&self) -> i32 {
        self.world.rank()
    }

    /// The total number of processes in the world communicator.
    pub fn size(&self) -> i32 {
        self.world.size()
    }

    pub fn world(&self) -> &SimpleCommunicator {
        &self.world
    }

    /// Blocks until every process has reached this call. Used by tests and
    /// by startup code to ensure all ranks have finished local setup
    /// before the first distributed operation.
    pub fn barrier(&self) {
        self.world.barrier();
    }

    /// Access to the raw universe, for the rare case a caller needs it
    /// directly (e.g. to spawn additional communicators).
    pub fn universe(&self) -> &mpi::environment::Universe {
        &self.universe
    }
}
