//! Typed MPI abstraction used by every cross-process operation in
//! `distgraph-sync` and `distgraph`.
//!
//! Built on `mpi` (rsmpi). Exposes typed point-to-point send/recv, probes,
//! a synchronous send (`issend`) for termination-detection correctness, a
//! broadcast, a gather, a symmetric `all_to_all`, and the tag/epoch
//! namespace that keeps consecutive termination rounds from interfering
//! with each other.

pub mod alltoall;
pub mod channel;
pub mod context;
pub mod error;
pub mod tag;

pub use alltoall::all_to_all;
pub use channel::{broadcast, gather, iprobe, iprobe_any, issend, probe_any, recv, send};
pub use context::MpiContext;
pub use error::{MpiAbstractionError, MpiResult};
pub use tag::{Epoch, MessageTag};
