//! Graph builders (C10): construct a fresh graph's nodes and edges
//! according to a generative model, driven by a deterministic RNG.

pub mod small_world;
pub mod uniform;

use distgraph_core::DistributedId;

use crate::rng::SimRng;

/// Produces one node's payload at a time, in the order the builder
/// consumes them. Implementations typically close over a counter or an
/// external data source.
pub trait NodeBuilder<T> {
    fn build(&mut self, index: usize, rng: &mut SimRng) -> T;
}

/// A `NodeBuilder` that calls a closure, for tests and simple callers that
/// don't need a dedicated type.
pub struct FnNodeBuilder<F>(pub F);

impl<T, F: FnMut(usize, &mut SimRng) -> T> NodeBuilder<T> for FnNodeBuilder<F> {
    fn build(&mut self, index: usize, rng: &mut SimRng) -> T {
        (self.0)(index, rng)
    }
}

pub type BuiltNodes = Vec<DistributedId>;
