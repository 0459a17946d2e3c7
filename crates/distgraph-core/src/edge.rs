//! Distributed edges. An edge's state is derived from its endpoints, never
//! set directly by a caller.

use crate::id::DistributedId;
use crate::layer::LayerId;
use crate::node::LocationState;

/// An edge in the distributed multigraph. Source and target are
/// non-owning references (ids) into the owning `Graph`'s node map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistEdge {
    id: DistributedId,
    layer: LayerId,
    weight: f64,
    source: DistributedId,
    target: DistributedId,
    state: LocationState,
}

impl DistEdge {
    pub fn new(
        id: DistributedId,
        layer: LayerId,
        weight: f64,
        source: DistributedId,
        target: DistributedId,
        state: LocationState,
    ) -> Self {
        Self {
            id,
            layer,
            weight,
            source,
            target,
            state,
        }
    }

    pub const fn id(&self) -> DistributedId {
        self.id
    }

    pub const fn layer(&self) -> LayerId {
        self.layer
    }

    pub const fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub const fn source(&self) -> DistributedId {
        self.source
    }

    pub const fn target(&self) -> DistributedId {
        self.target
    }

    pub const fn state(&self) -> LocationState {
        self.state
    }

    /// Recomputes `state` from the current state of both endpoints.
    /// Invariant I3: an edge is LOCAL iff both endpoints are LOCAL.
    pub fn recompute_state(&mut self, source_state: LocationState, target_state: LocationState) {
        self.state = match (source_state, target_state) {
            (LocationState::Local, LocationState::Local) => LocationState::Local,
            _ => LocationState::Distant,
        };
    }
}
