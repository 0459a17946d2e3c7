//! Distributed node state: LOCAL/DISTANT bookkeeping layered over plain data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::DistributedId;
use crate::layer::LayerId;

/// Location state of a node or edge on the current process.
///
/// A node is LOCAL on exactly one process (the one currently hosting its
/// authoritative copy) and DISTANT everywhere else it is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationState {
    /// The authoritative copy lives on this process.
    Local,
    /// This process holds a ghost proxy; the authoritative copy is
    /// elsewhere.
    Distant,
}

/// Marker trait implemented by the synchronization mode's per-node lock.
///
/// The lock tracks *state only* (unlocked / shared / exclusive) and
/// references its node by id rather than by pointer, per the design note
/// about avoiding a node <-> mutex ownership cycle. Concrete
/// implementations (the no-op ghost-mode lock, the readers/writers
/// `HardSyncMutex`) live in `distgraph-sync`.
pub trait NodeMutex: fmt::Debug + Send {
    /// The node this lock guards.
    fn node_id(&self) -> DistributedId;
}

/// A node in the distributed graph.
///
/// Per-layer adjacency is stored as an ordered list of edge ids so that
/// insertion order remains observable, matching the local graph's callback
/// ordering guarantees.
#[derive(Debug)]
pub struct DistNode<T> {
    id: DistributedId,
    data: T,
    weight: f64,
    state: LocationState,
    /// Rank currently holding the LOCAL copy. Meaningful once
    /// `LocationManager::update_locations` has run at least once.
    location: i32,
    out_edges: BTreeMap<LayerId, Vec<DistributedId>>,
    in_edges: BTreeMap<LayerId, Vec<DistributedId>>,
    mutex: Option<Box<dyn NodeMutex>>,
}

impl<T> DistNode<T> {
    /// Builds a fresh LOCAL node. `location` is set to `self_rank` since a
    /// freshly built node is always local to its builder.
    pub fn new_local(id: DistributedId, data: T, weight: f64, self_rank: i32) -> Self {
        Self {
            id,
            data,
            weight,
            state: LocationState::Local,
            location: self_rank,
            out_edges: BTreeMap::new(),
            in_edges: BTreeMap::new(),
            mutex: None,
        }
    }

    /// Builds a DISTANT placeholder, e.g. when materializing an edge
    /// endpoint via `TemporaryNode::build`.
    pub fn new_distant(id: DistributedId, data: T, weight: f64, location: i32) -> Self {
        Self {
            id,
            data,
            weight,
            state: LocationState::Distant,
            location,
            out_edges: BTreeMap::new(),
            in_edges: BTreeMap::new(),
            mutex: None,
        }
    }

    pub const fn id(&self) -> DistributedId {
        self.id
    }

    pub const fn state(&self) -> LocationState {
        self.state
    }

    pub const fn location(&self) -> i32 {
        self.location
    }

    pub fn set_location(&mut self, rank: i32) {
        self.location = rank;
    }

    pub const fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn set_data(&mut self, data: T) {
        self.data = data;
    }

    /// Transitions this node to LOCAL. Only the sync mode / location
    /// manager should call this (on import or migration).
    pub fn set_local(&mut self, self_rank: i32) {
        self.state = LocationState::Local;
        self.location = self_rank;
    }

    /// Transitions this node to DISTANT. The caller is responsible for
    /// updating the location manager's bookkeeping.
    pub fn set_distant(&mut self) {
        self.state = LocationState::Distant;
    }

    pub fn mutex(&self) -> Option<&dyn NodeMutex> {
        self.mutex.as_deref()
    }

    /// Installs the lock built by the active sync mode. Called once, when
    /// the node joins the graph as LOCAL.
    pub fn install_mutex(&mut self, mutex: Box<dyn NodeMutex>) {
        self.mutex = Some(mutex);
    }

    pub fn clear_mutex(&mut self) {
        self.mutex = None;
    }

    pub fn out_edges(&self, layer: LayerId) -> &[DistributedId] {
        self.out_edges
            .get(&layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn in_edges(&self, layer: LayerId) -> &[DistributedId] {
        self.in_edges
            .get(&layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_out_edges(&self) -> impl Iterator<Item = &DistributedId> {
        self.out_edges.values().flatten()
    }

    pub fn all_in_edges(&self) -> impl Iterator<Item = &DistributedId> {
        self.in_edges.values().flatten()
    }

    /// True if this node currently has no incident edge on this process.
    /// Used to decide orphan-ghost reclamation (invariant I5).
    pub fn is_isolated(&self) -> bool {
        self.out_edges.values().all(|v| v.is_empty())
            && self.in_edges.values().all(|v| v.is_empty())
    }

    pub(crate) fn push_out_edge(&mut self, layer: LayerId, edge: DistributedId) {
        self.out_edges.entry(layer).or_default().push(edge);
    }

    pub(crate) fn push_in_edge(&mut self, layer: LayerId, edge: DistributedId) {
        self.in_edges.entry(layer).or_default().push(edge);
    }

    pub(crate) fn remove_out_edge(&mut self, layer: LayerId, edge: DistributedId) {
        if let Some(v) = self.out_edges.get_mut(&layer) {
            v.retain(|e| *e != edge);
        }
    }

    pub(crate) fn remove_in_edge(&mut self, layer: LayerId, edge: DistributedId) {
        if let Some(v) = self.in_edges.get_mut(&layer) {
            v.retain(|e| *e != edge);
        }
    }
}
