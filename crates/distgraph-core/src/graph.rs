//! Local graph storage: node/edge maps and the four callback families.
//!
//! This is the process-local half of the distributed graph (C4 in the
//! design ledger). It knows nothing about MPI, migration or
//! synchronization modes; those are layered on top in `distgraph-sync`
//! and `distgraph`.

use std::collections::BTreeMap;

use tracing::trace;

use crate::edge::DistEdge;
use crate::error::{CoreError, CoreResult};
use crate::id::DistributedId;
use crate::layer::LayerId;
use crate::node::{DistNode, LocationState};

type NodeCallback<T> = Box<dyn FnMut(&DistNode<T>) + Send>;
type EdgeCallback = Box<dyn FnMut(&DistEdge) + Send>;

/// The four callback families fired by the local graph, kept separate so
/// that each can be registered and fired independently, in registration
/// order.
#[derive(Default)]
struct Callbacks<T> {
    on_insert_node: Vec<NodeCallback<T>>,
    on_erase_node: Vec<NodeCallback<T>>,
    on_insert_edge: Vec<EdgeCallback>,
    on_erase_edge: Vec<EdgeCallback>,
}

/// Process-local store of nodes and edges, keyed by id.
///
/// Erasure preserves the invariant that an edge is never left dangling: a
/// node cannot be erased while it has incident edges (callers must
/// `unlink` first), and erasing an edge always detaches it from both
/// endpoints' adjacency lists before the edge record itself is dropped.
pub struct Graph<T> {
    nodes: BTreeMap<DistributedId, DistNode<T>>,
    edges: BTreeMap<DistributedId, DistEdge>,
    callbacks: Callbacks<T>,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Graph<T> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            callbacks: Callbacks::default(),
        }
    }

    pub fn node(&self, id: DistributedId) -> Option<&DistNode<T>> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: DistributedId) -> Option<&mut DistNode<T>> {
        self.nodes.get_mut(&id)
    }

    pub fn contains_node(&self, id: DistributedId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edge(&self, id: DistributedId) -> Option<&DistEdge> {
        self.edges.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DistNode<T>> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &DistEdge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn on_insert_node<F: FnMut(&DistNode<T>) + Send + 'static>(&mut self, cb: F) {
        self.callbacks.on_insert_node.push(Box::new(cb));
    }

    pub fn on_erase_node<F: FnMut(&DistNode<T>) + Send + 'static>(&mut self, cb: F) {
        self.callbacks.on_erase_node.push(Box::new(cb));
    }

    pub fn on_insert_edge<F: FnMut(&DistEdge) + Send + 'static>(&mut self, cb: F) {
        self.callbacks.on_insert_edge.push(Box::new(cb));
    }

    pub fn on_erase_edge<F: FnMut(&DistEdge) + Send + 'static>(&mut self, cb: F) {
        self.callbacks.on_erase_edge.push(Box::new(cb));
    }

    /// Inserts a node, firing `on_insert_node` callbacks in registration
    /// order. Fails if the id already exists (ids are never reused, so
    /// this indicates a programming error upstream).
    pub fn insert_node(&mut self, node: DistNode<T>) -> CoreResult<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(CoreError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        let inserted = self.nodes.get(&id).expect("just inserted");
        for cb in &mut self.callbacks.on_insert_node {
            cb(inserted);
        }
        trace!(%id, "inserted node");
        Ok(())
    }

    /// Erases a node. The caller must have already unlinked all incident
    /// edges; this is enforced by `distgraph`'s orchestrator, not here, to
    /// keep this layer free of cross-cutting migration concerns.
    pub fn erase_node(&mut self, id: DistributedId) -> CoreResult<DistNode<T>> {
        let node = self.nodes.remove(&id).ok_or(CoreError::NodeNotFound(id))?;
        for cb in &mut self.callbacks.on_erase_node {
            cb(&node);
        }
        trace!(%id, "erased node");
        Ok(node)
    }

    /// Inserts an edge and wires it into both endpoints' adjacency lists,
    /// preserving insertion order. Fires `on_insert_edge` after linking.
    pub fn insert_edge(&mut self, edge: DistEdge) -> CoreResult<()> {
        let id = edge.id();
        let layer = edge.layer();
        let (src, tgt) = (edge.source(), edge.target());

        if !self.nodes.contains_key(&src) {
            return Err(CoreError::NodeNotFound(src));
        }
        if !self.nodes.contains_key(&tgt) {
            return Err(CoreError::NodeNotFound(tgt));
        }

        self.edges.insert(id, edge);
        if let Some(n) = self.nodes.get_mut(&src) {
            n.push_out_edge(layer, id);
        }
        if let Some(n) = self.nodes.get_mut(&tgt) {
            n.push_in_edge(layer, id);
        }

        let inserted = self.edges.get(&id).expect("just inserted");
        for cb in &mut self.callbacks.on_insert_edge {
            cb(inserted);
        }
        trace!(%id, layer, "inserted edge");
        Ok(())
    }

    /// Erases an edge, detaching it from both endpoints before firing
    /// `on_erase_edge`.
    pub fn erase_edge(&mut self, id: DistributedId) -> CoreResult<DistEdge> {
        let edge = self.edges.remove(&id).ok_or(CoreError::EdgeNotFound(id))?;
        let layer = edge.layer();
        if let Some(n) = self.nodes.get_mut(&edge.source()) {
            n.remove_out_edge(layer, id);
        }
        if let Some(n) = self.nodes.get_mut(&edge.target()) {
            n.remove_in_edge(layer, id);
        }
        for cb in &mut self.callbacks.on_erase_edge {
            cb(&edge);
        }
        trace!(%id, layer, "erased edge");
        Ok(edge)
    }

    /// Recomputes an edge's LOCAL/DISTANT state from its endpoints'
    /// current state (invariant I3). Called after a node transitions
    /// between LOCAL and DISTANT.
    pub fn recompute_edge_state(&mut self, id: DistributedId) -> CoreResult<()> {
        let edge = self.edges.get(&id).ok_or(CoreError::EdgeNotFound(id))?;
        let (src, tgt) = (edge.source(), edge.target());
        let src_state = self
            .nodes
            .get(&src)
            .map(DistNode::state)
            .unwrap_or(LocationState::Distant);
        let tgt_state = self
            .nodes
            .get(&tgt)
            .map(DistNode::state)
            .unwrap_or(LocationState::Distant);
        if let Some(edge) = self.edges.get_mut(&id) {
            edge.recompute_state(src_state, tgt_state);
        }
        Ok(())
    }

    /// All edges incident (either direction, any layer) to `id`.
    pub fn incident_edges(&self, id: DistributedId) -> Vec<DistributedId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<DistributedId> = node.all_out_edges().copied().collect();
        out.extend(node.all_in_edges().copied());
        out
    }

    pub fn layers_of(&self, id: DistributedId) -> Vec<LayerId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut layers: Vec<LayerId> = Vec::new();
        for e in node.all_out_edges().chain(node.all_in_edges()) {
            if let Some(edge) = self.edges.get(e) {
                if !layers.contains(&edge.layer()) {
                    layers.push(edge.layer());
                }
            }
        }
        layers
    }
}

/// Read-only access to a single node's current data, by id.
///
/// This is the seam a synchronization mode's server side (e.g.
/// `distgraph_sync::hard::HardSyncMode`) reads through when answering a
/// remote `READ`/`ACQUIRE`, so it depends only on "give me this node's
/// data" rather than the full `Graph<T>` surface (insertion, erasure,
/// adjacency, callbacks).
pub trait ResourceContainer<T> {
    fn local_data(&self, id: DistributedId) -> Option<&T>;
}

impl<T> ResourceContainer<T> for Graph<T> {
    fn local_data(&self, id: DistributedId) -> Option<&T> {
        self.node(id).map(DistNode::data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn node(rank: i32, counter: u64, self_rank: i32) -> DistNode<i32> {
        DistNode::new_local(DistributedId::new(rank, counter), 0, 1.0, self_rank)
    }

    #[test]
    fn insert_and_erase_node_fires_callbacks_in_order() {
        let mut g: Graph<i32> = Graph::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log1 = log.clone();
        let log2 = log.clone();
        g.on_insert_node(move |n| log1.lock().unwrap().push(("insert", n.id())));
        g.on_erase_node(move |n| log2.lock().unwrap().push(("erase", n.id())));

        let id = DistributedId::new(0, 0);
        g.insert_node(node(0, 0, 0)).unwrap();
        g.erase_node(id).unwrap();

        let events = log.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "insert");
        assert_eq!(events[1].0, "erase");
    }

    #[test]
    fn inserting_edge_requires_both_endpoints_present() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        let edge = DistEdge::new(
            DistributedId::new(0, 100),
            0,
            1.0,
            a,
            b,
            LocationState::Local,
        );
        assert!(g.insert_edge(edge).is_err());
    }

    #[test]
    fn edge_insertion_updates_adjacency_in_order() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        g.insert_node(node(0, 0, 0)).unwrap();
        g.insert_node(node(0, 1, 0)).unwrap();
        let e1 = DistributedId::new(0, 10);
        let e2 = DistributedId::new(0, 11);
        g.insert_edge(DistEdge::new(e1, 0, 1.0, a, b, LocationState::Local))
            .unwrap();
        g.insert_edge(DistEdge::new(e2, 0, 1.0, a, b, LocationState::Local))
            .unwrap();

        assert_eq!(g.node(a).unwrap().out_edges(0), &[e1, e2]);
        assert_eq!(g.node(b).unwrap().in_edges(0), &[e1, e2]);
    }

    #[test]
    fn erasing_edge_detaches_from_both_endpoints() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        g.insert_node(node(0, 0, 0)).unwrap();
        g.insert_node(node(0, 1, 0)).unwrap();
        let e1 = DistributedId::new(0, 10);
        g.insert_edge(DistEdge::new(e1, 0, 1.0, a, b, LocationState::Local))
            .unwrap();
        g.erase_edge(e1).unwrap();
        assert!(g.node(a).unwrap().out_edges(0).is_empty());
        assert!(g.node(b).unwrap().in_edges(0).is_empty());
    }

    #[test]
    fn edge_state_follows_endpoint_states() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        g.insert_node(node(0, 0, 0)).unwrap();
        g.insert_node(DistNode::new_distant(b, 0, 1.0, 1)).unwrap();
        let e1 = DistributedId::new(0, 10);
        g.insert_edge(DistEdge::new(e1, 0, 1.0, a, b, LocationState::Distant))
            .unwrap();
        assert_eq!(g.edge(e1).unwrap().state(), LocationState::Distant);

        g.node_mut(b).unwrap().set_local(0);
        g.recompute_edge_state(e1).unwrap();
        assert_eq!(g.edge(e1).unwrap().state(), LocationState::Local);
    }
}
