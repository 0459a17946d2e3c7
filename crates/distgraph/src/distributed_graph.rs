//! The distributed graph orchestrator (C7): wraps the process-local
//! `Graph<T>`, the location manager, and one of the two synchronization
//! backends behind a single public surface.

use std::collections::{BTreeMap, BTreeSet};

use distgraph_core::{
    DistEdge, DistNode, DistributedId, Graph, IdAllocator, LayerId, LocationState, RuntimeConfig,
    SyncMode,
};
use distgraph_mpi::{Epoch, MessageTag, MpiContext};
use distgraph_pack::pack::{ObjectPack, PackSerialize};
use distgraph_pack::{LightPackSerialize, TemporaryNode};
use distgraph_sync::ghost::{apply_links, DataRefreshResponse, GhostDataSync, GhostLinker, LinkRecord};
use distgraph_sync::hard::HardSyncMode;
use distgraph_sync::location::LocationManager;
use tracing::{debug, trace};

use crate::error::{DistGraphError, DistGraphResult};

pub type NodeHandle = DistributedId;
pub type EdgeHandle = DistributedId;

type StateCallback = Box<dyn FnMut(DistributedId) + Send>;

/// The active synchronization backend, selected once at construction time
/// from `RuntimeConfig::sync_mode`.
enum SyncBackend {
    Ghost {
        linker: GhostLinker,
        data_sync: GhostDataSync,
    },
    Hard(HardSyncMode),
}

/// Owns one process's share of the distributed graph.
pub struct DistributedGraph<T> {
    self_rank: i32,
    graph: Graph<T>,
    location: LocationManager,
    node_ids: IdAllocator,
    edge_ids: IdAllocator,
    backend: SyncBackend,
    epoch: Epoch,
    on_set_local: Vec<StateCallback>,
    on_set_distant: Vec<StateCallback>,
}

impl<T: PackSerialize + LightPackSerialize + Clone> DistributedGraph<T> {
    pub fn new(self_rank: i32, config: &RuntimeConfig) -> Self {
        let backend = match config.sync_mode {
            SyncMode::Ghost => SyncBackend::Ghost {
                linker: GhostLinker::new(),
                data_sync: GhostDataSync::new(),
            },
            SyncMode::Hard => SyncBackend::Hard(HardSyncMode::new()),
        };
        Self {
            self_rank,
            graph: Graph::new(),
            location: LocationManager::new(self_rank),
            node_ids: IdAllocator::new(self_rank),
            edge_ids: IdAllocator::new(self_rank),
            backend,
            epoch: Epoch::default(),
            on_set_local: Vec::new(),
            on_set_distant: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph<T> {
        &self.graph
    }

    pub fn location(&self) -> &LocationManager {
        &self.location
    }

    pub fn self_rank(&self) -> i32 {
        self.self_rank
    }

    pub fn on_set_local<F: FnMut(DistributedId) + Send + 'static>(&mut self, cb: F) {
        self.on_set_local.push(Box::new(cb));
    }

    pub fn on_set_distant<F: FnMut(DistributedId) + Send + 'static>(&mut self, cb: F) {
        self.on_set_distant.push(Box::new(cb));
    }

    pub fn on_insert_node<F: FnMut(&DistNode<T>) + Send + 'static>(&mut self, cb: F) {
        self.graph.on_insert_node(cb);
    }

    pub fn on_erase_node<F: FnMut(&DistNode<T>) + Send + 'static>(&mut self, cb: F) {
        self.graph.on_erase_node(cb);
    }

    pub fn on_insert_edge<F: FnMut(&DistEdge) + Send + 'static>(&mut self, cb: F) {
        self.graph.on_insert_edge(cb);
    }

    pub fn on_erase_edge<F: FnMut(&DistEdge) + Send + 'static>(&mut self, cb: F) {
        self.graph.on_erase_edge(cb);
    }

    fn recompute_incident_edges(&mut self, id: DistributedId) {
        for edge_id in self.graph.incident_edges(id) {
            let _ = self.graph.recompute_edge_state(edge_id);
        }
    }

    fn mark_local(&mut self, id: DistributedId) {
        self.location.set_local(id);
        if let Some(node) = self.graph.node_mut(id) {
            node.set_local(self.self_rank);
        }
        self.recompute_incident_edges(id);
        for cb in &mut self.on_set_local {
            cb(id);
        }
    }

    fn mark_distant(&mut self, id: DistributedId) {
        self.location.set_distant(id);
        if let Some(node) = self.graph.node_mut(id) {
            node.set_distant();
        }
        self.recompute_incident_edges(id);
        for cb in &mut self.on_set_distant {
            cb(id);
        }
    }

    /// Allocates and inserts a fresh LOCAL node, installing a mutex marker
    /// when the active backend is hard sync mode.
    pub fn build_node(&mut self, data: T, weight: f64) -> NodeHandle {
        let id = self.node_ids.allocate();
        let mut node = DistNode::new_local(id, data, weight, self.self_rank);
        if let SyncBackend::Hard(mode) = &mut self.backend {
            node.install_mutex(Box::new(mode.install(id)));
        }
        self.graph
            .insert_node(node)
            .expect("freshly allocated id cannot already be present");
        self.location.set_local(id);
        self.location.add_managed_node(id, self.self_rank);
        trace!(%id, "built local node");
        id
    }

    fn serialize_payload(&self, id: DistributedId) -> DistGraphResult<Vec<u8>> {
        let node = self
            .graph
            .node(id)
            .ok_or(DistGraphError::UnknownInPartition(id))?;
        let mut pack = ObjectPack::new();
        pack.allocate(node.data().packed_size());
        pack.put(node.data());
        Ok(pack.dump())
    }

    fn build_link_record(
        &self,
        edge_id: DistributedId,
        layer: LayerId,
        weight: f64,
        source: DistributedId,
        target: DistributedId,
    ) -> DistGraphResult<LinkRecord> {
        let src_node = self
            .graph
            .node(source)
            .ok_or(DistGraphError::UnknownInPartition(source))?;
        let tgt_node = self
            .graph
            .node(target)
            .ok_or(DistGraphError::UnknownInPartition(target))?;
        Ok(LinkRecord {
            edge_id,
            layer,
            weight,
            source_id: source,
            source_location: src_node.location(),
            source_payload: self.serialize_payload(source)?,
            target_id: target,
            target_location: tgt_node.location(),
            target_payload: self.serialize_payload(target)?,
        })
    }

    /// Links `src` to `tgt` on `layer`. If either endpoint is DISTANT, the
    /// active backend is informed so the link can be propagated to the
    /// endpoint's owner.
    pub fn link(
        &mut self,
        ctx: &MpiContext,
        src: NodeHandle,
        tgt: NodeHandle,
        layer: LayerId,
        weight: f64,
    ) -> DistGraphResult<EdgeHandle> {
        let src_state = self
            .graph
            .node(src)
            .map(DistNode::state)
            .ok_or(DistGraphError::UnknownInPartition(src))?;
        let tgt_state = self
            .graph
            .node(tgt)
            .map(DistNode::state)
            .ok_or(DistGraphError::UnknownInPartition(tgt))?;

        let id = self.edge_ids.allocate();
        let state = if src_state == LocationState::Local && tgt_state == LocationState::Local {
            LocationState::Local
        } else {
            LocationState::Distant
        };
        self.graph
            .insert_edge(DistEdge::new(id, layer, weight, src, tgt, state))?;

        if state == LocationState::Distant {
            let record = self.build_link_record(id, layer, weight, src, tgt)?;
            let dests = self.remote_owners(src, tgt);
            self.notify_link(ctx, &dests, record)?;
        }

        trace!(%id, layer, "linked");
        Ok(id)
    }

    fn remote_owners(&self, src: DistributedId, tgt: DistributedId) -> BTreeSet<i32> {
        let mut dests = BTreeSet::new();
        if let Some(node) = self.graph.node(src) {
            if node.state() == LocationState::Distant {
                dests.insert(node.location());
            }
        }
        if let Some(node) = self.graph.node(tgt) {
            if node.state() == LocationState::Distant {
                dests.insert(node.location());
            }
        }
        dests
    }

    fn notify_link(
        &mut self,
        ctx: &MpiContext,
        dests: &BTreeSet<i32>,
        record: LinkRecord,
    ) -> DistGraphResult<()> {
        match &mut self.backend {
            SyncBackend::Ghost { linker, .. } => {
                for &dest in dests {
                    linker.buffer_link(dest, record.clone());
                }
            }
            SyncBackend::Hard(_) => {
                for &dest in dests {
                    distgraph_mpi::send(ctx, dest, self.epoch, MessageTag::Link, &record)?;
                }
            }
        }
        Ok(())
    }

    /// Removes an edge. If the edge touched a DISTANT endpoint, the owner
    /// is notified; an endpoint left isolated and DISTANT as a result is
    /// cleared from this process entirely.
    pub fn unlink(&mut self, ctx: &MpiContext, edge: EdgeHandle) -> DistGraphResult<()> {
        let (src, tgt, dests) = {
            let edge_ref = self
                .graph
                .edge(edge)
                .ok_or(DistGraphError::UnknownInPartition(edge))?;
            let (src, tgt) = (edge_ref.source(), edge_ref.target());
            (src, tgt, self.remote_owners(src, tgt))
        };

        self.graph.erase_edge(edge)?;

        match &mut self.backend {
            SyncBackend::Ghost { linker, .. } => {
                for &dest in &dests {
                    linker.buffer_unlink(dest, edge);
                }
            }
            SyncBackend::Hard(_) => {
                for &dest in &dests {
                    distgraph_mpi::send(ctx, dest, self.epoch, MessageTag::Unlink, &edge)?;
                }
            }
        }

        for id in [src, tgt] {
            self.clear_if_orphan(id);
        }
        Ok(())
    }

    fn clear_if_orphan(&mut self, id: DistributedId) {
        let should_clear = self
            .graph
            .node(id)
            .map(|n| n.state() == LocationState::Distant && n.is_isolated())
            .unwrap_or(false);
        if should_clear {
            let _ = self.graph.erase_node(id);
            self.location.remove(id);
            debug!(%id, "cleared orphaned ghost");
        }
    }

    /// Removes a node. If LOCAL, unlinks all incident edges first and
    /// erases it; if DISTANT, forwards a remove request to the owner and
    /// drops the local ghost.
    pub fn remove_node(&mut self, ctx: &MpiContext, node: NodeHandle) -> DistGraphResult<()> {
        let state = self
            .graph
            .node(node)
            .map(DistNode::state)
            .ok_or(DistGraphError::UnknownInPartition(node))?;

        if state == LocationState::Local {
            for edge in self.graph.incident_edges(node) {
                self.unlink(ctx, edge)?;
            }
            if let SyncBackend::Hard(mode) = &mut self.backend {
                mode.remove(node);
            }
            self.graph.erase_node(node)?;
            self.location.remove(node);
        } else {
            let owner = self
                .graph
                .node(node)
                .map(DistNode::location)
                .unwrap_or(self.self_rank);
            match &mut self.backend {
                SyncBackend::Ghost { linker, .. } => linker.buffer_remove_node(owner, node),
                SyncBackend::Hard(_) => {
                    distgraph_mpi::send(ctx, owner, self.epoch, MessageTag::RemoveNode, &node)?
                }
            }
            for edge in self.graph.incident_edges(node) {
                let _ = self.graph.erase_edge(edge);
            }
            let _ = self.graph.erase_node(node);
            self.location.remove(node);
        }
        Ok(())
    }

    /// Called by the migration pipeline (and directly, by integration
    /// tests) when a node is received: upgrades an existing DISTANT ghost
    /// to LOCAL in place, or inserts it fresh.
    pub fn import_node(&mut self, id: DistributedId, data: T, weight: f64) -> DistGraphResult<()> {
        if self.graph.contains_node(id) {
            if let Some(node) = self.graph.node_mut(id) {
                node.set_data(data);
                node.set_weight(weight);
            }
            self.mark_local(id);
        } else {
            let mut node = DistNode::new_local(id, data, weight, self.self_rank);
            if let SyncBackend::Hard(mode) = &mut self.backend {
                node.install_mutex(Box::new(mode.install(id)));
            }
            self.graph.insert_node(node)?;
            self.location.set_local(id);
        }
        self.location.add_managed_node(id, self.self_rank);
        Ok(())
    }

    /// Applies a received `LinkRecord`: idempotent if the edge already
    /// exists (state is simply recomputed), materializing either missing
    /// endpoint as a DISTANT placeholder.
    pub fn import_edge(&mut self, record: LinkRecord) -> DistGraphResult<()> {
        apply_links(&mut self.graph, std::iter::once(record))?;
        Ok(())
    }

    /// Flushes pending ghost-mode link/unlink/remove notifications. A
    /// no-op under hard sync mode, which applies them immediately.
    fn flush_pending(&mut self, ctx: &MpiContext) -> DistGraphResult<()> {
        if let SyncBackend::Ghost { linker, .. } = &mut self.backend {
            linker.synchronize(ctx, &mut self.graph, self.epoch)?;
        }
        Ok(())
    }

    /// Flushes buffered ghost operations and refreshes DISTANT node data.
    /// Under hard sync mode this drains the reception pump and attempts a
    /// termination round (a no-op on every rank but 0).
    pub fn synchronize(&mut self, ctx: &MpiContext) -> DistGraphResult<()> {
        match &mut self.backend {
            SyncBackend::Ghost { linker, data_sync } => {
                linker.synchronize(ctx, &mut self.graph, self.epoch)?;
                data_sync.synchronize(ctx, &mut self.graph, &self.location, self.epoch)?;
                self.epoch = self.epoch.flipped();
            }
            SyncBackend::Hard(mode) => {
                mode.pump(ctx, &mut self.graph)?;
                mode.try_terminate(ctx, &mut self.graph)?;
            }
        }
        Ok(())
    }

    /// The ten-step migration pipeline: moves every node named in
    /// `partition` to its assigned rank, along with its incident edges,
    /// and refreshes location/data bookkeeping afterward.
    pub fn distribute(
        &mut self,
        ctx: &MpiContext,
        partition: &BTreeMap<DistributedId, i32>,
    ) -> DistGraphResult<()> {
        self.flush_pending(ctx)?;

        let mut exported_nodes_by_dest: BTreeMap<i32, Vec<DistributedId>> = BTreeMap::new();
        for (&id, &dest) in partition {
            if dest == self.self_rank {
                continue;
            }
            if self.graph.node(id).map(DistNode::state) == Some(LocationState::Local) {
                exported_nodes_by_dest.entry(dest).or_default().push(id);
            }
        }
        let exported_nodes: Vec<DistributedId> =
            exported_nodes_by_dest.values().flatten().copied().collect();

        let mut exported_edges_by_dest: BTreeMap<i32, BTreeSet<DistributedId>> = BTreeMap::new();
        for (&dest, ids) in &exported_nodes_by_dest {
            for &id in ids {
                for edge_id in self.graph.incident_edges(id) {
                    exported_edges_by_dest.entry(dest).or_default().insert(edge_id);
                }
            }
        }

        let mut node_payloads: BTreeMap<i32, Vec<DataRefreshResponse>> = BTreeMap::new();
        for (&dest, ids) in &exported_nodes_by_dest {
            let mut records = Vec::with_capacity(ids.len());
            for &id in ids {
                let node = self
                    .graph
                    .node(id)
                    .ok_or(DistGraphError::UnknownInPartition(id))?;
                let mut pack = ObjectPack::new();
                pack.allocate(node.data().packed_size());
                pack.put(node.data());
                records.push(DataRefreshResponse {
                    id,
                    weight: node.weight(),
                    payload: pack.dump(),
                });
            }
            node_payloads.insert(dest, records);
        }

        let mut edge_payloads: BTreeMap<i32, Vec<LinkRecord>> = BTreeMap::new();
        for (&dest, ids) in &exported_edges_by_dest {
            let mut records = Vec::with_capacity(ids.len());
            for &edge_id in ids {
                let edge = self
                    .graph
                    .edge(edge_id)
                    .ok_or(DistGraphError::UnknownInPartition(edge_id))?;
                records.push(self.build_link_record(
                    edge_id,
                    edge.layer(),
                    edge.weight(),
                    edge.source(),
                    edge.target(),
                )?);
            }
            edge_payloads.insert(dest, records);
        }

        let nodes_received =
            distgraph_mpi::all_to_all(ctx, self.epoch, MessageTag::Migration, node_payloads)?;
        let edges_received =
            distgraph_mpi::all_to_all(ctx, self.epoch, MessageTag::Link, edge_payloads)?;

        for record in nodes_received.into_values().flatten() {
            let pack = ObjectPack::parse(record.payload);
            let mut tmp: TemporaryNode<T> = TemporaryNode::new(record.id, self.self_rank, pack);
            let data = tmp.build()?;
            self.import_node(record.id, data, record.weight)?;
        }
        for record in edges_received.into_values().flatten() {
            self.import_edge(record)?;
        }

        for &id in &exported_nodes {
            self.mark_distant(id);
        }
        for &id in &exported_nodes {
            self.clear_if_orphan(id);
        }

        self.location.update_locations(ctx, &mut self.graph, self.epoch)?;

        if let SyncBackend::Ghost { data_sync, .. } = &mut self.backend {
            data_sync.synchronize(ctx, &mut self.graph, &self.location, self.epoch)?;
        }

        self.epoch = self.epoch.flipped();
        debug!(rank = self.self_rank, moved = exported_nodes.len(), "distribute complete");
        Ok(())
    }
}
