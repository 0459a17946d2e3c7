//! Ghost synchronization mode: optimistic, epoch-based.
//!
//! Link/unlink/remove-node operations touching a DISTANT endpoint are
//! buffered locally and flushed in one `all_to_all` round per
//! `synchronize()` call; bulk ghost-data refresh is a second, independent
//! round. There is no per-object locking: a ghost's data is whatever the
//! last `synchronize()` fetched.

use std::collections::BTreeMap;

use distgraph_core::{DistEdge, DistributedId, Graph, LayerId, LocationState};
use distgraph_pack::pack::{ObjectPack, PackSerialize};
use distgraph_pack::{LightPackSerialize, PackResult, TemporaryNode};
use distgraph_mpi::{Epoch, MessageTag, MpiContext};
use tracing::trace;

use crate::error::SyncResult;
use crate::location::LocationManager;

/// Wire record for a buffered `link`. Endpoints carry an embedded,
/// lazily-deserialized payload so the receiver can materialize a DISTANT
/// placeholder if it doesn't already know the endpoint.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub edge_id: DistributedId,
    pub layer: LayerId,
    pub weight: f64,
    pub source_id: DistributedId,
    pub source_location: i32,
    pub source_payload: Vec<u8>,
    pub target_id: DistributedId,
    pub target_location: i32,
    pub target_payload: Vec<u8>,
}

impl PackSerialize for LinkRecord {
    fn packed_size(&self) -> usize {
        self.edge_id.packed_size()
            + self.layer.packed_size()
            + self.weight.packed_size()
            + self.source_id.packed_size()
            + self.source_location.packed_size()
            + self.source_payload.packed_size()
            + self.target_id.packed_size()
            + self.target_location.packed_size()
            + self.target_payload.packed_size()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        self.edge_id.write_into(pack);
        self.layer.write_into(pack);
        self.weight.write_into(pack);
        self.source_id.write_into(pack);
        self.source_location.write_into(pack);
        self.source_payload.write_into(pack);
        self.target_id.write_into(pack);
        self.target_location.write_into(pack);
        self.target_payload.write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        Ok(Self {
            edge_id: DistributedId::read_from(pack)?,
            layer: LayerId::read_from(pack)?,
            weight: f64::read_from(pack)?,
            source_id: DistributedId::read_from(pack)?,
            source_location: i32::read_from(pack)?,
            source_payload: Vec::<u8>::read_from(pack)?,
            target_id: DistributedId::read_from(pack)?,
            target_location: i32::read_from(pack)?,
            target_payload: Vec::<u8>::read_from(pack)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DataRefreshResponse {
    pub id: DistributedId,
    pub weight: f64,
    pub payload: Vec<u8>,
}

impl PackSerialize for DataRefreshResponse {
    fn packed_size(&self) -> usize {
        self.id.packed_size() + self.weight.packed_size() + self.payload.packed_size()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        self.id.write_into(pack);
        self.weight.write_into(pack);
        self.payload.write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        Ok(Self {
            id: DistributedId::read_from(pack)?,
            weight: f64::read_from(pack)?,
            payload: Vec::<u8>::read_from(pack)?,
        })
    }
}

/// Everything buffered by `link`/`unlink`/`remove_node` since the last
/// `synchronize()`, grouped by destination rank.
#[derive(Debug, Default)]
pub struct GhostLinker {
    pending_links: BTreeMap<i32, Vec<LinkRecord>>,
    pending_unlinks: BTreeMap<i32, Vec<DistributedId>>,
    pending_removes: BTreeMap<i32, Vec<DistributedId>>,
}

impl GhostLinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_link(&mut self, dest: i32, record: LinkRecord) {
        self.pending_links.entry(dest).or_default().push(record);
    }

    pub fn buffer_unlink(&mut self, dest: i32, edge_id: DistributedId) {
        self.pending_unlinks.entry(dest).or_default().push(edge_id);
    }

    pub fn buffer_remove_node(&mut self, dest: i32, node_id: DistributedId) {
        self.pending_removes.entry(dest).or_default().push(node_id);
    }

    pub fn is_empty(&self) -> bool {
        self.pending_links.is_empty()
            && self.pending_unlinks.is_empty()
            && self.pending_removes.is_empty()
    }

    /// Flushes all three buffered channels through one `all_to_all` round
    /// each, then applies everything received in the mandated order
    /// (REMOVE_NODE, UNLINK, LINK) to keep invariants I2/I3 intact:
    /// removing a node first drops its incident edges, then explicit
    /// unlinks apply, then new links attach (possibly materializing
    /// DISTANT endpoints via their embedded `TemporaryNode` payload).
    pub fn synchronize<T: PackSerialize>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        epoch: Epoch,
    ) -> SyncResult<()> {
        let removes = std::mem::take(&mut self.pending_removes);
        let unlinks = std::mem::take(&mut self.pending_unlinks);
        let links = std::mem::take(&mut self.pending_links);

        let removes_in =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::RemoveNode, removes)?;
        let unlinks_in = distgraph_mpi::all_to_all(ctx, epoch, MessageTag::Unlink, unlinks)?;
        let links_in = distgraph_mpi::all_to_all(ctx, epoch, MessageTag::Link, links)?;

        apply_removes(graph, removes_in.into_values().flatten());
        apply_unlinks(graph, unlinks_in.into_values().flatten());
        apply_links(graph, links_in.into_values().flatten())?;

        Ok(())
    }
}

pub(crate) fn apply_removes<T>(graph: &mut Graph<T>, ids: impl Iterator<Item = DistributedId>) {
    for id in ids {
        if graph.node(id).is_some() {
            for edge in graph.incident_edges(id) {
                let _ = graph.erase_edge(edge);
            }
            let _ = graph.erase_node(id);
        }
    }
}

pub(crate) fn apply_unlinks<T>(graph: &mut Graph<T>, ids: impl Iterator<Item = DistributedId>) {
    for id in ids {
        let _ = graph.erase_edge(id);
    }
}

pub fn apply_links<T: PackSerialize>(
    graph: &mut Graph<T>,
    records: impl Iterator<Item = LinkRecord>,
) -> SyncResult<()> {
    for record in records {
        materialize_endpoint(
            graph,
            record.source_id,
            record.source_location,
            record.source_payload,
        )?;
        materialize_endpoint(
            graph,
            record.target_id,
            record.target_location,
            record.target_payload,
        )?;

        let src_state = graph
            .node(record.source_id)
            .map(|n| n.state())
            .unwrap_or(LocationState::Distant);
        let tgt_state = graph
            .node(record.target_id)
            .map(|n| n.state())
            .unwrap_or(LocationState::Distant);
        let mut edge_state = LocationState::Distant;
        if src_state == LocationState::Local && tgt_state == LocationState::Local {
            edge_state = LocationState::Local;
        }

        if graph.edge(record.edge_id).is_none() {
            let edge = DistEdge::new(
                record.edge_id,
                record.layer,
                record.weight,
                record.source_id,
                record.target_id,
                edge_state,
            );
            let _ = graph.insert_edge(edge);
        }
    }
    Ok(())
}

fn materialize_endpoint<T: PackSerialize>(
    graph: &mut Graph<T>,
    id: DistributedId,
    location: i32,
    payload: Vec<u8>,
) -> SyncResult<()> {
    if graph.contains_node(id) {
        return Ok(());
    }
    let pack = ObjectPack::parse(payload);
    let mut tmp: TemporaryNode<T> = TemporaryNode::new(id, location, pack);
    let data = tmp.build()?;
    let node = distgraph_core::DistNode::new_distant(id, data, 1.0, location);
    graph.insert_node(node)?;
    trace!(%id, location, "materialized distant placeholder from link");
    Ok(())
}

/// Bulk ghost-data refresh: for every DISTANT node, request fresh data
/// from its current `location` and apply the reply.
#[derive(Debug, Default)]
pub struct GhostDataSync;

impl GhostDataSync {
    pub fn new() -> Self {
        Self
    }

    pub fn synchronize<T: LightPackSerialize>(
        &self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        location: &LocationManager,
        epoch: Epoch,
    ) -> SyncResult<()> {
        let mut requests: BTreeMap<i32, Vec<DistributedId>> = BTreeMap::new();
        for &id in location.distant_nodes() {
            if let Some(node) = graph.node(id) {
                requests.entry(node.location()).or_default().push(id);
            }
        }

        let requests_in =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::GhostDataRequest, requests)?;

        let mut responses: BTreeMap<i32, Vec<DataRefreshResponse>> = BTreeMap::new();
        for (requester, ids) in requests_in {
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(node) = graph.node(id) {
                    let mut pack = ObjectPack::new();
                    pack.allocate(node.data().light_packed_size());
                    pack.put_light(node.data());
                    records.push(DataRefreshResponse {
                        id,
                        weight: node.weight(),
                        payload: pack.dump(),
                    });
                }
            }
            responses.insert(requester, records);
        }

        let responses_in =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::GhostDataResponse, responses)?;

        for record in responses_in.into_values().flatten() {
            if let Some(node) = graph.node_mut(record.id) {
                let mut pack = ObjectPack::parse(record.payload);
                if let Ok(data) = pack.get_light::<T>() {
                    node.set_data(data);
                    node.set_weight(record.weight);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distgraph_core::DistNode;

    #[test]
    fn apply_order_removes_unlinks_then_links() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        g.insert_node(DistNode::new_local(a, 1, 1.0, 0)).unwrap();
        g.insert_node(DistNode::new_local(b, 2, 1.0, 0)).unwrap();
        let e = DistributedId::new(0, 10);
        g.insert_edge(DistEdge::new(e, 0, 1.0, a, b, LocationState::Local))
            .unwrap();

        apply_unlinks(&mut g, std::iter::once(e));
        assert!(g.edge(e).is_none());
        assert!(g.node(a).unwrap().out_edges(0).is_empty());
    }

    #[test]
    fn apply_removes_drops_incident_edges_first() {
        let mut g: Graph<i32> = Graph::new();
        let a = DistributedId::new(0, 0);
        let b = DistributedId::new(0, 1);
        g.insert_node(DistNode::new_local(a, 1, 1.0, 0)).unwrap();
        g.insert_node(DistNode::new_local(b, 2, 1.0, 0)).unwrap();
        let e = DistributedId::new(0, 10);
        g.insert_edge(DistEdge::new(e, 0, 1.0, a, b, LocationState::Local))
            .unwrap();

        apply_removes(&mut g, std::iter::once(a));
        assert!(g.node(a).is_none());
        assert!(g.edge(e).is_none());
        assert!(g.node(b).unwrap().in_edges(0).is_empty());
    }

    #[test]
    fn buffering_tracks_destinations_independently() {
        let mut linker = GhostLinker::new();
        assert!(linker.is_empty());
        linker.buffer_unlink(1, DistributedId::new(0, 5));
        linker.buffer_remove_node(2, DistributedId::new(0, 6));
        assert!(!linker.is_empty());
    }
}
