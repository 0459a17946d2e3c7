//! Location manager: tracks the current process's view of LOCAL/DISTANT
//! nodes, and the origin-rank bookkeeping that lets `update_locations`
//! resolve a DISTANT node's current host.
//!
//! Each `DistributedId`'s `rank()` field names the process that
//! *originated* it. That process is the location oracle for the id: it is
//! the one process guaranteed to always know where the node currently
//! lives, regardless of how many times the node has migrated since. This
//! is tracked separately from where the node's LOCAL copy actually is
//! (`local_nodes`/`distant_nodes`), since a process can originate an id
//! for a node that has since migrated away from it.

use std::collections::{BTreeMap, BTreeSet};

use distgraph_core::{DistributedId, Graph};
use distgraph_pack::pack::{ObjectPack, PackSerialize};
use distgraph_pack::PackResult;
use distgraph_mpi::{Epoch, MessageTag, MpiContext};
use tracing::debug;

use crate::error::SyncResult;

/// `(id, rank)` pair used for every location-management wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRecord {
    pub id: DistributedId,
    pub rank: i32,
}

impl PackSerialize for LocationRecord {
    fn packed_size(&self) -> usize {
        self.id.packed_size() + self.rank.packed_size()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        self.id.write_into(pack);
        self.rank.write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let id = DistributedId::read_from(pack)?;
        let rank = i32::read_from(pack)?;
        Ok(Self { id, rank })
    }
}

/// Tracks which nodes this process holds LOCAL vs. DISTANT, and, for ids
/// this process originated, where their LOCAL copy currently lives.
#[derive(Debug, Default)]
pub struct LocationManager {
    self_rank: i32,
    local_nodes: BTreeSet<DistributedId>,
    distant_nodes: BTreeSet<DistributedId>,
    managed_nodes_locations: BTreeMap<DistributedId, i32>,
}

impl LocationManager {
    pub fn new(self_rank: i32) -> Self {
        Self {
            self_rank,
            local_nodes: BTreeSet::new(),
            distant_nodes: BTreeSet::new(),
            managed_nodes_locations: BTreeMap::new(),
        }
    }

    pub fn local_nodes(&self) -> &BTreeSet<DistributedId> {
        &self.local_nodes
    }

    pub fn distant_nodes(&self) -> &BTreeSet<DistributedId> {
        &self.distant_nodes
    }

    /// Registers `id` as managed by this process if `id.rank() ==
    /// self_rank`; otherwise a no-op, since only the origin manages an id.
    pub fn add_managed_node(&mut self, id: DistributedId, initial_location: i32) {
        if id.rank() == self.self_rank {
            self.managed_nodes_locations.insert(id, initial_location);
        }
    }

    pub fn remove_managed_node(&mut self, id: DistributedId) {
        self.managed_nodes_locations.remove(&id);
    }

    pub fn set_local(&mut self, id: DistributedId) {
        self.distant_nodes.remove(&id);
        self.local_nodes.insert(id);
    }

    pub fn set_distant(&mut self, id: DistributedId) {
        self.local_nodes.remove(&id);
        self.distant_nodes.insert(id);
    }

    pub fn remove(&mut self, id: DistributedId) {
        self.local_nodes.remove(&id);
        self.distant_nodes.remove(&id);
        self.managed_nodes_locations.remove(&id);
    }

    /// Looks up the last-known location for `id`, if this process
    /// originated it.
    pub fn managed_location(&self, id: DistributedId) -> Option<i32> {
        self.managed_nodes_locations.get(&id).copied()
    }

    /// The three-phase synchronous `update_locations` protocol (see
    /// SPEC_FULL.md §4.6). After this returns, `graph`'s DISTANT nodes
    /// have an up-to-date `location` field (invariant I4).
    pub fn update_locations<T>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        epoch: Epoch,
    ) -> SyncResult<()> {
        // Phase 1: every process reports, to each id's origin, the
        // current location of ids it holds LOCAL but did not originate.
        let mut phase1: BTreeMap<i32, Vec<LocationRecord>> = BTreeMap::new();
        for &id in &self.local_nodes {
            if id.rank() != self.self_rank {
                phase1.entry(id.rank()).or_default().push(LocationRecord {
                    id,
                    rank: self.self_rank,
                });
            }
        }
        let phase1_incoming =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::LocationUpdate, phase1)?;
        for records in phase1_incoming.into_values() {
            for record in records {
                self.managed_nodes_locations.insert(record.id, record.rank);
            }
        }
        debug!(rank = ctx.rank(), "location manager phase 1 complete");

        // Phase 2: resolve DISTANT nodes this process originated directly
        // from its own bookkeeping.
        let mut remaining_requests: BTreeMap<i32, Vec<DistributedId>> = BTreeMap::new();
        for &id in &self.distant_nodes {
            if id.rank() == self.self_rank {
                if let Some(location) = self.managed_nodes_locations.get(&id) {
                    if let Some(node) = graph.node_mut(id) {
                        node.set_location(*location);
                    }
                }
            } else {
                remaining_requests.entry(id.rank()).or_default().push(id);
            }
        }

        // Phase 3: ask the origin of every other DISTANT node.
        let requests_incoming =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::LocationUpdate, remaining_requests)?;
        let mut responses: BTreeMap<i32, Vec<LocationRecord>> = BTreeMap::new();
        for (requester, ids) in requests_incoming {
            let records = ids
                .into_iter()
                .filter_map(|id| {
                    self.managed_nodes_locations
                        .get(&id)
                        .map(|&rank| LocationRecord { id, rank })
                })
                .collect();
            responses.insert(requester, records);
        }
        let responses_incoming =
            distgraph_mpi::all_to_all(ctx, epoch, MessageTag::LocationUpdate, responses)?;
        for records in responses_incoming.into_values() {
            for record in records {
                if let Some(node) = graph.node_mut(record.id) {
                    node.set_location(record.rank);
                }
            }
        }
        debug!(rank = ctx.rank(), "location manager phase 3 complete");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_local_and_distant_move_between_sets() {
        let mut lm = LocationManager::new(0);
        let id = DistributedId::new(0, 1);
        lm.set_local(id);
        assert!(lm.local_nodes().contains(&id));
        lm.set_distant(id);
        assert!(!lm.local_nodes().contains(&id));
        assert!(lm.distant_nodes().contains(&id));
    }

    #[test]
    fn only_origin_rank_tracks_managed_location() {
        let mut lm = LocationManager::new(0);
        let owned = DistributedId::new(0, 1);
        let foreign = DistributedId::new(1, 1);
        lm.add_managed_node(owned, 0);
        lm.add_managed_node(foreign, 1);
        assert_eq!(lm.managed_location(owned), Some(0));
        assert_eq!(lm.managed_location(foreign), None);
    }

    #[test]
    fn location_record_round_trips() {
        let rec = LocationRecord {
            id: DistributedId::new(2, 5),
            rank: 3,
        };
        let mut pack = ObjectPack::new();
        pack.allocate(rec.packed_size());
        pack.put(&rec);
        let back: LocationRecord = pack.get().unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn remove_clears_all_bookkeeping() {
        let mut lm = LocationManager::new(0);
        let id = DistributedId::new(0, 1);
        lm.set_local(id);
        lm.add_managed_node(id, 0);
        lm.remove(id);
        assert!(!lm.local_nodes().contains(&id));
        assert!(!lm.distant_nodes().contains(&id));
        assert_eq!(lm.managed_location(id), None);
    }
}
