//! Symmetric all-to-all exchange of typed payloads, keyed by destination
//! rank.
//!
//! Every process sends something (possibly an empty `Vec`) to every other
//! process, including itself, and receives the same shape back. This is
//! the collective the migration pipeline (`distgraph::distribute`) and the
//! location manager's `update_locations` use; both require every rank to
//! participate identically.

use std::collections::BTreeMap;

use distgraph_pack::{ObjectPack, PackSerialize};
use mpi::point_to_point::{Destination, Source};
use mpi::traits::*;

use crate::context::MpiContext;
use crate::error::MpiResult;
use crate::tag::{Epoch, MessageTag};

/// Performs one round of `all_to_all`: `outgoing[r]` is sent to rank `r`
/// (including `r == self_rank`); the returned map holds, for every rank
/// `r`, what `r` sent to this process.
pub fn all_to_all<T: PackSerialize>(
    ctx: &MpiContext,
    epoch: Epoch,
    kind: MessageTag,
    mut outgoing: BTreeMap<i32, Vec<T>>,
) -> MpiResult<BTreeMap<i32, Vec<T>>> {
    let size = ctx.size();
    let tag = epoch.tag(kind);

    let mut buffers = Vec::with_capacity(size as usize);
    for rank in 0..size {
        let items = outgoing.remove(&rank).unwrap_or_default();
        let mut pack = ObjectPack::new();
        pack.allocate(items.packed_size());
        pack.put(&items);
        buffers.push(pack.dump());
    }

    mpi::request::scope(|scope| {
        let mut requests = Vec::with_capacity(size as usize);
        for (rank, bytes) in buffers.iter().enumerate() {
            let req = ctx
                .world()
                .process_at_rank(rank as i32)
                .immediate_synchronous_send_with_tag(scope, &bytes[..], tag);
            requests.push(req);
        }

        let mut incoming = BTreeMap::new();
        for rank in 0..size {
            let (msg, _status) = ctx
                .world()
                .process_at_rank(rank)
                .matched_probe_with_tag(tag);
            let (bytes, _status): (Vec<u8>, _) = msg.matched_receive();
            let mut pack = ObjectPack::parse(bytes);
            let items: Vec<T> = pack.get()?;
            incoming.insert(rank, items);
        }

        for req in requests {
            req.wait();
        }

        Ok(incoming)
    })
}
