//! Typed point-to-point messaging over an `MpiContext`.
//!
//! Every function here serializes through `distgraph_pack::ObjectPack`
//! before handing bytes to the underlying `mpi` crate, and deserializes on
//! the way back out. This is the one place that touches `mpi`'s raw
//! point-to-point API; everything above this module deals only in typed
//! values and `MessageTag`/`Epoch` pairs.

use distgraph_pack::{ObjectPack, PackSerialize};
use mpi::point_to_point::{Destination, Source};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Rank;
use tracing::trace;

use crate::context::MpiContext;
use crate::error::{MpiAbstractionError, MpiResult};
use crate::tag::{Epoch, MessageTag};

fn world_rank(ctx: &MpiContext, rank: i32) -> MpiResult<Rank> {
    if rank < 0 || rank >= ctx.size() {
        return Err(MpiAbstractionError::RankOutOfRange(rank, ctx.size()));
    }
    Ok(rank)
}

fn wire_tag(epoch: Epoch, kind: MessageTag) -> i32 {
    epoch.tag(kind)
}

/// Blocking send of a typed value to `dest`, tagged with `kind` in the
/// current `epoch`.
pub fn send<T: PackSerialize>(
    ctx: &MpiContext,
    dest: i32,
    epoch: Epoch,
    kind: MessageTag,
    value: &T,
) -> MpiResult<()> {
    let dest = world_rank(ctx, dest)?;
    let mut pack = ObjectPack::new();
    pack.allocate(value.packed_size());
    pack.put(value);
    let bytes = pack.dump();
    let tag = wire_tag(epoch, kind);
    trace!(dest, tag, len = bytes.len(), "send");
    ctx.world()
        .process_at_rank(dest)
        .send_with_tag(&bytes[..], tag);
    Ok(())
}

/// Blocking receive of a typed value from `source`, tagged with `kind` in
/// `epoch`.
pub fn recv<T: PackSerialize>(
    ctx: &MpiContext,
    source: i32,
    epoch: Epoch,
    kind: MessageTag,
) -> MpiResult<T> {
    let source = world_rank(ctx, source)?;
    let tag = wire_tag(epoch, kind);
    let (msg, _status) = ctx.world().process_at_rank(source).matched_probe_with_tag(tag);
    let (bytes, _status): (Vec<u8>, _) = msg.matched_receive();
    trace!(source, tag, len = bytes.len(), "recv");
    let mut pack = ObjectPack::parse(bytes);
    Ok(pack.get::<T>()?)
}

/// Non-blocking probe for a message from `source` tagged `kind` in
/// `epoch`. Returns `true` if a message is ready to be received without
/// blocking. This is the primitive the reception pumps in
/// `distgraph-sync` poll on every iteration.
pub fn iprobe(ctx: &MpiContext, source: i32, epoch: Epoch, kind: MessageTag) -> MpiResult<bool> {
    let source = world_rank(ctx, source)?;
    let tag = wire_tag(epoch, kind);
    Ok(ctx
        .world()
        .process_at_rank(source)
        .immediate_probe_with_tag(tag)
        .is_some())
}

/// Non-blocking probe against any source for a message tagged `kind` in
/// `epoch`. Returns the sender's rank if a message is ready.
pub fn iprobe_any(ctx: &MpiContext, epoch: Epoch, kind: MessageTag) -> MpiResult<Option<i32>> {
    let tag = wire_tag(epoch, kind);
    Ok(ctx
        .world()
        .any_process()
        .immediate_probe_with_tag(tag)
        .map(|status| status.source_rank()))
}

/// Blocking probe (used when the caller is about to receive unconditionally
/// and only needs the sender/tag metadata first).
pub fn probe_any(ctx: &MpiContext, epoch: Epoch, kind: MessageTag) -> MpiResult<i32> {
    let tag = wire_tag(epoch, kind);
    let status = ctx.world().any_process().probe_with_tag(tag);
    Ok(status.source_rank())
}

/// Synchronous send (`MPI_Issend`): does not complete until the receiver
/// has started a matching receive. Used by the hard sync mode so that a
/// sender reliably knows its request was observed, which the termination
/// detection protocol depends on.
pub fn issend<T: PackSerialize>(
    ctx: &MpiContext,
    dest: i32,
    epoch: Epoch,
    kind: MessageTag,
    value: &T,
) -> MpiResult<()> {
    let dest = world_rank(ctx, dest)?;
    let mut pack = ObjectPack::new();
    pack.allocate(value.packed_size());
    pack.put(value);
    let bytes = pack.dump();
    let tag = wire_tag(epoch, kind);
    trace!(dest, tag, len = bytes.len(), "issend");
    mpi::request::scope(|scope| {
        let request = ctx
            .world()
            .process_at_rank(dest)
            .immediate_synchronous_send_with_tag(scope, &bytes[..], tag);
        // The caller is expected to keep pumping other incoming requests
        // while this completes; `wait` here is safe because a synchronous
        // send only blocks until the *receive* is posted, not until it
        // finishes, so it cannot itself deadlock against the pump.
        request.wait();
    });
    Ok(())
}

/// Broadcasts a typed value from `root` to every process, including the
/// root itself. Used for the `END` message that closes a termination
/// round.
pub fn broadcast<T: PackSerialize + Default>(
    ctx: &MpiContext,
    root: i32,
    value: Option<&T>,
) -> MpiResult<T> {
    let root = world_rank(ctx, root)?;
    let is_root = ctx.rank() == root;
    let mut bytes = if is_root {
        let value = value.expect("root must supply the broadcast value");
        let mut pack = ObjectPack::new();
        pack.allocate(value.packed_size());
        pack.put(value);
        pack.dump()
    } else {
        Vec::new()
    };
    let mut len = bytes.len() as u64;
    ctx.world()
        .process_at_rank(root)
        .broadcast_into(&mut len);
    if !is_root {
        bytes = vec![0u8; len as usize];
    }
    ctx.world()
        .process_at_rank(root)
        .broadcast_into(&mut bytes[..]);
    let mut pack = ObjectPack::parse(bytes);
    Ok(pack.get::<T>()?)
}

/// Gathers one typed value per process onto `root`, in rank order.
/// Every process (including `root`) calls this and contributes its own
/// `value`; non-root callers get back `None`, `root` gets back
/// `Some(values)` with `values[r]` holding rank `r`'s contribution.
///
/// Built from point-to-point messages rather than `mpi`'s raw
/// `gather_into` because payloads are variable-length `ObjectPack`
/// buffers, not fixed-size records. `root` never sends to itself over
/// the wire (a blocking self-send of a large payload can deadlock
/// under a rendezvous protocol); it folds its own value in directly.
pub fn gather<T: PackSerialize + Clone>(
    ctx: &MpiContext,
    root: i32,
    epoch: Epoch,
    kind: MessageTag,
    value: &T,
) -> MpiResult<Option<Vec<T>>> {
    let root_rank = world_rank(ctx, root)?;
    let rank = ctx.rank();

    if rank != root_rank {
        send(ctx, root_rank, epoch, kind, value)?;
        return Ok(None);
    }

    let size = ctx.size();
    let mut values = Vec::with_capacity(size as usize);
    for source in 0..size {
        if source == root_rank {
            values.push(value.clone());
        } else {
            values.push(recv(ctx, source, epoch, kind)?);
        }
    }
    Ok(Some(values))
}

#[allow(dead_code)]
fn _assert_communicator_is_send(_: &SimpleCommunicator) {}
