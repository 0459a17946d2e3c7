//! Hard synchronization mode: per-node readers/writers mutex served by a
//! reception pump, plus Dijkstra-Feijen-van Gasteren termination
//! detection.
//!
//! Every suspension point in this module (`read`, `acquire`, `lock`) pumps
//! incoming requests while it waits, which is the only sanctioned form of
//! interleaving in an otherwise single-threaded-per-process model; it is
//! what keeps a cycle of processes reading from each other from
//! deadlocking.

use std::collections::{BTreeMap, VecDeque};

use distgraph_core::{DistributedId, Graph, NodeMutex, ResourceContainer};
use distgraph_pack::pack::{ObjectPack, PackSerialize};
use distgraph_pack::PackResult;
use distgraph_mpi::{Epoch, MessageTag, MpiContext};
use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::ghost::{apply_links, LinkRecord};

/// Who currently holds a node's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LockState {
    Unlocked,
    Shared(Vec<i32>),
    Exclusive(i32),
}

/// A process waiting for a node's lock, served in FIFO order regardless
/// of whether it wants shared or exclusive access (DESIGN.md open
/// question #2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiter {
    Read(i32),
    Acquire(i32),
}

/// Per-node readers/writers lock. References its node only by id, never
/// by pointer, so it can be dropped or moved independently of the node's
/// storage.
#[derive(Debug)]
pub struct HardSyncMutex {
    node_id: DistributedId,
    state: LockState,
    queue: VecDeque<Waiter>,
}

impl HardSyncMutex {
    pub fn new(node_id: DistributedId) -> Self {
        Self {
            node_id,
            state: LockState::Unlocked,
            queue: VecDeque::new(),
        }
    }

    fn is_free_for_read(&self) -> bool {
        matches!(self.state, LockState::Unlocked | LockState::Shared(_))
    }

    fn is_free_for_write(&self) -> bool {
        matches!(self.state, LockState::Unlocked)
    }

    /// Grants a shared (read) lock to `requester` immediately if free,
    /// otherwise enqueues it. Returns `true` if granted now.
    fn try_read(&mut self, requester: i32) -> bool {
        if self.queue.is_empty() && self.is_free_for_read() {
            match &mut self.state {
                LockState::Unlocked => self.state = LockState::Shared(vec![requester]),
                LockState::Shared(readers) => readers.push(requester),
                LockState::Exclusive(_) => unreachable!(),
            }
            true
        } else {
            self.queue.push_back(Waiter::Read(requester));
            false
        }
    }

    /// Grants an exclusive (acquire) lock to `requester` immediately if
    /// free, otherwise enqueues it.
    fn try_acquire(&mut self, requester: i32) -> bool {
        if self.queue.is_empty() && self.is_free_for_write() {
            self.state = LockState::Exclusive(requester);
            true
        } else {
            self.queue.push_back(Waiter::Acquire(requester));
            false
        }
    }

    /// Releases an exclusive hold and serves the next FIFO waiter, if any.
    /// Returns the waiters that became runnable as a result (there may be
    /// several consecutive `Read` waiters served together).
    fn release_exclusive(&mut self) -> Vec<Waiter> {
        self.state = LockState::Unlocked;
        self.drain_runnable()
    }

    /// Drops one reader from a shared hold; if it was the last one, tries
    /// to serve the queue.
    fn release_shared(&mut self, reader: i32) -> Vec<Waiter> {
        if let LockState::Shared(readers) = &mut self.state {
            readers.retain(|r| *r != reader);
            if readers.is_empty() {
                self.state = LockState::Unlocked;
                return self.drain_runnable();
            }
        }
        Vec::new()
    }

    fn drain_runnable(&mut self) -> Vec<Waiter> {
        let mut served = Vec::new();
        while let Some(front) = self.queue.front().copied() {
            match front {
                Waiter::Acquire(rank) => {
                    if matches!(self.state, LockState::Unlocked) {
                        self.queue.pop_front();
                        self.state = LockState::Exclusive(rank);
                        served.push(front);
                    }
                    break;
                }
                Waiter::Read(rank) => {
                    if self.is_free_for_read() {
                        self.queue.pop_front();
                        match &mut self.state {
                            LockState::Unlocked => self.state = LockState::Shared(vec![rank]),
                            LockState::Shared(readers) => readers.push(rank),
                            LockState::Exclusive(_) => break,
                        }
                        served.push(front);
                    } else {
                        break;
                    }
                }
            }
        }
        served
    }
}

impl NodeMutex for HardSyncMutex {
    fn node_id(&self) -> DistributedId {
        self.node_id
    }
}

/// A process's color in the Dijkstra-Feijen-van Gasteren termination
/// algorithm. `Black` means "has responded to a request since the last
/// token pass"; `White` means "quiescent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    White,
    Black,
}

/// Applies one hop of the DFvG token: a `Black` process (or an
/// already-black token) blackens the token before forwarding it, and the
/// process becomes `White` again afterwards. Pure function so the
/// algorithm's core rule can be tested without MPI.
pub fn forward_token(token: Color, process_color: Color) -> (Color, Color) {
    let forwarded = if token == Color::Black || process_color == Color::Black {
        Color::Black
    } else {
        Color::White
    };
    (forwarded, Color::White)
}

/// Rank 0's decision when the token returns: terminate iff the token is
/// still `White` and rank 0 itself is `White`.
pub fn round_converged(token: Color, rank0_color: Color) -> bool {
    token == Color::White && rank0_color == Color::White
}

impl PackSerialize for Color {
    fn packed_size(&self) -> usize {
        1
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        let byte: u8 = match self {
            Color::White => 0,
            Color::Black => 1,
        };
        byte.write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        Ok(match u8::read_from(pack)? {
            0 => Color::White,
            _ => Color::Black,
        })
    }
}

/// Owns every LOCAL node's `HardSyncMutex` and runs the reception pump.
pub struct HardSyncMode {
    mutexes: BTreeMap<DistributedId, HardSyncMutex>,
    color: Color,
    epoch: Epoch,
}

impl Default for HardSyncMode {
    fn default() -> Self {
        Self::new()
    }
}

impl HardSyncMode {
    pub fn new() -> Self {
        Self {
            mutexes: BTreeMap::new(),
            color: Color::White,
            epoch: Epoch::default(),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Installs a fresh lock for a newly built LOCAL node.
    pub fn install(&mut self, id: DistributedId) -> HardSyncMutex {
        self.mutexes.insert(id, HardSyncMutex::new(id));
        HardSyncMutex::new(id)
    }

    pub fn remove(&mut self, id: DistributedId) {
        self.mutexes.remove(&id);
    }

    /// Drains every reserved tag once, dispatching to the corresponding
    /// handler. Called from every suspension point; must never block.
    pub fn pump<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
    ) -> SyncResult<()> {
        use MessageTag::*;
        for kind in [
            Read,
            Acquire,
            ReleaseAcquire,
            UnlockShared,
            RemoveNode,
            Unlink,
            Link,
        ] {
            if let Some(source) = distgraph_mpi::iprobe_any(ctx, self.epoch, kind)? {
                self.handle(ctx, graph, kind, source)?;
            }
        }
        Ok(())
    }

    fn handle<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        kind: MessageTag,
        source: i32,
    ) -> SyncResult<()> {
        match kind {
            MessageTag::Read => {
                let id: DistributedId =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::Read)?;
                self.color = Color::Black;
                let mutex = self
                    .mutexes
                    .get_mut(&id)
                    .ok_or(SyncError::NotLocal(id))?;
                if mutex.try_read(source) {
                    self.respond_with_data(ctx, graph, id, source, MessageTag::ReadResponse)?;
                }
                Ok(())
            }
            MessageTag::Acquire => {
                let id: DistributedId =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::Acquire)?;
                self.color = Color::Black;
                let mutex = self
                    .mutexes
                    .get_mut(&id)
                    .ok_or(SyncError::NotLocal(id))?;
                if mutex.try_acquire(source) {
                    self.respond_with_data(ctx, graph, id, source, MessageTag::AcquireResponse)?;
                }
                Ok(())
            }
            MessageTag::ReleaseAcquire => {
                let (id, data): (DistributedId, T) =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::ReleaseAcquire)?;
                if let Some(node) = graph.node_mut(id) {
                    node.set_data(data);
                }
                let served = self
                    .mutexes
                    .get_mut(&id)
                    .map(HardSyncMutex::release_exclusive)
                    .unwrap_or_default();
                self.serve_waiters(ctx, graph, id, served)?;
                Ok(())
            }
            MessageTag::UnlockShared => {
                let id: DistributedId =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::UnlockShared)?;
                let served = self
                    .mutexes
                    .get_mut(&id)
                    .map(|m| m.release_shared(source))
                    .unwrap_or_default();
                self.serve_waiters(ctx, graph, id, served)?;
                Ok(())
            }
            MessageTag::RemoveNode => {
                let id: DistributedId =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::RemoveNode)?;
                for edge in graph.incident_edges(id) {
                    let _ = graph.erase_edge(edge);
                }
                let _ = graph.erase_node(id);
                self.mutexes.remove(&id);
                Ok(())
            }
            MessageTag::Unlink => {
                let id: DistributedId =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::Unlink)?;
                let _ = graph.erase_edge(id);
                Ok(())
            }
            MessageTag::Link => {
                let record: LinkRecord =
                    distgraph_mpi::recv(ctx, source, self.epoch, MessageTag::Link)?;
                trace!(edge_id = %record.edge_id, "hard sync applying remote link");
                apply_links(graph, std::iter::once(record))?;
                Ok(())
            }
            other => Err(SyncError::Mpi(
                distgraph_mpi::MpiAbstractionError::UnexpectedTag(other as i32),
            )),
        }
    }

    /// Answers a `READ`/`ACQUIRE` response by reading `id`'s current data
    /// through the `ResourceContainer` seam rather than `Graph<T>`
    /// directly, so the server side only ever depends on "give me this
    /// node's data", not the full local-graph surface.
    fn respond_with_data<T: PackSerialize + Clone>(
        &self,
        ctx: &MpiContext,
        container: &impl ResourceContainer<T>,
        id: DistributedId,
        dest: i32,
        tag: MessageTag,
    ) -> SyncResult<()> {
        if let Some(data) = container.local_data(id) {
            distgraph_mpi::send(ctx, dest, self.epoch, tag, data)?;
        }
        Ok(())
    }

    fn serve_waiters<T: PackSerialize + Clone>(
        &self,
        ctx: &MpiContext,
        container: &impl ResourceContainer<T>,
        id: DistributedId,
        served: Vec<Waiter>,
    ) -> SyncResult<()> {
        for waiter in served {
            match waiter {
                Waiter::Read(rank) => {
                    self.respond_with_data(ctx, container, id, rank, MessageTag::ReadResponse)?
                }
                Waiter::Acquire(rank) => {
                    self.respond_with_data(ctx, container, id, rank, MessageTag::AcquireResponse)?
                }
            }
        }
        Ok(())
    }

    /// Reads `id`'s current data. Local fast path if this process holds
    /// it; otherwise a remote `READ` request, pumping other incoming
    /// requests while waiting for the reply.
    pub fn read<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        id: DistributedId,
        owner: i32,
    ) -> SyncResult<T> {
        if owner == ctx.rank() {
            if let Some(mutex) = self.mutexes.get_mut(&id) {
                while !mutex.try_read(ctx.rank()) {
                    self.pump(ctx, graph)?;
                }
            }
            return graph
                .node(id)
                .map(|n| n.data().clone())
                .ok_or(SyncError::NotLocal(id));
        }

        distgraph_mpi::issend(ctx, owner, self.epoch, MessageTag::Read, &id)?;
        loop {
            if let Some(source) =
                distgraph_mpi::iprobe_any(ctx, self.epoch, MessageTag::ReadResponse)?
            {
                if source == owner {
                    return distgraph_mpi::recv(ctx, owner, self.epoch, MessageTag::ReadResponse)
                        .map_err(SyncError::from);
                }
            }
            self.pump(ctx, graph)?;
        }
    }

    /// Acquires exclusive access, returning the current data. The caller
    /// must eventually call `release` with updated data.
    pub fn acquire<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        id: DistributedId,
        owner: i32,
    ) -> SyncResult<T> {
        if owner == ctx.rank() {
            if let Some(mutex) = self.mutexes.get_mut(&id) {
                while !mutex.try_acquire(ctx.rank()) {
                    self.pump(ctx, graph)?;
                }
            }
            return graph
                .node(id)
                .map(|n| n.data().clone())
                .ok_or(SyncError::NotLocal(id));
        }

        distgraph_mpi::issend(ctx, owner, self.epoch, MessageTag::Acquire, &id)?;
        loop {
            if let Some(source) =
                distgraph_mpi::iprobe_any(ctx, self.epoch, MessageTag::AcquireResponse)?
            {
                if source == owner {
                    return distgraph_mpi::recv(
                        ctx,
                        owner,
                        self.epoch,
                        MessageTag::AcquireResponse,
                    )
                    .map_err(SyncError::from);
                }
            }
            self.pump(ctx, graph)?;
        }
    }

    /// Releases a prior `acquire`, publishing `data` as the node's new
    /// value and serving the next FIFO waiter.
    pub fn release<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
        id: DistributedId,
        owner: i32,
        data: T,
    ) -> SyncResult<()> {
        if owner == ctx.rank() {
            if let Some(node) = graph.node_mut(id) {
                node.set_data(data);
            }
            let served = self
                .mutexes
                .get_mut(&id)
                .map(HardSyncMutex::release_exclusive)
                .unwrap_or_default();
            self.serve_waiters(ctx, graph, id, served)?;
            return Ok(());
        }
        distgraph_mpi::send(
            ctx,
            owner,
            self.epoch,
            MessageTag::ReleaseAcquire,
            &(id, data),
        )?;
        Ok(())
    }

    /// Runs one termination round. Every rank must call this (it is called
    /// unconditionally from `DistributedGraph::synchronize`): the token
    /// physically circulates rank 0 -> size-1 -> size-2 -> ... -> 1 -> 0,
    /// and the closing convergence flag is an MPI broadcast, a collective
    /// every rank in the communicator must enter or the others hang
    /// forever waiting on it.
    pub fn try_terminate<T: PackSerialize + Clone>(
        &mut self,
        ctx: &MpiContext,
        graph: &mut Graph<T>,
    ) -> SyncResult<bool> {
        let rank = ctx.rank();
        let size = ctx.size();

        if size == 1 {
            self.epoch = self.epoch.flipped();
            self.color = Color::White;
            return Ok(true);
        }

        let converged = if rank == 0 {
            let token = Color::White;
            distgraph_mpi::send(ctx, size - 1, self.epoch, MessageTag::Token, &token)?;

            let predecessor = 1;
            let received = loop {
                if distgraph_mpi::iprobe(ctx, predecessor, self.epoch, MessageTag::Token)? {
                    break distgraph_mpi::recv(ctx, predecessor, self.epoch, MessageTag::Token)?;
                }
                self.pump(ctx, graph)?;
            };

            round_converged(received, self.color)
        } else {
            let predecessor = if rank == size - 1 { 0 } else { rank + 1 };
            let successor = rank - 1;

            let incoming = loop {
                if distgraph_mpi::iprobe(ctx, predecessor, self.epoch, MessageTag::Token)? {
                    break distgraph_mpi::recv(ctx, predecessor, self.epoch, MessageTag::Token)?;
                }
                self.pump(ctx, graph)?;
            };

            let (forwarded, next_color) = forward_token(incoming, self.color);
            self.color = next_color;
            distgraph_mpi::send(ctx, successor, self.epoch, MessageTag::Token, &forwarded)?;
            false
        };

        let done: bool = if rank == 0 {
            distgraph_mpi::broadcast(ctx, 0, Some(&converged))?
        } else {
            distgraph_mpi::broadcast(ctx, 0, None)?
        };

        if done {
            self.epoch = self.epoch.flipped();
        }
        self.color = Color::White;
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lock_allows_multiple_readers() {
        let mut m = HardSyncMutex::new(DistributedId::new(0, 0));
        assert!(m.try_read(1));
        assert!(m.try_read(2));
        assert_eq!(m.state, LockState::Shared(vec![1, 2]));
    }

    #[test]
    fn acquire_blocks_until_queue_drains() {
        let mut m = HardSyncMutex::new(DistributedId::new(0, 0));
        assert!(m.try_read(1));
        assert!(!m.try_acquire(2));
        assert_eq!(m.queue.len(), 1);
        let served = m.release_shared(1);
        assert_eq!(served, vec![Waiter::Acquire(2)]);
        assert_eq!(m.state, LockState::Exclusive(2));
    }

    #[test]
    fn fifo_order_is_preserved_across_mixed_waiters() {
        let mut m = HardSyncMutex::new(DistributedId::new(0, 0));
        assert!(m.try_acquire(1));
        assert!(!m.try_read(2));
        assert!(!m.try_acquire(3));
        let served = m.release_exclusive();
        assert_eq!(served, vec![Waiter::Read(2)]);
        assert_eq!(m.state, LockState::Shared(vec![2]));
        let served2 = m.release_shared(2);
        assert_eq!(served2, vec![Waiter::Acquire(3)]);
    }

    #[test]
    fn forward_token_blackens_on_active_process() {
        let (token, self_after) = forward_token(Color::White, Color::Black);
        assert_eq!(token, Color::Black);
        assert_eq!(self_after, Color::White);

        let (token2, _) = forward_token(Color::Black, Color::White);
        assert_eq!(token2, Color::Black);

        let (token3, _) = forward_token(Color::White, Color::White);
        assert_eq!(token3, Color::White);
    }

    #[test]
    fn round_converges_only_when_token_and_rank0_are_white() {
        assert!(round_converged(Color::White, Color::White));
        assert!(!round_converged(Color::Black, Color::White));
        assert!(!round_converged(Color::White, Color::Black));
    }

    #[test]
    fn color_round_trips_through_object_pack() {
        let mut pack = ObjectPack::new();
        pack.allocate(Color::Black.packed_size());
        pack.put(&Color::Black);
        let back: Color = pack.get().unwrap();
        assert_eq!(back, Color::Black);
    }
}
