//! Globally unique identifiers for distributed graph objects.
//!
//! An id is a `(rank, counter)` pair. The rank that allocates an id is
//! permanently recorded in it and never changes; it doubles as the id's
//! *origin*, i.e. the process that acts as location oracle for whatever
//! object carries it (see `distgraph_sync::location`).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A globally unique, totally ordered identifier: `(rank, counter)`.
///
/// Ordering and equality compare `rank` first, then `counter`, matching the
/// allocation order within each rank. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributedId {
    rank: i32,
    counter: u64,
}

impl DistributedId {
    /// Builds an id directly from its wire components. Used when
    /// deserializing ids received over the network; prefer `IdAllocator`
    /// for locally originated ids.
    pub const fn new(rank: i32, counter: u64) -> Self {
        Self { rank, counter }
    }

    /// The rank that allocated this id. Immutable for the id's lifetime.
    pub const fn rank(&self) -> i32 {
        self.rank
    }

    /// The per-rank allocation counter value.
    pub const fn counter(&self) -> u64 {
        self.counter
    }
}

impl PartialOrd for DistributedId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistributedId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

impl fmt::Display for DistributedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.rank, self.counter)
    }
}

/// Per-rank monotonic allocator. Every process owns one allocator per id
/// kind (nodes, edges) so that node and edge ids never collide even though
/// both are `DistributedId`s.
#[derive(Debug)]
pub struct IdAllocator {
    rank: i32,
    next_counter: u64,
}

impl IdAllocator {
    /// Creates an allocator for `rank`, starting counters at zero.
    pub const fn new(rank: i32) -> Self {
        Self {
            rank,
            next_counter: 0,
        }
    }

    /// Allocates the next id for this rank. Ids are never reused, even if
    /// the object they were attached to is later erased.
    pub fn allocate(&mut self) -> DistributedId {
        let id = DistributedId::new(self.rank, self.next_counter);
        self.next_counter += 1;
        id
    }

    /// The rank this allocator issues ids for.
    pub const fn rank(&self) -> i32 {
        self.rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_on_rank_then_counter() {
        let a = DistributedId::new(0, 5);
        let b = DistributedId::new(1, 0);
        let c = DistributedId::new(0, 6);
        assert!(a < b);
        assert!(a < c);
        assert!(c < b);
    }

    #[test]
    fn equality_and_hash_combine_both_fields() {
        use std::collections::HashSet;
        let a = DistributedId::new(2, 7);
        let b = DistributedId::new(2, 7);
        let c = DistributedId::new(7, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn allocator_never_reuses_counters() {
        let mut alloc = IdAllocator::new(3);
        let ids: Vec<_> = (0..5).map(|_| alloc.allocate()).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.rank(), 3);
            assert_eq!(id.counter(), i as u64);
        }
    }

    #[test]
    fn display_matches_bracketed_rank_counter_form() {
        let id = DistributedId::new(1, 42);
        assert_eq!(id.to_string(), "[1:42]");
    }
}
