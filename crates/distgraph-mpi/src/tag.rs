//! The reserved MPI tag namespace and the termination-epoch bit.
//!
//! Every message tag used by `distgraph-sync` is one of the variants
//! below, offset by the sender's current `Epoch` base. Offsetting (rather
//! than OR-ing a bit into the low end of the tag, as the historical
//! reference implementation did) keeps the arithmetic readable and avoids
//! ambiguity if a future tag ever needed more than 4 bits of its own.

/// A reserved message kind. The numeric value plus an `Epoch` base forms
/// the actual MPI tag used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageTag {
    Link = 0,
    Unlink = 1,
    RemoveNode = 2,
    Read = 3,
    ReadResponse = 4,
    Acquire = 5,
    AcquireResponse = 6,
    ReleaseAcquire = 7,
    Lock = 8,
    LockResponse = 9,
    LockShared = 10,
    UnlockShared = 11,
    Token = 12,
    End = 13,
    Migration = 14,
    GhostDataRequest = 15,
    GhostDataResponse = 16,
    LocationUpdate = 17,
}

impl MessageTag {
    pub const fn base(self) -> i32 {
        self as i32
    }
}

/// A termination round's parity. Packed into the high bits of every MPI
/// tag so that a message sent in one epoch can never be mistaken for a
/// message belonging to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Epoch {
    #[default]
    Even,
    Odd,
}

impl Epoch {
    const EVEN_BASE: i32 = 0x00;
    const ODD_BASE: i32 = 0x100;

    pub const fn offset(self) -> i32 {
        match self {
            Epoch::Even => Self::EVEN_BASE,
            Epoch::Odd => Self::ODD_BASE,
        }
    }

    /// Flips the epoch, as rank 0 does after a successful termination
    /// round.
    pub fn flipped(self) -> Self {
        match self {
            Epoch::Even => Epoch::Odd,
            Epoch::Odd => Epoch::Even,
        }
    }

    /// Combines a message kind with this epoch into a concrete wire tag.
    pub const fn tag(self, kind: MessageTag) -> i32 {
        self.offset() + kind.base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_and_odd_epoch_tags_never_collide() {
        for kind in [
            MessageTag::Read,
            MessageTag::Acquire,
            MessageTag::Token,
            MessageTag::End,
        ] {
            assert_ne!(Epoch::Even.tag(kind), Epoch::Odd.tag(kind));
        }
    }

    #[test]
    fn flipping_epoch_twice_returns_to_start() {
        assert_eq!(Epoch::Even.flipped().flipped(), Epoch::Even);
    }
}
