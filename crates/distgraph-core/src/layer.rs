//! Layer identifiers.
//!
//! Negative layers are reserved for the spatial subsystem (out of scope
//! here); non-negative layers are user-defined.

/// An integer key partitioning a node's edges into independent adjacency
/// lists. The same pair of nodes may be linked on several distinct layers.
pub type LayerId = i32;

/// Layers at or below this value are reserved and must not be used by
/// callers of `distgraph`'s public API.
pub const RESERVED_LAYER_CEILING: LayerId = -1;

/// True if `layer` falls in the range reserved for internal/spatial use.
pub const fn is_reserved_layer(layer: LayerId) -> bool {
    layer <= RESERVED_LAYER_CEILING
}
