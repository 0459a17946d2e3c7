//! Synchronization substrate shared by both sync modes: the location
//! manager (C6), optimistic ghost mode (C8), and hard readers/writers
//! mode with termination detection (C9).

pub mod error;
pub mod ghost;
pub mod hard;
pub mod location;

pub use error::{SyncError, SyncResult};
pub use ghost::{DataRefreshResponse, GhostDataSync, GhostLinker, LinkRecord};
pub use hard::{Color, HardSyncMode, HardSyncMutex};
pub use location::{LocationManager, LocationRecord};
