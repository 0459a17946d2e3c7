//! Caller-supplied runtime configuration.
//!
//! The core never reads files or environment variables itself (CLI/config
//! loading is out of scope); callers build or deserialize a `RuntimeConfig`
//! themselves and pass it to `MpiContext`/`DistributedGraph` construction.

use serde::{Deserialize, Serialize};

/// Which synchronization mode governs ghost-node consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncMode {
    /// Optimistic, epoch-based bulk refresh (see `distgraph_sync::ghost`).
    #[default]
    Ghost,
    /// Per-object readers/writers with termination detection (see
    /// `distgraph_sync::hard`).
    Hard,
}

/// Top-level configuration accepted by `distgraph`'s orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Active synchronization mode.
    pub sync_mode: SyncMode,
    /// Timeout, in milliseconds, that the hard-sync reception pump uses
    /// between polling passes. Not a cancellation timeout (none is
    /// supported); purely a CPU-yield hint.
    pub pump_poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            pump_poll_interval_ms: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_ghost_mode() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.sync_mode, SyncMode::Ghost);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = RuntimeConfig {
            sync_mode: SyncMode::Hard,
            pump_poll_interval_ms: 5,
        };
        let s = serde_json::to_string(&cfg).unwrap();
        let back: RuntimeConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back.sync_mode, SyncMode::Hard);
    }
}
