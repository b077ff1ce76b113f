// Path: crates/types/src/config/mod.rs
//! Runtime configuration for the engine.

use serde::{Deserialize, Serialize};

/// Engine configuration, typically deserialized from the node's config file.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// First block number to emit detailed state traces for; `-1` disables
    /// tracing entirely.
    pub trace_start_block: i64,
    /// When set, the engine maintains chain state only: wallet integration
    /// is skipped.
    pub block_chain_only: bool,
    /// When cleared, contract code is not executed; transactions carrying
    /// code are treated as empty successful runs. Useful for fast resyncs.
    pub play_vm: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trace_start_block: -1,
            block_chain_only: false,
            play_vm: true,
        }
    }
}

impl EngineConfig {
    /// Whether detailed tracing is enabled for a block at `number`.
    pub fn tracing(&self, number: u64) -> bool {
        self.trace_start_block != -1 && number >= self.trace_start_block as u64
    }
}
