// Path: crates/api/src/storage/mod.rs
//! Block persistence and the inbound block queue.

use ember_types::core::Block;
use ember_types::H256;

/// Durable block storage, keyed by hash and by number.
///
/// Shared with external collaborators; implementations are expected to be
/// thread-safe behind `&self`.
pub trait BlockStore: Send + Sync {
    /// The block with the given hash, if stored.
    fn get_by_hash(&self, hash: &H256) -> Option<Block>;

    /// The canonical block at the given height, if stored.
    fn get_by_number(&self, number: u64) -> Option<Block>;

    /// Up to `qty` block hashes walking back from `hash`, inclusive.
    fn hashes_starting_from(&self, hash: &H256, qty: usize) -> Vec<H256>;

    /// Persist a block.
    fn save_block(&self, block: &Block);

    /// Drop all stored blocks.
    fn reset(&self);
}

/// The inbound queue the peer layer feeds candidate blocks through.
///
/// The producer side is external; the engine only observes and drains it.
pub trait BlockQueue: Send + Sync {
    /// Number of blocks still waiting to be connected.
    fn size(&self) -> usize;

    /// Drop every queued block.
    fn clear(&self);

    /// Shut the queue down.
    fn close(&self);
}
