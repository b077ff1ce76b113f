// Path: crates/api/src/listener/mod.rs
//! The engine's fire-and-forget event sink.

use ember_types::core::Block;

/// Receives engine events. Nothing a listener does can influence the engine;
/// all methods are fire-and-forget.
pub trait Listener: Send + Sync {
    /// A block was applied and became the new head.
    fn on_block(&self, block: &Block);

    /// The initial sync completed: the queue drained while every peer
    /// channel reported synced. Fired at most once per engine lifetime.
    fn on_sync_done(&self);

    /// A free-form trace line, used for state dumps and progress messages.
    fn trace(&self, message: &str);
}
