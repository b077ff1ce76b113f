// Path: crates/api/src/net/mod.rs
//! Read-only queries against the peer channel manager.

/// The peer layer's aggregate sync state, consulted when deciding whether
/// the one-shot sync-done event may fire.
pub trait ChannelManager: Send + Sync {
    /// Whether every active peer channel has finished syncing.
    fn is_all_sync(&self) -> bool;
}
