// Path: crates/api/src/wallet/mod.rs
//! Wallet integration, active unless the engine runs chain-only.

use ember_types::core::{Block, Transaction};

/// The node wallet's view of incoming blocks and their transactions.
pub trait Wallet: Send + Sync {
    /// Make the wallet aware of transactions about to be applied.
    fn add_transactions(&self, transactions: &[Transaction]);

    /// Drop transactions the network has confirmed from the pending set.
    fn remove_transactions(&self, transactions: &[Transaction]);

    /// Let the wallet scan an applied block for activity it tracks.
    fn process_block(&self, block: &Block);
}
