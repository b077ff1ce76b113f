// Path: crates/api/src/crypto/mod.rs
//! Signature primitives boundary.

use ember_types::core::Transaction;
use ember_types::Address;

/// Recovers the signing address of a transaction.
///
/// The curve arithmetic lives outside the engine; the executor only needs
/// the recovered address, or `None` when the signature is absent or invalid.
pub trait SenderRecovery: Send + Sync {
    /// The address that signed `tx`, if recoverable.
    fn recover_sender(&self, tx: &Transaction) -> Option<Address>;
}
