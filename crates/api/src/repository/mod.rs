// Path: crates/api/src/repository/mod.rs
//! The world-state repository contract.
//!
//! The repository is the engine's view of the account trie: a keyed store of
//! [`AccountState`] entries plus per-account code and storage words. The
//! backing trie is an external collaborator; the engine depends only on this
//! trait and on the nested write-buffering of [`TrackedRepository`].

use ember_types::core::AccountState;
use ember_types::error::StateError;
use ember_types::{Address, H256, U256};

mod overlay;

pub use overlay::TrackedRepository;

/// Mutable access to the world state.
///
/// Balances and nonces are unsigned; no operation may drive a balance below
/// zero, and callers are expected to check affordability before debiting.
/// Implementations may be backed by a trie, a flat map, or an overlay on
/// another repository.
pub trait Repository {
    /// Look up the state of an account, `None` if it does not exist.
    fn get_account(&self, address: &Address) -> Result<Option<AccountState>, StateError>;

    /// Create a fresh, empty account at `address`, replacing any existing one.
    fn create_account(&mut self, address: &Address) -> Result<(), StateError>;

    /// Overwrite the full state of the account at `address`, creating it if
    /// needed. This is the primitive a tracked child folds its buffer through.
    fn update_account(&mut self, address: &Address, state: AccountState)
        -> Result<(), StateError>;

    /// Credit `amount` to the account, creating it on first credit.
    /// Returns the new balance.
    fn add_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError>;

    /// Debit `amount` from the account. The caller must have checked
    /// affordability; a shortfall clamps at zero. Returns the new balance.
    fn sub_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError>;

    /// Increment the account nonce, creating the account if needed.
    /// Returns the new nonce.
    fn increase_nonce(&mut self, address: &Address) -> Result<U256, StateError>;

    /// The code bound to the account, `None` if there is none.
    fn get_code(&self, address: &Address) -> Result<Option<Vec<u8>>, StateError>;

    /// Persist `code` under its digest and bind the account to it.
    fn save_code(&mut self, address: &Address, code: Vec<u8>) -> Result<(), StateError>;

    /// Read one 32-byte storage word of the account.
    fn get_storage_word(&self, address: &Address, key: H256)
        -> Result<Option<H256>, StateError>;

    /// Write one 32-byte storage word of the account.
    fn put_storage_word(
        &mut self,
        address: &Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateError>;

    /// Remove the account entirely (self-destruct).
    fn delete_account(&mut self, address: &Address) -> Result<(), StateError>;

    /// The current world-state root. Only meaningful after [`sync`].
    ///
    /// [`sync`]: Repository::sync
    fn world_state_root(&self) -> Result<H256, StateError>;

    /// Flush pending writes to the backing store and recompute the
    /// world-state root.
    fn sync(&mut self) -> Result<(), StateError>;

    /// Release the backing store. Further use is an error.
    fn close(&mut self) -> Result<(), StateError>;
}
