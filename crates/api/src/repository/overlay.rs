// Path: crates/api/src/repository/overlay.rs
//! A write-buffering overlay granting revert semantics over any repository.

use crate::repository::Repository;
use ember_types::core::AccountState;
use ember_types::error::StateError;
use ember_types::{Address, H256, U256};
use keccak_hash::keccak;
use std::collections::HashMap;

/// Buffered writes for a single account.
#[derive(Debug, Clone)]
struct AccountDiff {
    state: AccountState,
    code: Option<Vec<u8>>,
    storage: HashMap<H256, H256>,
    /// The account was deleted earlier in this scope; the parent's image
    /// must be wiped before this diff is folded down.
    wipe_first: bool,
}

/// One overlay entry: either a pending account image or a pending deletion.
#[derive(Debug, Clone)]
enum Entry {
    Live(AccountDiff),
    Deleted,
}

/// A tracked, write-buffering child of a repository.
///
/// Reads see this child's uncommitted writes over the parent. Writes land in
/// the overlay only; the parent is untouched until [`commit`] folds the
/// buffer down. Dropping the child without committing discards the buffer,
/// so rollback is the behavior on every exit path, panics included.
///
/// `TrackedRepository` is itself a [`Repository`], so tracking nests to any
/// depth.
///
/// [`commit`]: TrackedRepository::commit
pub struct TrackedRepository<'a> {
    base: &'a mut dyn Repository,
    writes: HashMap<Address, Entry>,
}

impl<'a> TrackedRepository<'a> {
    /// Open a tracked child over `base`, taking exclusive use of it for the
    /// child's lifetime.
    pub fn new(base: &'a mut dyn Repository) -> Self {
        TrackedRepository {
            base,
            writes: HashMap::new(),
        }
    }

    /// Fold every buffered write into the parent repository.
    pub fn commit(self) -> Result<(), StateError> {
        for (address, entry) in self.writes {
            match entry {
                Entry::Deleted => self.base.delete_account(&address)?,
                Entry::Live(diff) => {
                    if diff.wipe_first {
                        self.base.delete_account(&address)?;
                    }
                    self.base.update_account(&address, diff.state)?;
                    if let Some(code) = diff.code {
                        self.base.save_code(&address, code)?;
                    }
                    for (key, value) in diff.storage {
                        self.base.put_storage_word(&address, key, value)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Discard every buffered write. Equivalent to dropping the child; the
    /// explicit form reads better at call sites.
    pub fn rollback(self) {}

    /// The account image this child currently sees, overlay over parent.
    fn visible_account(&self, address: &Address) -> Result<Option<AccountState>, StateError> {
        match self.writes.get(address) {
            Some(Entry::Deleted) => Ok(None),
            Some(Entry::Live(diff)) => Ok(Some(diff.state.clone())),
            None => self.base.get_account(address),
        }
    }

    /// Fetch the diff slot for `address`, seeding it from the parent (or a
    /// fresh account) so a mutation can be applied.
    fn diff_mut(&mut self, address: &Address) -> Result<&mut AccountDiff, StateError> {
        if !matches!(self.writes.get(address), Some(Entry::Live(_))) {
            let (seed, wipe_first) = match self.writes.get(address) {
                Some(Entry::Deleted) => (AccountState::new(), true),
                _ => (self.base.get_account(address)?.unwrap_or_default(), false),
            };
            self.writes.insert(
                *address,
                Entry::Live(AccountDiff {
                    state: seed,
                    code: None,
                    storage: HashMap::new(),
                    wipe_first,
                }),
            );
        }
        match self.writes.get_mut(address) {
            Some(Entry::Live(diff)) => Ok(diff),
            _ => unreachable!("slot was just seeded"),
        }
    }
}

impl Repository for TrackedRepository<'_> {
    fn get_account(&self, address: &Address) -> Result<Option<AccountState>, StateError> {
        self.visible_account(address)
    }

    fn create_account(&mut self, address: &Address) -> Result<(), StateError> {
        let wipe_first = matches!(self.writes.get(address), Some(Entry::Deleted));
        self.writes.insert(
            *address,
            Entry::Live(AccountDiff {
                state: AccountState::new(),
                code: None,
                storage: HashMap::new(),
                wipe_first,
            }),
        );
        Ok(())
    }

    fn update_account(
        &mut self,
        address: &Address,
        state: AccountState,
    ) -> Result<(), StateError> {
        self.diff_mut(address)?.state = state;
        Ok(())
    }

    fn add_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError> {
        let diff = self.diff_mut(address)?;
        diff.state.balance = diff.state.balance + amount;
        Ok(diff.state.balance)
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError> {
        let diff = self.diff_mut(address)?;
        if diff.state.balance < amount {
            log::warn!(
                "[State] debit of {} clamped, account {} holds {}",
                amount,
                hex::encode(address),
                diff.state.balance
            );
        }
        diff.state.balance = diff.state.balance.saturating_sub(amount);
        Ok(diff.state.balance)
    }

    fn increase_nonce(&mut self, address: &Address) -> Result<U256, StateError> {
        let diff = self.diff_mut(address)?;
        diff.state.nonce = diff.state.nonce + U256::one();
        Ok(diff.state.nonce)
    }

    fn get_code(&self, address: &Address) -> Result<Option<Vec<u8>>, StateError> {
        match self.writes.get(address) {
            Some(Entry::Deleted) => Ok(None),
            Some(Entry::Live(diff)) => match &diff.code {
                Some(code) => Ok(Some(code.clone())),
                None if diff.wipe_first => Ok(None),
                None => self.base.get_code(address),
            },
            None => self.base.get_code(address),
        }
    }

    fn save_code(&mut self, address: &Address, code: Vec<u8>) -> Result<(), StateError> {
        let hash = keccak(&code);
        let diff = self.diff_mut(address)?;
        diff.state.code_hash = hash;
        diff.code = Some(code);
        Ok(())
    }

    fn get_storage_word(
        &self,
        address: &Address,
        key: H256,
    ) -> Result<Option<H256>, StateError> {
        match self.writes.get(address) {
            Some(Entry::Deleted) => Ok(None),
            Some(Entry::Live(diff)) => match diff.storage.get(&key) {
                Some(value) => Ok(Some(*value)),
                None if diff.wipe_first => Ok(None),
                None => self.base.get_storage_word(address, key),
            },
            None => self.base.get_storage_word(address, key),
        }
    }

    fn put_storage_word(
        &mut self,
        address: &Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateError> {
        self.diff_mut(address)?.storage.insert(key, value);
        Ok(())
    }

    fn delete_account(&mut self, address: &Address) -> Result<(), StateError> {
        self.writes.insert(*address, Entry::Deleted);
        Ok(())
    }

    fn world_state_root(&self) -> Result<H256, StateError> {
        // Buffered writes are invisible to the root until committed and
        // synced by the owning repository.
        self.base.world_state_root()
    }

    fn sync(&mut self) -> Result<(), StateError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), StateError> {
        Ok(())
    }
}
