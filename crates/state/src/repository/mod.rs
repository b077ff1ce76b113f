// Path: crates/state/src/repository/mod.rs
//! In-memory repository implementation.

use ember_api::repository::Repository;
use ember_types::core::AccountState;
use ember_types::error::StateError;
use ember_types::{Address, H256, U256};
use keccak_hash::{keccak, KECCAK_EMPTY, KECCAK_NULL_RLP};
use rlp::RlpStream;
use std::collections::{BTreeMap, HashMap};

/// A flat, in-memory world state.
///
/// Accounts, code, and storage live in plain maps; [`sync`] recomputes the
/// per-account storage roots and the world-state root from scratch. Code is
/// content-addressed by its keccak digest, so deleting an account never
/// orphan-corrupts another account bound to the same code.
///
/// [`sync`]: Repository::sync
pub struct WorldRepository {
    accounts: HashMap<Address, AccountState>,
    code: HashMap<H256, Vec<u8>>,
    storage: HashMap<Address, HashMap<H256, H256>>,
    root: H256,
    closed: bool,
}

impl WorldRepository {
    /// An open, empty repository. The root starts at the empty commitment.
    pub fn new() -> Self {
        WorldRepository {
            accounts: HashMap::new(),
            code: HashMap::new(),
            storage: HashMap::new(),
            root: KECCAK_NULL_RLP,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), StateError> {
        if self.closed {
            Err(StateError::Closed)
        } else {
            Ok(())
        }
    }

    fn account_mut(&mut self, address: &Address) -> &mut AccountState {
        self.accounts.entry(*address).or_default()
    }

    /// Commitment over one account's storage: keccak of the sorted
    /// key/value list, or the empty commitment for no storage.
    fn storage_root(words: &HashMap<H256, H256>) -> H256 {
        if words.is_empty() {
            return KECCAK_NULL_RLP;
        }
        let sorted: BTreeMap<&H256, &H256> = words.iter().collect();
        let mut stream = RlpStream::new_list(sorted.len());
        for (key, value) in sorted {
            let mut pair = RlpStream::new_list(2);
            pair.append(key);
            pair.append(value);
            stream.append_raw(&pair.out(), 1);
        }
        keccak(stream.out())
    }
}

impl Default for WorldRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for WorldRepository {
    fn get_account(&self, address: &Address) -> Result<Option<AccountState>, StateError> {
        self.ensure_open()?;
        Ok(self.accounts.get(address).cloned())
    }

    fn create_account(&mut self, address: &Address) -> Result<(), StateError> {
        self.ensure_open()?;
        self.accounts.insert(*address, AccountState::new());
        self.storage.remove(address);
        Ok(())
    }

    fn update_account(
        &mut self,
        address: &Address,
        state: AccountState,
    ) -> Result<(), StateError> {
        self.ensure_open()?;
        self.accounts.insert(*address, state);
        Ok(())
    }

    fn add_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError> {
        self.ensure_open()?;
        let account = self.account_mut(address);
        account.balance = account.balance + amount;
        Ok(account.balance)
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) -> Result<U256, StateError> {
        self.ensure_open()?;
        let account = self.account_mut(address);
        if account.balance < amount {
            log::warn!(
                "[State] debit of {} clamped, account {} holds {}",
                amount,
                hex::encode(address),
                account.balance
            );
        }
        account.balance = account.balance.saturating_sub(amount);
        Ok(account.balance)
    }

    fn increase_nonce(&mut self, address: &Address) -> Result<U256, StateError> {
        self.ensure_open()?;
        let account = self.account_mut(address);
        account.nonce = account.nonce + U256::one();
        Ok(account.nonce)
    }

    fn get_code(&self, address: &Address) -> Result<Option<Vec<u8>>, StateError> {
        self.ensure_open()?;
        let Some(account) = self.accounts.get(address) else {
            return Ok(None);
        };
        if account.code_hash == KECCAK_EMPTY {
            return Ok(None);
        }
        Ok(self.code.get(&account.code_hash).cloned())
    }

    fn save_code(&mut self, address: &Address, code: Vec<u8>) -> Result<(), StateError> {
        self.ensure_open()?;
        let hash = keccak(&code);
        self.code.insert(hash, code);
        self.account_mut(address).code_hash = hash;
        Ok(())
    }

    fn get_storage_word(
        &self,
        address: &Address,
        key: H256,
    ) -> Result<Option<H256>, StateError> {
        self.ensure_open()?;
        Ok(self
            .storage
            .get(address)
            .and_then(|words| words.get(&key))
            .copied())
    }

    fn put_storage_word(
        &mut self,
        address: &Address,
        key: H256,
        value: H256,
    ) -> Result<(), StateError> {
        self.ensure_open()?;
        self.account_mut(address);
        self.storage.entry(*address).or_default().insert(key, value);
        Ok(())
    }

    fn delete_account(&mut self, address: &Address) -> Result<(), StateError> {
        self.ensure_open()?;
        self.accounts.remove(address);
        self.storage.remove(address);
        Ok(())
    }

    fn world_state_root(&self) -> Result<H256, StateError> {
        self.ensure_open()?;
        Ok(self.root)
    }

    fn sync(&mut self) -> Result<(), StateError> {
        self.ensure_open()?;
        for (address, account) in &mut self.accounts {
            account.storage_root = match self.storage.get(address) {
                Some(words) => Self::storage_root(words),
                None => KECCAK_NULL_RLP,
            };
        }
        if self.accounts.is_empty() {
            self.root = KECCAK_NULL_RLP;
            return Ok(());
        }
        let sorted: BTreeMap<&Address, &AccountState> = self.accounts.iter().collect();
        let mut stream = RlpStream::new_list(sorted.len());
        for (address, account) in sorted {
            let mut pair = RlpStream::new_list(2);
            pair.append(address);
            pair.append(account);
            stream.append_raw(&pair.out(), 1);
        }
        self.root = keccak(stream.out());
        Ok(())
    }

    fn close(&mut self) -> Result<(), StateError> {
        self.closed = true;
        self.accounts.clear();
        self.code.clear();
        self.storage.clear();
        Ok(())
    }
}
