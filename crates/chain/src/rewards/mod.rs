// Path: crates/chain/src/rewards/mod.rs
//! Block and uncle coinbase crediting.

use ember_api::repository::Repository;
use ember_types::core::Block;
use ember_types::error::StateError;
use ember_types::params::{BLOCK_REWARD, INCLUSION_REWARD, UNCLE_REWARD};
use ember_types::U256;

/// Credit the rewards of a valid, non-genesis block.
///
/// The block coinbase receives the block reward plus an inclusion bonus per
/// referenced uncle; each uncle's own coinbase receives the uncle reward.
/// Accounts are created on first credit.
pub fn distribute(repo: &mut dyn Repository, block: &Block) -> Result<(), StateError> {
    if repo.get_account(&block.header.coinbase)?.is_none() {
        repo.create_account(&block.header.coinbase)?;
    }

    let mut total = U256::from(BLOCK_REWARD);
    for uncle in &block.uncles {
        repo.add_balance(&uncle.coinbase, U256::from(UNCLE_REWARD))?;
        total = total + U256::from(INCLUSION_REWARD);
    }
    repo.add_balance(&block.header.coinbase, total)?;
    Ok(())
}
