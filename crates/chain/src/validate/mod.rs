// Path: crates/chain/src/validate/mod.rs
//! Header and uncle validation.
//!
//! Verdicts are typed: `Ok(())` is "valid", and every failing check names
//! itself through [`BlockError`]. Checks never short-circuit to success;
//! a header is valid only once every rule has held.

use ember_api::consensus::SealVerifier;
use ember_api::storage::BlockStore;
use ember_types::core::{Block, BlockHeader};
use ember_types::error::BlockError;
use ember_types::params::{
    DIFFICULTY_BOUND_DIVISOR, DIFFICULTY_TARGET_PERIOD, FUTURE_TIMESTAMP_BOUND, MAX_EXTRA_DATA,
    MIN_DIFFICULTY, MIN_GAS_LIMIT,
};
use ember_types::U256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Widest allowed generation gap between a block and an uncle's parent.
const UNCLE_GENERATION_WINDOW: std::ops::RangeInclusive<i64> = 2..=7;
/// Allowed distance between a block's number and an uncle's number.
const UNCLE_NUMBER_WINDOW: std::ops::RangeInclusive<i64> = 1..=6;

/// The difficulty demanded of a child sealed at `timestamp` on top of
/// `parent`.
///
/// This rule enforces a homeostasis in the time between blocks: a period
/// under the target raises difficulty by one adjustment step, a period over
/// it lowers difficulty by one step, floored at the protocol minimum.
pub fn expected_difficulty(parent: &BlockHeader, timestamp: u64) -> U256 {
    let step = parent.difficulty / U256::from(DIFFICULTY_BOUND_DIVISOR);
    if timestamp < parent.timestamp + DIFFICULTY_TARGET_PERIOD {
        parent.difficulty + step
    } else {
        let lowered = parent.difficulty.saturating_sub(step);
        lowered.max(U256::from(MIN_DIFFICULTY))
    }
}

/// The gas limit demanded of a child of `parent`: a 1/1024 exponential decay
/// towards 6/5 of the parent's actual usage, floored at the protocol
/// minimum. Integer arithmetic, truncating.
pub fn expected_gas_limit(parent: &BlockHeader) -> u64 {
    let decayed = (u128::from(parent.gas_limit) * 1023 + u128::from(parent.gas_used) * 6 / 5)
        / u128::from(DIFFICULTY_BOUND_DIVISOR);
    MIN_GAS_LIMIT.max(decayed as u64)
}

/// Seconds since the UNIX epoch.
fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validates headers and uncle lists against the stored chain.
pub struct BlockValidator {
    block_store: Arc<dyn BlockStore>,
    seal: Arc<dyn SealVerifier>,
}

impl BlockValidator {
    /// A validator reading ancestry from `block_store` and delegating
    /// proof-of-work checks to `seal`.
    pub fn new(block_store: Arc<dyn BlockStore>, seal: Arc<dyn SealVerifier>) -> Self {
        BlockValidator { block_store, seal }
    }

    /// Validate a single header against its stored parent.
    pub fn validate_header(&self, header: &BlockHeader) -> Result<(), BlockError> {
        let parent = self
            .block_store
            .get_by_hash(&header.parent_hash)
            .ok_or(BlockError::UnknownParent(header.parent_hash))?;
        let parent = &parent.header;

        let difficulty = expected_difficulty(parent, header.timestamp);
        if header.difficulty != difficulty {
            return Err(BlockError::InvalidDifficulty {
                expected: difficulty,
                actual: header.difficulty,
            });
        }

        let gas_limit = expected_gas_limit(parent);
        if header.gas_limit != gas_limit {
            return Err(BlockError::InvalidGasLimit {
                expected: gas_limit,
                actual: header.gas_limit,
            });
        }

        if header.timestamp <= parent.timestamp {
            return Err(BlockError::TimestampNotAfterParent {
                parent: parent.timestamp,
                actual: header.timestamp,
            });
        }
        let bound = now() + FUTURE_TIMESTAMP_BOUND;
        if header.timestamp >= bound {
            return Err(BlockError::TimestampTooFarInFuture {
                bound,
                actual: header.timestamp,
            });
        }

        if header.extra_data.len() > MAX_EXTRA_DATA {
            return Err(BlockError::ExtraDataTooLong(header.extra_data.len()));
        }

        if !self.seal.verify_seal(header) {
            return Err(BlockError::InvalidSeal);
        }

        Ok(())
    }

    /// Validate a full block: its header plus every referenced uncle.
    /// The genesis block is valid by definition.
    pub fn validate_block(&self, block: &Block) -> Result<(), BlockError> {
        if block.is_genesis() {
            return Ok(());
        }

        self.validate_header(&block.header)?;

        for uncle in &block.uncles {
            self.validate_uncle(block, uncle)?;
        }
        Ok(())
    }

    fn validate_uncle(&self, block: &Block, uncle: &BlockHeader) -> Result<(), BlockError> {
        // an uncle must be a valid header in its own right, though not
        // necessarily a valid block
        self.validate_header(uncle)?;

        let uncle_parent = self
            .block_store
            .get_by_hash(&uncle.parent_hash)
            .ok_or(BlockError::UnknownParent(uncle.parent_hash))?;

        let generation_gap = block.number() as i64 - uncle_parent.number() as i64;
        if !UNCLE_GENERATION_WINDOW.contains(&generation_gap) {
            return Err(BlockError::UncleGenerationGap(generation_gap));
        }

        let number_gap = block.number() as i64 - uncle.number as i64;
        if !UNCLE_NUMBER_WINDOW.contains(&number_gap) {
            return Err(BlockError::UncleNumberGap(number_gap));
        }

        // walk the ancestors inside the window; a header already referenced
        // there cannot be referenced again
        let uncle_hash = uncle.hash();
        let mut cursor = block.header.parent_hash;
        for _ in 0..*UNCLE_NUMBER_WINDOW.end() {
            let Some(ancestor) = self.block_store.get_by_hash(&cursor) else {
                break;
            };
            if ancestor.uncles.iter().any(|u| u.hash() == uncle_hash) {
                return Err(BlockError::DuplicateUncle(uncle_hash));
            }
            if ancestor.is_genesis() {
                break;
            }
            cursor = ancestor.header.parent_hash;
        }

        Ok(())
    }
}
