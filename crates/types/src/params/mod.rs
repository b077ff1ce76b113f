// Path: crates/types/src/params/mod.rs
//! Protocol parameters of the chain.
//!
//! Everything here is a fixed constant of the protocol; none of these are
//! runtime-configurable. Reward values are expressed in wei and fit in a
//! `u64`; convert with `U256::from` at the call site.

/// The minimum limit of gas expenditure per block.
pub const MIN_GAS_LIMIT: u64 = 125_000;

/// The gas limit pinned to the genesis block.
pub const GENESIS_GAS_LIMIT: u64 = 1_000_000;

/// One szabo, in wei.
pub const SZABO: u64 = 1_000_000_000_000;

/// The floor gas price assumed while the head is still the genesis block,
/// so that a zeroed genesis `min_gas_price` never reaches the wallet.
pub const INITIAL_MIN_GAS_PRICE: u64 = 10 * SZABO;

/// An alt chain whose total difficulty exceeds the canonical chain's by more
/// than this many difficulty units signals a reorg.
pub const REORG_THRESHOLD: u64 = 5_000;

/// Hard cap on buffered orphan blocks before a full resync is triggered.
pub const GARBAGE_LIMIT: usize = 20;

/// Maximum length of a header's extra-data field, in bytes.
pub const MAX_EXTRA_DATA: usize = 1024;

/// Upper bound on how far a header timestamp may sit in the future.
pub const FUTURE_TIMESTAMP_BOUND: u64 = 900;

/// Base gas charged for any transaction that runs no code.
pub const GAS_TRANSACTION: u64 = 21_000;

/// Gas charged per byte of transaction data on the no-code path.
pub const GAS_TXDATA: u64 = 5;

/// Reward credited to the coinbase of every applied block, in wei.
pub const BLOCK_REWARD: u64 = 1_500_000_000_000_000_000;

/// Reward credited to the coinbase of a referenced uncle header, in wei.
/// 15/16 of the block reward.
pub const UNCLE_REWARD: u64 = BLOCK_REWARD / 16 * 15;

/// Extra reward credited to the including coinbase per referenced uncle,
/// in wei. 1/32 of the block reward.
pub const INCLUSION_REWARD: u64 = BLOCK_REWARD / 32;

/// Difficulty of the genesis block.
pub const GENESIS_DIFFICULTY: u64 = 1 << 22;

/// Floor below which the difficulty adjustment never drops.
pub const MIN_DIFFICULTY: u64 = 1 << 17;

/// Divisor of the per-block difficulty adjustment step.
pub const DIFFICULTY_BOUND_DIVISOR: u64 = 1024;

/// Inter-block period, in seconds, that the difficulty adjustment steers
/// towards. A shorter observed period raises difficulty, a longer one
/// lowers it.
pub const DIFFICULTY_TARGET_PERIOD: u64 = 13;
