// Path: crates/types/src/error/mod.rs
//! Core error types for the ember engine.

use crate::{H256, U256};
use thiserror::Error;

/// Errors raised by a world-state repository backend.
#[derive(Error, Debug)]
pub enum StateError {
    /// An error occurred in the state backend.
    #[error("state backend error: {0}")]
    Backend(String),
    /// The repository has been closed and can no longer be used.
    #[error("repository is closed")]
    Closed,
    /// A stored value could not be decoded.
    #[error("corrupt state entry: {0}")]
    Corrupt(String),
}

/// Reasons a block fails validation and is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The header difficulty does not match the adjustment rule.
    #[error("difficulty mismatch: expected {expected}, header carries {actual}")]
    InvalidDifficulty {
        /// Difficulty demanded by the adjustment rule.
        expected: U256,
        /// Difficulty the header carries.
        actual: U256,
    },
    /// The header gas limit does not follow from the parent.
    #[error("gas limit mismatch: expected {expected}, header carries {actual}")]
    InvalidGasLimit {
        /// Gas limit demanded by the feedback formula.
        expected: u64,
        /// Gas limit the header carries.
        actual: u64,
    },
    /// The header timestamp is not strictly after its parent's.
    #[error("timestamp {actual} is not after parent timestamp {parent}")]
    TimestampNotAfterParent {
        /// Timestamp of the parent header.
        parent: u64,
        /// Timestamp the header carries.
        actual: u64,
    },
    /// The header timestamp is too far in the future.
    #[error("timestamp {actual} is beyond the future bound {bound}")]
    TimestampTooFarInFuture {
        /// Latest acceptable timestamp at validation time.
        bound: u64,
        /// Timestamp the header carries.
        actual: u64,
    },
    /// The header extra-data field exceeds the protocol cap.
    #[error("extra data of {0} bytes exceeds the cap")]
    ExtraDataTooLong(usize),
    /// The proof-of-work seal did not verify.
    #[error("invalid proof-of-work seal")]
    InvalidSeal,
    /// The parent of a header is not known to the block store.
    #[error("unknown parent {0:#x}")]
    UnknownParent(H256),
    /// An uncle's parent is not an ancestor of the right generation.
    #[error("uncle generation gap {0} outside 2..=7")]
    UncleGenerationGap(i64),
    /// An uncle's own number sits outside the allowed window.
    #[error("uncle number gap {0} outside 1..=6")]
    UncleNumberGap(i64),
    /// The same uncle is already referenced by an ancestor in the window.
    #[error("uncle {0:#x} already included by an ancestor")]
    DuplicateUncle(H256),
    /// The summed gas of the block's transactions exceeds its gas limit.
    #[error("block used {used} gas, over its limit of {limit}")]
    GasLimitExceeded {
        /// Gas consumed by the ordered transaction list.
        used: u64,
        /// Gas limit the header carries.
        limit: u64,
    },
}

/// Engine-level errors surfaced by block import.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The block failed validation or application.
    #[error("invalid block: {0}")]
    Block(#[from] BlockError),
    /// The repository backend failed.
    #[error("state error: {0}")]
    State(#[from] StateError),
}
