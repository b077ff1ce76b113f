// Path: crates/api/src/vm/mod.rs
//! The virtual machine boundary.
//!
//! The opcode interpreter is an external collaborator. The executor builds a
//! [`ProgramInvoke`] from the transaction and its enclosing block, hands it
//! to [`Vm::play`] together with a tracked repository child, and branches on
//! the returned [`ProgramOutcome`].

use crate::repository::Repository;
use ember_types::core::{Block, Transaction};
use ember_types::{Address, H256, U256};

/// Everything a program run can observe about its invocation: the message
/// that triggered it and the environment of the enclosing block.
#[derive(Debug, Clone)]
pub struct ProgramInvoke {
    /// Account whose code is running; for a creation, the new contract.
    pub owner: Address,
    /// Original transaction sender.
    pub origin: Address,
    /// Direct caller; equals `origin` at transaction depth.
    pub caller: Address,
    /// Balance of `owner` at invocation.
    pub balance: U256,
    /// Gas available to the run.
    pub gas: u64,
    /// Price the sender pays per gas unit.
    pub gas_price: U256,
    /// Value attached to the message.
    pub value: U256,
    /// Call data; empty for a creation, whose payload is the init code.
    pub data: Vec<u8>,
    /// Code to run: the callee's stored code, or init code for a creation.
    pub code: Vec<u8>,
    /// Hash of the enclosing block's parent.
    pub parent_hash: H256,
    /// Coinbase of the enclosing block.
    pub block_coinbase: Address,
    /// Timestamp of the enclosing block.
    pub block_timestamp: u64,
    /// Number of the enclosing block.
    pub block_number: u64,
    /// Difficulty of the enclosing block.
    pub block_difficulty: U256,
    /// Gas limit of the enclosing block.
    pub block_gas_limit: u64,
}

impl ProgramInvoke {
    /// Assemble an invocation context from a transaction, its enclosing
    /// block, the resolved code, and the executor's view of the parties.
    pub fn from_transaction(
        tx: &Transaction,
        block: &Block,
        code: Vec<u8>,
        sender: Address,
        receiver: Address,
        receiver_balance: U256,
    ) -> Self {
        ProgramInvoke {
            owner: receiver,
            origin: sender,
            caller: sender,
            balance: receiver_balance,
            gas: tx.gas_limit,
            gas_price: tx.gas_price,
            value: tx.value.unwrap_or_default(),
            data: if tx.is_contract_creation() {
                Vec::new()
            } else {
                tx.data.clone()
            },
            code,
            parent_hash: block.header.parent_hash,
            block_coinbase: block.header.coinbase,
            block_timestamp: block.header.timestamp,
            block_number: block.header.number,
            block_difficulty: block.header.difficulty,
            block_gas_limit: block.header.gas_limit,
        }
    }
}

/// How a program run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOutcome {
    /// The program ran to completion.
    Halt {
        /// Gas the run consumed.
        gas_used: u64,
        /// Bytes the program returned; for a creation this is the contract
        /// body code to persist.
        return_bytes: Vec<u8>,
        /// Accounts the program marked for self-destruction.
        delete_accounts: Vec<Address>,
    },
    /// The program exhausted its gas allowance.
    OutOfGas {
        /// Gas consumed before the halt; informational, the executor
        /// charges the full allowance.
        gas_used: u64,
    },
    /// The program faulted (bad jump, stack underflow, and so on).
    RuntimeFailure,
}

/// A stack-based virtual machine executing contract code against a tracked
/// repository child. Any state the program writes lands in `state` and is
/// committed or rolled back by the executor based on the outcome.
pub trait Vm: Send + Sync {
    /// Run `invoke` to an outcome.
    fn play(&self, invoke: &ProgramInvoke, state: &mut dyn Repository) -> ProgramOutcome;
}
