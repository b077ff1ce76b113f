// Path: crates/types/src/core/mod.rs
//! Core ledger data structures: blocks, headers, transactions, accounts,
//! and the fork bookkeeping types used by the chain connector.

use crate::params::{GENESIS_DIFFICULTY, GENESIS_GAS_LIMIT};
use crate::{Address, H256, U256};
use keccak_hash::{keccak, KECCAK_EMPTY, KECCAK_NULL_RLP};
use rlp::RlpStream;
use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// An ECDSA signature over a transaction, in recoverable form.
///
/// Recovery of the signing address is a capability of the crypto
/// collaborator, not of this type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Recovery id.
    pub v: u8,
    /// First half of the signature.
    pub r: H256,
    /// Second half of the signature.
    pub s: H256,
}

/// A block header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockHeader {
    /// Hash of the parent block's header. Zero for genesis.
    pub parent_hash: H256,
    /// Height of this block; genesis is 0.
    pub number: u64,
    /// UNIX timestamp (seconds) the block was produced at.
    pub timestamp: u64,
    /// Difficulty target this header was sealed against.
    pub difficulty: U256,
    /// Gas expenditure cap for the block's transaction list.
    pub gas_limit: u64,
    /// Gas the block's transaction list actually consumed.
    pub gas_used: u64,
    /// World-state root after applying this block.
    pub state_root: H256,
    /// Recipient of the block reward and gas fees.
    pub coinbase: Address,
    /// Arbitrary producer payload, capped at 1024 bytes by validation.
    pub extra_data: Vec<u8>,
    /// Minimum gas price the producer accepted transactions at.
    pub min_gas_price: U256,
}

impl BlockHeader {
    /// Keccak digest of the RLP encoding of this header. This is the block
    /// hash referenced by child headers.
    pub fn hash(&self) -> H256 {
        keccak(rlp::encode(self))
    }

    /// Whether this is the genesis header.
    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    /// First six hex characters of the hash, for log lines.
    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash()[..3])
    }
}

/// A transaction: either a message call or a contract creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Sequence number of the sender account at signing time.
    pub nonce: U256,
    /// Price, in wei, the sender pays per unit of gas.
    pub gas_price: U256,
    /// Maximum gas the sender allows this transaction to consume.
    pub gas_limit: u64,
    /// Recipient address; absent for a contract creation.
    pub to: Option<Address>,
    /// Value, in wei, transferred to the recipient; may be absent.
    pub value: Option<U256>,
    /// Call data, or init code for a contract creation.
    pub data: Vec<u8>,
    /// Sender signature. Unsigned transactions never pass the executor's
    /// sender resolution.
    pub signature: Option<Signature>,
}

impl Transaction {
    /// A transaction with no recipient creates a contract.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Keccak digest of the RLP encoding, signature included when present.
    pub fn hash(&self) -> H256 {
        keccak(rlp::encode(self))
    }

    /// The address a contract creation deploys to, derived from the sender
    /// and the transaction nonce.
    pub fn contract_address(&self, sender: &Address) -> Address {
        let mut stream = RlpStream::new_list(2);
        stream.append(sender);
        stream.append(&self.nonce);
        let digest = keccak(stream.out());
        Address::from_slice(&digest[12..])
    }

    /// First six hex characters of the hash, for log lines.
    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash()[..3])
    }
}

impl rlp::Encodable for Transaction {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(if self.signature.is_some() { 9 } else { 6 });
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value.unwrap_or_default());
        stream.append(&self.data);
        if let Some(sig) = &self.signature {
            stream.append(&sig.v);
            stream.append(&sig.r);
            stream.append(&sig.s);
        }
    }
}

/// The persisted state of a single account.
///
/// Field order is the canonical RLP encoding order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct AccountState {
    /// Count of transactions sent from this account.
    pub nonce: U256,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage.
    pub storage_root: H256,
    /// Keccak digest of the account's code; `KECCAK_EMPTY` when there is none.
    pub code_hash: H256,
}

impl AccountState {
    /// A fresh account with zero nonce and balance and no code or storage.
    pub fn new() -> Self {
        AccountState {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }

    /// Whether the account has associated code.
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}

/// A block: header, ordered transaction list, and referenced uncle headers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions, in application order.
    pub transactions: Vec<Transaction>,
    /// Uncle headers attested by this block.
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    /// The block hash, i.e. the header hash.
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Height of this block.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Whether this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    /// Whether `child` names this block as its parent.
    pub fn is_parent_of(&self, child: &Block) -> bool {
        self.hash() == child.header.parent_hash
    }

    /// The difficulty this block contributes to a chain's total: its own
    /// header difficulty plus that of every referenced uncle.
    pub fn cumulative_difficulty(&self) -> U256 {
        self.uncles
            .iter()
            .fold(self.header.difficulty, |acc, u| acc + u.difficulty)
    }

    /// First six hex characters of the hash, for log lines.
    pub fn short_hash(&self) -> String {
        self.header.short_hash()
    }

    /// The protocol genesis block: number 0, zero parent digest, pinned
    /// gas limit and difficulty.
    pub fn genesis() -> Block {
        Block {
            header: BlockHeader {
                parent_hash: H256::zero(),
                number: 0,
                timestamp: 0,
                difficulty: U256::from(GENESIS_DIFFICULTY),
                gas_limit: GENESIS_GAS_LIMIT,
                gas_used: 0,
                state_root: KECCAK_NULL_RLP,
                coinbase: Address::zero(),
                extra_data: Vec::new(),
                min_gas_price: U256::zero(),
            },
            transactions: Vec::new(),
            uncles: Vec::new(),
        }
    }
}

/// A tentative fork: a lineage rooted at a block whose parent is on the
/// canonical chain, carrying its own total-difficulty accumulator.
#[derive(Debug, Clone)]
pub struct AltChain {
    blocks: Vec<Block>,
    total_difficulty: U256,
    reorg_signaled: bool,
}

impl AltChain {
    /// A new, empty alt chain seeded with the canonical total difficulty at
    /// the moment it branched off.
    pub fn new(seed_difficulty: U256) -> Self {
        AltChain {
            blocks: Vec::new(),
            total_difficulty: seed_difficulty,
            reorg_signaled: false,
        }
    }

    /// Accept `block` if it roots or extends this chain. Returns whether it
    /// was accepted; on acceptance the chain's total difficulty grows by the
    /// block's cumulative difficulty.
    pub fn try_connect(&mut self, block: Block) -> bool {
        let extends = match self.tip() {
            None => true,
            Some(tip) => tip.is_parent_of(&block),
        };
        if extends {
            self.total_difficulty = self.total_difficulty + block.cumulative_difficulty();
            self.blocks.push(block);
        }
        extends
    }

    /// The newest block of this chain, if any.
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Blocks of this chain, oldest first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Accumulated difficulty: the canonical total at the branch point plus
    /// every accepted block's cumulative difficulty.
    pub fn total_difficulty(&self) -> U256 {
        self.total_difficulty
    }

    /// Latch the one-shot reorg signal. Returns true only the first time.
    pub fn signal_reorg(&mut self) -> bool {
        !std::mem::replace(&mut self.reorg_signaled, true)
    }
}
