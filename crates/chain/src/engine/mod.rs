// Path: crates/chain/src/engine/mod.rs
//! The chain connector and block applier.
//!
//! [`Engine`] owns the canonical head and routes every incoming block:
//! extensions of the head are validated and applied, known-parent siblings
//! root alt chains, alt-chain extensions accumulate difficulty towards a
//! reorg signal, and orphans buffer until a flood forces a resync. Block
//! application is a serial critical section; the repository is exclusively
//! owned for its duration.

use crate::executor::TransactionExecutor;
use crate::rewards;
use crate::validate::BlockValidator;
use ember_api::consensus::SealVerifier;
use ember_api::crypto::SenderRecovery;
use ember_api::listener::Listener;
use ember_api::net::ChannelManager;
use ember_api::repository::{Repository, TrackedRepository};
use ember_api::storage::{BlockQueue, BlockStore};
use ember_api::vm::Vm;
use ember_api::wallet::Wallet;
use ember_types::config::EngineConfig;
use ember_types::core::{AltChain, Block};
use ember_types::error::{BlockError, ChainError, StateError};
use ember_types::params::{GARBAGE_LIMIT, INITIAL_MIN_GAS_PRICE, REORG_THRESHOLD};
use ember_types::{H256, U256};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Builds a fresh repository when the engine must discard its current one.
pub type RepositoryFactory = Box<dyn Fn() -> Box<dyn Repository> + Send + Sync>;

/// Every collaborator the engine is constructed over. All of them are
/// interface-typed; nothing here is engine-owned logic.
pub struct Collaborators {
    /// The world-state repository, exclusively owned by the engine.
    pub repository: Box<dyn Repository>,
    /// Recreates the repository after an orphan-flood resync.
    pub repository_factory: RepositoryFactory,
    /// Durable block storage.
    pub block_store: Arc<dyn BlockStore>,
    /// The inbound candidate-block queue.
    pub block_queue: Arc<dyn BlockQueue>,
    /// Peer sync state, for the one-shot sync-done event.
    pub channel_manager: Arc<dyn ChannelManager>,
    /// Event sink.
    pub listener: Arc<dyn Listener>,
    /// Node wallet, consulted unless the engine runs chain-only.
    pub wallet: Arc<dyn Wallet>,
    /// Contract code interpreter.
    pub vm: Arc<dyn Vm>,
    /// Transaction sender recovery.
    pub recovery: Arc<dyn SenderRecovery>,
    /// Proof-of-work seal verification.
    pub seal: Arc<dyn SealVerifier>,
}

/// Where an incoming block ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Already stored; ignored.
    Duplicate,
    /// Extended the head and was applied.
    Imported,
    /// Extended the head but failed validation or application.
    Rejected(BlockError),
    /// Rooted a new alt chain.
    AltChainCreated,
    /// Extended an existing alt chain. `reorg` is set the first time that
    /// chain's difficulty overtakes the canonical chain by the threshold.
    AltChainExtended {
        /// Whether this acceptance raised the one-shot reorg signal.
        reorg: bool,
    },
    /// No known parent anywhere; buffered as an orphan.
    Orphaned,
    /// The orphan buffer overflowed and the engine reset to genesis.
    Resynced,
}

/// The state-transition engine.
pub struct Engine {
    repository: Box<dyn Repository>,
    repository_factory: RepositoryFactory,
    block_store: Arc<dyn BlockStore>,
    block_queue: Arc<dyn BlockQueue>,
    channel_manager: Arc<dyn ChannelManager>,
    listener: Arc<dyn Listener>,
    wallet: Arc<dyn Wallet>,
    vm: Arc<dyn Vm>,
    recovery: Arc<dyn SenderRecovery>,
    validator: BlockValidator,
    config: EngineConfig,
    genesis: Block,
    best_block: Block,
    total_difficulty: U256,
    alt_chains: HashMap<H256, AltChain>,
    garbage: Vec<Block>,
    sync_done_called: bool,
}

impl Engine {
    /// Construct an engine at genesis. The genesis block is persisted to the
    /// block store if it is not there yet, and the repository is synced so
    /// the initial world-state root reflects any seeded accounts.
    pub fn new(
        collaborators: Collaborators,
        config: EngineConfig,
        genesis: Block,
    ) -> Result<Self, StateError> {
        let Collaborators {
            mut repository,
            repository_factory,
            block_store,
            block_queue,
            channel_manager,
            listener,
            wallet,
            vm,
            recovery,
            seal,
        } = collaborators;

        repository.sync()?;
        if block_store.get_by_hash(&genesis.hash()).is_none() {
            block_store.save_block(&genesis);
        }
        let validator = BlockValidator::new(Arc::clone(&block_store), seal);

        Ok(Engine {
            repository,
            repository_factory,
            block_store,
            block_queue,
            channel_manager,
            listener,
            wallet,
            vm,
            recovery,
            validator,
            config,
            best_block: genesis.clone(),
            genesis,
            total_difficulty: U256::zero(),
            alt_chains: HashMap::new(),
            garbage: Vec::new(),
            sync_done_called: false,
        })
    }

    /// Route an incoming block: extend the head, grow a fork, or buffer it.
    pub fn try_to_connect(&mut self, block: Block) -> Result<ConnectOutcome, ChainError> {
        if self.block_store.get_by_hash(&block.hash()).is_some() {
            // retry of a well known block
            log::debug!("[Engine] duplicate block: [{}]", block.short_hash());
            return Ok(ConnectOutcome::Duplicate);
        }

        // the simple case: the block connects to the main chain
        if self.best_block.is_parent_of(&block) {
            return match self.import_block(block) {
                Ok(()) => Ok(ConnectOutcome::Imported),
                Err(ChainError::Block(error)) => Ok(ConnectOutcome::Rejected(error)),
                Err(error) => Err(error),
            };
        }

        if !self.has_parent_on_chain(&block) {
            // one of the alt chains may connect it; tips are keyed for
            // constant-time extension lookup
            if let Some(mut alt) = self.alt_chains.remove(&block.header.parent_hash) {
                let accepted = alt.try_connect(block);
                debug_assert!(accepted, "tip-keyed lookup implies connectability");

                let threshold = self.total_difficulty + U256::from(REORG_THRESHOLD);
                let reorg = alt.total_difficulty() > threshold && alt.signal_reorg();
                if reorg {
                    log::info!(
                        "[Engine] alt chain overtook the canonical head, difficulty {} vs {}",
                        alt.total_difficulty(),
                        self.total_difficulty
                    );
                    self.listener.trace(&format!(
                        "reorg needed: alt difficulty [{}] canonical [{}]",
                        alt.total_difficulty(),
                        self.total_difficulty
                    ));
                }

                if let Some(tip) = alt.tip() {
                    let tip_hash = tip.hash();
                    self.alt_chains.insert(tip_hash, alt);
                }
                return Ok(ConnectOutcome::AltChainExtended { reorg });
            }
        } else {
            // a different version of a block we already have on the main
            // chain: it roots a new alt chain
            let gap = self.best_block.number() as i64 - block.number() as i64;
            if gap <= 0 {
                log::info!(
                    "[Engine] created alt chain by block.hash: [{}]",
                    block.short_hash()
                );
                let mut alt = AltChain::new(self.total_difficulty);
                let tip_hash = block.hash();
                alt.try_connect(block);
                self.alt_chains.insert(tip_hash, alt);
                return Ok(ConnectOutcome::AltChainCreated);
            }
        }

        // no home for it: buffer, and resync once the buffer floods
        self.garbage.push(block);
        if self.garbage.len() > GARBAGE_LIMIT {
            self.resync()?;
            return Ok(ConnectOutcome::Resynced);
        }
        Ok(ConnectOutcome::Orphaned)
    }

    /// Validate, apply, persist, and announce a block extending the head.
    fn import_block(&mut self, block: Block) -> Result<(), ChainError> {
        // keep chain continuity
        if self.best_block.hash() != block.header.parent_hash {
            log::warn!(
                "[Engine] continuity broken, refused block: [{}]",
                block.short_hash()
            );
            return Ok(());
        }

        if !block.is_genesis() {
            if let Err(error) = self.validator.validate_block(&block) {
                log::warn!("[Engine] invalid block with nr: {}: {}", block.number(), error);
                return Err(error.into());
            }
        }

        if !block.is_genesis() && !self.config.block_chain_only {
            // the wallet hears about a block only once it is known to apply;
            // a rejected block produces no wallet traffic
            self.apply_block(&block)?;
            self.wallet.add_transactions(&block.transactions);
            self.wallet.process_block(&block);
        }
        self.store_block(&block)?;

        // the net has confirmed these transactions
        if !self.config.block_chain_only {
            self.wallet.remove_transactions(&block.transactions);
        }

        self.listener
            .trace(&format!("Block chain size: [ {} ]", self.size()));
        self.listener.on_block(&block);

        if self.block_queue.size() == 0
            && !self.sync_done_called
            && self.channel_manager.is_all_sync()
        {
            log::info!("[Engine] sync done");
            self.sync_done_called = true;
            self.listener.on_sync_done();
        }
        Ok(())
    }

    /// Replay a block's transactions in order, distribute rewards, and fold
    /// the result into the repository. A block whose transactions overrun
    /// its gas limit is rejected with every one of its writes discarded.
    fn apply_block(&mut self, block: &Block) -> Result<(), ChainError> {
        let mut track = TrackedRepository::new(&mut *self.repository);
        let mut total_gas_used: u64 = 0;

        {
            let mut executor = TransactionExecutor::new(
                &mut track,
                &*self.vm,
                &*self.recovery,
                &self.config,
            );
            for (index, tx) in block.transactions.iter().enumerate() {
                log::debug!("[Engine] apply block: [{}] tx: [{}]", block.number(), index);
                total_gas_used += executor.apply_transaction(block, tx)?;
            }
        }

        if self.config.tracing(block.number()) {
            for (index, tx) in block.transactions.iter().enumerate() {
                self.listener.trace(&format!(
                    "block: [{}] tx: [{}] hash: [{}]",
                    block.number(),
                    index,
                    hex::encode(tx.hash())
                ));
            }
        }

        if total_gas_used > block.header.gas_limit {
            // dropping the tracked child discards every transaction write
            return Err(ChainError::Block(BlockError::GasLimitExceeded {
                used: total_gas_used,
                limit: block.header.gas_limit,
            }));
        }

        rewards::distribute(&mut track, block).map_err(ChainError::State)?;
        track.commit().map_err(ChainError::State)?;

        if self.config.tracing(block.number()) {
            self.listener.trace(&format!(
                "applied block: [{}] total gas used: [{}]",
                block.number(),
                total_gas_used
            ));
        }

        self.total_difficulty = self.total_difficulty + block.cumulative_difficulty();
        Ok(())
    }

    /// Flush the repository, verify the advertised state root, persist the
    /// block, and advance the head.
    fn store_block(&mut self, block: &Block) -> Result<(), StateError> {
        self.repository.sync()?;
        let world_root = self.repository.world_state_root()?;
        if world_root != block.header.state_root {
            // observed-permissive: the conflict is loud but the block stands
            log::warn!(
                "[Engine] BLOCK: STATE CONFLICT! block: {} worldstate {} mismatch",
                block.number(),
                hex::encode(world_root)
            );
        }

        self.block_store.save_block(block);
        self.best_block = block.clone();

        log::debug!(
            "[Engine] block added to the blockChain: index: [{}]",
            block.number()
        );
        if block.number() % 100 == 0 {
            log::info!("[Engine] *** Last block added [ #{} ]", block.number());
        }
        Ok(())
    }

    /// Destructive reset after an orphan flood: drain the queue, drop the
    /// head back to genesis, and reopen the repository from scratch.
    fn resync(&mut self) -> Result<(), StateError> {
        log::warn!(
            "[Engine] orphan buffer overflowed ({} blocks), resyncing from genesis",
            self.garbage.len()
        );
        self.block_queue.clear();
        self.total_difficulty = U256::zero();
        self.best_block = self.genesis.clone();
        self.repository.close()?;
        self.repository = (self.repository_factory)();
        self.garbage.clear();
        self.alt_chains.clear();
        Ok(())
    }

    fn has_parent_on_chain(&self, block: &Block) -> bool {
        self.block_store
            .get_by_hash(&block.header.parent_hash)
            .is_some()
    }

    /// The current head block.
    pub fn best_block(&self) -> &Block {
        &self.best_block
    }

    /// Hash of the current head block.
    pub fn best_block_hash(&self) -> H256 {
        self.best_block.hash()
    }

    /// Number of blocks on the canonical chain, genesis included.
    pub fn size(&self) -> u64 {
        self.best_block.number() + 1
    }

    /// Accumulated difficulty of the canonical chain.
    pub fn total_difficulty(&self) -> U256 {
        self.total_difficulty
    }

    /// The gas price the node quotes: the head's minimum gas price, with a
    /// protocol floor while the head is still genesis.
    pub fn gas_price(&self) -> U256 {
        if self.best_block.is_genesis() {
            U256::from(INITIAL_MIN_GAS_PRICE)
        } else {
            self.best_block.header.min_gas_price
        }
    }

    /// Canonical block at `number`, if stored.
    pub fn block_by_number(&self, number: u64) -> Option<Block> {
        self.block_store.get_by_number(number)
    }

    /// Stored block with the given hash.
    pub fn block_by_hash(&self, hash: &H256) -> Option<Block> {
        self.block_store.get_by_hash(hash)
    }

    /// Up to `qty` hashes walking back from `hash`.
    pub fn hashes_starting_from(&self, hash: &H256, qty: usize) -> Vec<H256> {
        self.block_store.hashes_starting_from(hash, qty)
    }

    /// The currently tracked alt chains, keyed by tip hash.
    pub fn alt_chains(&self) -> &HashMap<H256, AltChain> {
        &self.alt_chains
    }

    /// The buffered orphan blocks.
    pub fn garbage(&self) -> &[Block] {
        &self.garbage
    }

    /// Read access to the world-state repository.
    pub fn repository(&self) -> &dyn Repository {
        &*self.repository
    }

    /// Drop stored blocks and fork bookkeeping. The head and repository are
    /// untouched; this is the block-store counterpart of a resync.
    pub fn reset(&mut self) {
        self.block_store.reset();
        self.alt_chains.clear();
        self.garbage.clear();
    }

    /// Shut down the inbound queue.
    pub fn close(&mut self) {
        self.block_queue.close();
    }
}
