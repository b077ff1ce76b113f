// Path: crates/chain/src/engine/tests/mod.rs
use super::*;
use crate::validate::{expected_difficulty, expected_gas_limit};
use ember_api::vm::{ProgramInvoke, ProgramOutcome};
use ember_state::WorldRepository;
use ember_types::core::{BlockHeader, Signature, Transaction};
use ember_types::params::{BLOCK_REWARD, GARBAGE_LIMIT, INITIAL_MIN_GAS_PRICE, SZABO};
use ember_types::Address;
use rand::RngCore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------
// mock collaborators
// ---------------------------------------------------------------------

struct MemoryStore {
    blocks: Mutex<HashMap<H256, Block>>,
}

impl MemoryStore {
    fn new() -> Self {
        MemoryStore {
            blocks: Mutex::new(HashMap::new()),
        }
    }
}

impl BlockStore for MemoryStore {
    fn get_by_hash(&self, hash: &H256) -> Option<Block> {
        self.blocks.lock().unwrap().get(hash).cloned()
    }
    fn get_by_number(&self, number: u64) -> Option<Block> {
        self.blocks
            .lock()
            .unwrap()
            .values()
            .find(|b| b.number() == number)
            .cloned()
    }
    fn hashes_starting_from(&self, hash: &H256, qty: usize) -> Vec<H256> {
        let blocks = self.blocks.lock().unwrap();
        let mut hashes = Vec::new();
        let mut cursor = *hash;
        while hashes.len() < qty {
            let Some(block) = blocks.get(&cursor) else {
                break;
            };
            hashes.push(cursor);
            if block.is_genesis() {
                break;
            }
            cursor = block.header.parent_hash;
        }
        hashes
    }
    fn save_block(&self, block: &Block) {
        self.blocks.lock().unwrap().insert(block.hash(), block.clone());
    }
    fn reset(&self) {
        self.blocks.lock().unwrap().clear();
    }
}

struct MemoryQueue {
    size: AtomicUsize,
    cleared: AtomicBool,
    closed: AtomicBool,
}

impl MemoryQueue {
    fn new() -> Self {
        MemoryQueue {
            size: AtomicUsize::new(0),
            cleared: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }
}

impl BlockQueue for MemoryQueue {
    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }
    fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
        self.size.store(0, Ordering::SeqCst);
    }
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct StaticChannels {
    all_sync: bool,
}

impl ChannelManager for StaticChannels {
    fn is_all_sync(&self) -> bool {
        self.all_sync
    }
}

#[derive(Default)]
struct RecordingListener {
    blocks: Mutex<Vec<H256>>,
    traces: Mutex<Vec<String>>,
    sync_done: AtomicUsize,
}

impl Listener for RecordingListener {
    fn on_block(&self, block: &Block) {
        self.blocks.lock().unwrap().push(block.hash());
    }
    fn on_sync_done(&self) {
        self.sync_done.fetch_add(1, Ordering::SeqCst);
    }
    fn trace(&self, message: &str) {
        self.traces.lock().unwrap().push(message.to_string());
    }
}

impl RecordingListener {
    fn reorg_signals(&self) -> usize {
        self.traces
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.starts_with("reorg needed"))
            .count()
    }
}

#[derive(Default)]
struct RecordingWallet {
    added: AtomicUsize,
    removed: AtomicUsize,
    processed: AtomicUsize,
}

impl Wallet for RecordingWallet {
    fn add_transactions(&self, transactions: &[Transaction]) {
        self.added.fetch_add(transactions.len(), Ordering::SeqCst);
    }
    fn remove_transactions(&self, transactions: &[Transaction]) {
        self.removed.fetch_add(transactions.len(), Ordering::SeqCst);
    }
    fn process_block(&self, _block: &Block) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}

struct AcceptAll;
impl SealVerifier for AcceptAll {
    fn verify_seal(&self, _header: &BlockHeader) -> bool {
        true
    }
}

/// No block in these tests carries contract code, so the VM must be idle.
struct NoVm;
impl Vm for NoVm {
    fn play(&self, _invoke: &ProgramInvoke, _state: &mut dyn Repository) -> ProgramOutcome {
        panic!("no code should run in these tests");
    }
}

struct EmbeddedRecovery;
impl SenderRecovery for EmbeddedRecovery {
    fn recover_sender(&self, tx: &Transaction) -> Option<Address> {
        tx.signature
            .as_ref()
            .map(|sig| Address::from_slice(&sig.r[12..]))
    }
}

// ---------------------------------------------------------------------
// fixtures
// ---------------------------------------------------------------------

struct Harness {
    engine: Engine,
    queue: Arc<MemoryQueue>,
    listener: Arc<RecordingListener>,
    wallet: Arc<RecordingWallet>,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn recent_genesis() -> Block {
    let mut genesis = Block::genesis();
    genesis.header.timestamp = now() - 100_000;
    genesis
}

fn sender_address() -> Address {
    Address::repeat_byte(0xaa)
}

fn harness_with(config: EngineConfig, seed_balance: u64) -> Harness {
    let mut repository = WorldRepository::new();
    if seed_balance > 0 {
        repository
            .add_balance(&sender_address(), U256::from(seed_balance))
            .unwrap();
    }

    let queue = Arc::new(MemoryQueue::new());
    let listener = Arc::new(RecordingListener::default());
    let wallet = Arc::new(RecordingWallet::default());

    let collaborators = Collaborators {
        repository: Box::new(repository),
        repository_factory: Box::new(|| Box::new(WorldRepository::new())),
        block_store: Arc::new(MemoryStore::new()),
        block_queue: Arc::clone(&queue) as Arc<dyn BlockQueue>,
        channel_manager: Arc::new(StaticChannels { all_sync: true }),
        listener: Arc::clone(&listener) as Arc<dyn Listener>,
        wallet: Arc::clone(&wallet) as Arc<dyn Wallet>,
        vm: Arc::new(NoVm),
        recovery: Arc::new(EmbeddedRecovery),
        seal: Arc::new(AcceptAll),
    };
    let engine = Engine::new(collaborators, config, recent_genesis()).unwrap();
    Harness {
        engine,
        queue,
        listener,
        wallet,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default(), 0)
}

/// A structurally valid child of `parent` with the given transactions.
fn child_of(parent: &Block, transactions: Vec<Transaction>) -> Block {
    let timestamp = parent.header.timestamp + 10;
    let mut block = Block::genesis();
    block.header.parent_hash = parent.hash();
    block.header.number = parent.number() + 1;
    block.header.timestamp = timestamp;
    block.header.difficulty = expected_difficulty(&parent.header, timestamp);
    block.header.gas_limit = expected_gas_limit(&parent.header);
    block.header.coinbase = Address::repeat_byte(0xc0);
    block.header.min_gas_price = U256::from(INITIAL_MIN_GAS_PRICE);
    block.transactions = transactions;
    block
}

fn signature_for(address: Address) -> Signature {
    let mut r = H256::zero();
    r.0[12..].copy_from_slice(address.as_bytes());
    Signature { v: 27, r, s: H256::zero() }
}

fn transfer_tx(nonce: u64, to: Address, value: u64) -> Transaction {
    Transaction {
        nonce: U256::from(nonce),
        gas_price: U256::one(),
        gas_limit: 21_000,
        to: Some(to),
        value: Some(U256::from(value)),
        data: Vec::new(),
        signature: Some(signature_for(sender_address())),
    }
}

fn random_orphan(seed: &mut impl RngCore) -> Block {
    let mut parent = [0u8; 32];
    seed.fill_bytes(&mut parent);
    let mut block = Block::genesis();
    block.header.parent_hash = H256::from(parent);
    block.header.number = 5;
    block
}

fn balance_of(engine: &Engine, address: &Address) -> U256 {
    engine
        .repository()
        .get_account(address)
        .unwrap()
        .map(|a| a.balance)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------
// connector and applier behavior
// ---------------------------------------------------------------------

#[test]
fn sequential_blocks_advance_head_and_difficulty() {
    let mut h = harness();
    let mut expected_difficulty_sum = U256::zero();
    let mut parent = h.engine.best_block().clone();

    for number in 1..=3u64 {
        let block = child_of(&parent, Vec::new());
        expected_difficulty_sum = expected_difficulty_sum + block.cumulative_difficulty();
        assert_eq!(
            h.engine.try_to_connect(block.clone()).unwrap(),
            ConnectOutcome::Imported
        );
        assert_eq!(h.engine.best_block().number(), number);
        parent = block;
    }

    assert_eq!(h.engine.total_difficulty(), expected_difficulty_sum);
    assert_eq!(h.engine.size(), 4);
    // every applied block paid its coinbase
    assert_eq!(
        balance_of(&h.engine, &Address::repeat_byte(0xc0)),
        U256::from(BLOCK_REWARD) * U256::from(3u64)
    );
    assert_eq!(h.listener.blocks.lock().unwrap().len(), 3);
}

#[test]
fn duplicate_block_is_ignored() {
    let mut h = harness();
    let block = child_of(h.engine.best_block(), Vec::new());
    assert_eq!(
        h.engine.try_to_connect(block.clone()).unwrap(),
        ConnectOutcome::Imported
    );
    assert_eq!(
        h.engine.try_to_connect(block).unwrap(),
        ConnectOutcome::Duplicate
    );
    assert_eq!(h.engine.best_block().number(), 1);
}

#[test]
fn unknown_parent_block_mutates_nothing() {
    let mut h = harness();
    let head_before = h.engine.best_block_hash();
    let root_before = h.engine.repository().world_state_root().unwrap();

    let mut seed = rand::thread_rng();
    assert_eq!(
        h.engine.try_to_connect(random_orphan(&mut seed)).unwrap(),
        ConnectOutcome::Orphaned
    );

    assert_eq!(h.engine.best_block_hash(), head_before);
    assert_eq!(h.engine.repository().world_state_root().unwrap(), root_before);
    assert_eq!(h.engine.total_difficulty(), U256::zero());
    assert_eq!(h.engine.garbage().len(), 1);
}

#[test]
fn transactions_settle_through_block_application() {
    let mut h = harness_with(EngineConfig::default(), 1_000_000);
    let receiver = Address::repeat_byte(0xbb);
    let block = child_of(
        h.engine.best_block(),
        vec![transfer_tx(0, receiver, 4_000)],
    );

    assert_eq!(
        h.engine.try_to_connect(block).unwrap(),
        ConnectOutcome::Imported
    );
    assert_eq!(balance_of(&h.engine, &receiver), U256::from(4_000u64));
    assert_eq!(
        balance_of(&h.engine, &sender_address()),
        U256::from(1_000_000u64 - 4_000 - 21_000)
    );
    // coinbase: gas fee plus the block reward
    assert_eq!(
        balance_of(&h.engine, &Address::repeat_byte(0xc0)),
        U256::from(21_000u64) + U256::from(BLOCK_REWARD)
    );
}

#[test]
fn block_over_its_gas_limit_is_rejected_without_state_changes() {
    let mut h = harness_with(EngineConfig::default(), 10_000_000);
    let receiver = Address::repeat_byte(0xbb);

    // 48 transfers consume 1_008_000 gas, over the ~999k child limit
    let transactions: Vec<Transaction> = (0..48)
        .map(|nonce| transfer_tx(nonce, receiver, 1))
        .collect();
    let block = child_of(h.engine.best_block(), transactions);
    assert!(block.header.gas_limit < 48 * 21_000);

    let outcome = h.engine.try_to_connect(block).unwrap();
    assert!(matches!(
        outcome,
        ConnectOutcome::Rejected(BlockError::GasLimitExceeded { .. })
    ));

    // every transaction write was discarded with the tracked child
    assert_eq!(h.engine.best_block().number(), 0);
    assert!(h
        .engine
        .repository()
        .get_account(&receiver)
        .unwrap()
        .is_none());
    assert_eq!(
        h.engine
            .repository()
            .get_account(&sender_address())
            .unwrap()
            .unwrap()
            .nonce,
        U256::zero()
    );

    // a rejected block produces no wallet traffic
    assert_eq!(h.wallet.added.load(Ordering::SeqCst), 0);
    assert_eq!(h.wallet.removed.load(Ordering::SeqCst), 0);
    assert_eq!(h.wallet.processed.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_header_is_rejected() {
    let mut h = harness();
    let mut block = child_of(h.engine.best_block(), Vec::new());
    block.header.difficulty = block.header.difficulty + U256::one();

    let outcome = h.engine.try_to_connect(block).unwrap();
    assert!(matches!(
        outcome,
        ConnectOutcome::Rejected(BlockError::InvalidDifficulty { .. })
    ));
    assert_eq!(h.engine.best_block().number(), 0);
}

// ---------------------------------------------------------------------
// forks
// ---------------------------------------------------------------------

#[test]
fn same_height_sibling_roots_an_alt_chain() {
    // S4: a competing version of the head goes to an alt chain
    let mut h = harness();
    let genesis = h.engine.best_block().clone();

    let block = child_of(&genesis, Vec::new());
    h.engine.try_to_connect(block.clone()).unwrap();

    let mut sibling = child_of(&genesis, Vec::new());
    sibling.header.coinbase = Address::repeat_byte(0xd1);

    assert_eq!(
        h.engine.try_to_connect(sibling).unwrap(),
        ConnectOutcome::AltChainCreated
    );
    // the head is unchanged
    assert_eq!(h.engine.best_block_hash(), block.hash());
    assert_eq!(h.engine.alt_chains().len(), 1);
    assert_eq!(h.listener.reorg_signals(), 0);
}

#[test]
fn overtaking_alt_chain_signals_reorg_exactly_once() {
    // S5
    let mut h = harness();
    let genesis = h.engine.best_block().clone();
    h.engine
        .try_to_connect(child_of(&genesis, Vec::new()))
        .unwrap();

    let mut sibling = child_of(&genesis, Vec::new());
    sibling.header.coinbase = Address::repeat_byte(0xd1);
    h.engine.try_to_connect(sibling.clone()).unwrap();

    // first extension pushes the alt chain past the canonical difficulty
    // by far more than the threshold
    let mut ext = child_of(&sibling, Vec::new());
    ext.header.coinbase = Address::repeat_byte(0xd1);
    assert_eq!(
        h.engine.try_to_connect(ext.clone()).unwrap(),
        ConnectOutcome::AltChainExtended { reorg: true }
    );
    assert_eq!(h.listener.reorg_signals(), 1);

    // the signal is one-shot per alt chain
    let mut ext2 = child_of(&ext, Vec::new());
    ext2.header.coinbase = Address::repeat_byte(0xd1);
    assert_eq!(
        h.engine.try_to_connect(ext2).unwrap(),
        ConnectOutcome::AltChainExtended { reorg: false }
    );
    assert_eq!(h.listener.reorg_signals(), 1);

    // the alt chain stays keyed by its moving tip
    assert_eq!(h.engine.alt_chains().len(), 1);
    let alt = h.engine.alt_chains().values().next().unwrap();
    assert_eq!(alt.blocks().len(), 3);
}

#[test]
fn ancient_sibling_goes_to_garbage() {
    // a known parent deep below the head no longer roots an alt chain
    let mut h = harness();
    let genesis = h.engine.best_block().clone();
    let one = child_of(&genesis, Vec::new());
    h.engine.try_to_connect(one.clone()).unwrap();
    let two = child_of(&one, Vec::new());
    h.engine.try_to_connect(two).unwrap();

    let mut late_sibling = child_of(&genesis, Vec::new());
    late_sibling.header.coinbase = Address::repeat_byte(0xd2);
    assert_eq!(
        h.engine.try_to_connect(late_sibling).unwrap(),
        ConnectOutcome::Orphaned
    );
}

// ---------------------------------------------------------------------
// orphan flood
// ---------------------------------------------------------------------

#[test]
fn orphan_flood_resets_to_genesis() {
    // S6
    let mut h = harness();
    let genesis = h.engine.best_block().clone();
    h.engine
        .try_to_connect(child_of(&genesis, Vec::new()))
        .unwrap();
    assert!(h.engine.total_difficulty() > U256::zero());

    let mut seed = rand::thread_rng();
    for _ in 0..GARBAGE_LIMIT {
        assert_eq!(
            h.engine.try_to_connect(random_orphan(&mut seed)).unwrap(),
            ConnectOutcome::Orphaned
        );
    }
    assert_eq!(h.engine.garbage().len(), GARBAGE_LIMIT);

    // one more tips it over
    assert_eq!(
        h.engine.try_to_connect(random_orphan(&mut seed)).unwrap(),
        ConnectOutcome::Resynced
    );

    assert_eq!(h.engine.best_block_hash(), genesis.hash());
    assert_eq!(h.engine.total_difficulty(), U256::zero());
    assert!(h.engine.garbage().is_empty());
    assert!(h.engine.alt_chains().is_empty());
    assert!(h.queue.cleared.load(Ordering::SeqCst));

    // the reopened repository starts blank and the engine keeps working
    let mut replacement = child_of(&genesis, Vec::new());
    replacement.header.coinbase = Address::repeat_byte(0xd3);
    assert_eq!(
        h.engine.try_to_connect(replacement).unwrap(),
        ConnectOutcome::Imported
    );
    assert_eq!(h.engine.best_block().number(), 1);
}

// ---------------------------------------------------------------------
// listener, wallet, and config gating
// ---------------------------------------------------------------------

#[test]
fn sync_done_fires_exactly_once() {
    let mut h = harness();
    h.queue.size.store(0, Ordering::SeqCst);

    let one = child_of(h.engine.best_block(), Vec::new());
    h.engine.try_to_connect(one.clone()).unwrap();
    assert_eq!(h.listener.sync_done.load(Ordering::SeqCst), 1);

    let two = child_of(&one, Vec::new());
    h.engine.try_to_connect(two).unwrap();
    assert_eq!(h.listener.sync_done.load(Ordering::SeqCst), 1);
}

#[test]
fn sync_done_waits_for_the_queue_to_drain() {
    let mut h = harness();
    h.queue.size.store(3, Ordering::SeqCst);

    let one = child_of(h.engine.best_block(), Vec::new());
    h.engine.try_to_connect(one.clone()).unwrap();
    assert_eq!(h.listener.sync_done.load(Ordering::SeqCst), 0);

    h.queue.size.store(0, Ordering::SeqCst);
    let two = child_of(&one, Vec::new());
    h.engine.try_to_connect(two).unwrap();
    assert_eq!(h.listener.sync_done.load(Ordering::SeqCst), 1);
}

#[test]
fn wallet_sees_applied_transactions() {
    let mut h = harness_with(EngineConfig::default(), 1_000_000);
    let block = child_of(
        h.engine.best_block(),
        vec![transfer_tx(0, Address::repeat_byte(0xbb), 1)],
    );
    h.engine.try_to_connect(block).unwrap();

    assert_eq!(h.wallet.added.load(Ordering::SeqCst), 1);
    assert_eq!(h.wallet.removed.load(Ordering::SeqCst), 1);
    assert_eq!(h.wallet.processed.load(Ordering::SeqCst), 1);
}

#[test]
fn chain_only_mode_stores_blocks_without_applying() {
    let config = EngineConfig {
        block_chain_only: true,
        ..Default::default()
    };
    let mut h = harness_with(config, 1_000_000);
    let block = child_of(
        h.engine.best_block(),
        vec![transfer_tx(0, Address::repeat_byte(0xbb), 1)],
    );

    assert_eq!(
        h.engine.try_to_connect(block).unwrap(),
        ConnectOutcome::Imported
    );
    assert_eq!(h.engine.best_block().number(), 1);

    // no wallet traffic and no state transition
    assert_eq!(h.wallet.added.load(Ordering::SeqCst), 0);
    assert_eq!(h.wallet.removed.load(Ordering::SeqCst), 0);
    assert_eq!(
        balance_of(&h.engine, &Address::repeat_byte(0xc0)),
        U256::zero()
    );
    assert_eq!(
        balance_of(&h.engine, &sender_address()),
        U256::from(1_000_000u64)
    );
}

#[test]
fn tracing_emits_state_dumps() {
    let config = EngineConfig {
        trace_start_block: 0,
        ..Default::default()
    };
    let mut h = harness_with(config, 1_000_000);
    let block = child_of(
        h.engine.best_block(),
        vec![transfer_tx(0, Address::repeat_byte(0xbb), 1)],
    );
    h.engine.try_to_connect(block).unwrap();

    let traces = h.listener.traces.lock().unwrap();
    assert!(traces.iter().any(|t| t.starts_with("block: [1] tx: [0]")));
    assert!(traces.iter().any(|t| t.starts_with("applied block: [1]")));
}

#[test]
fn gas_price_floors_at_genesis() {
    let mut h = harness();
    assert_eq!(
        h.engine.gas_price(),
        U256::from(INITIAL_MIN_GAS_PRICE)
    );

    let mut block = child_of(h.engine.best_block(), Vec::new());
    block.header.min_gas_price = U256::from(7u64) * U256::from(SZABO);
    h.engine.try_to_connect(block.clone()).unwrap();
    assert_eq!(h.engine.gas_price(), block.header.min_gas_price);
}

#[test]
fn block_lookups_pass_through_the_store() {
    let mut h = harness();
    let one = child_of(h.engine.best_block(), Vec::new());
    h.engine.try_to_connect(one.clone()).unwrap();
    let two = child_of(&one, Vec::new());
    h.engine.try_to_connect(two.clone()).unwrap();

    assert_eq!(h.engine.block_by_number(1).unwrap().hash(), one.hash());
    assert_eq!(h.engine.block_by_hash(&two.hash()).unwrap().hash(), two.hash());

    let hashes = h.engine.hashes_starting_from(&two.hash(), 10);
    assert_eq!(hashes.len(), 3);
    assert_eq!(hashes[0], two.hash());
    assert_eq!(hashes[2], h.engine.block_by_number(0).unwrap().hash());
}

#[test]
fn reset_clears_store_and_fork_state() {
    let mut h = harness();
    let genesis = h.engine.best_block().clone();
    let one = child_of(&genesis, Vec::new());
    h.engine.try_to_connect(one.clone()).unwrap();
    let mut sibling = child_of(&genesis, Vec::new());
    sibling.header.coinbase = Address::repeat_byte(0xd1);
    h.engine.try_to_connect(sibling).unwrap();

    h.engine.reset();
    assert!(h.engine.alt_chains().is_empty());
    assert!(h.engine.block_by_hash(&one.hash()).is_none());
}

#[test]
fn close_shuts_the_queue() {
    let mut h = harness();
    h.engine.close();
    assert!(h.queue.closed.load(Ordering::SeqCst));
}
