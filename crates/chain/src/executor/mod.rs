// Path: crates/chain/src/executor/mod.rs
//! The per-transaction state transition.
//!
//! [`TransactionExecutor::apply_transaction`] drives one transaction against
//! the world state: sender and nonce validation, value transfer, gas prepay,
//! code execution inside a tracked repository child, and refund or rollback
//! depending on how the program run ends. Protocol failures are never
//! errors; they are encoded in the returned gas figure, and only a backend
//! fault surfaces as `Err`.

use ember_api::crypto::SenderRecovery;
use ember_api::repository::{Repository, TrackedRepository};
use ember_api::vm::{ProgramInvoke, ProgramOutcome, Vm};
use ember_types::config::EngineConfig;
use ember_types::core::{Block, Transaction};
use ember_types::error::StateError;
use ember_types::params::{GAS_TRANSACTION, GAS_TXDATA};
use ember_types::{Address, U256};

/// Executes transactions against a repository.
///
/// Holds the repository exclusively for the duration of a block; each
/// `apply_transaction` runs to completion before the next starts.
pub struct TransactionExecutor<'a> {
    repo: &'a mut dyn Repository,
    vm: &'a dyn Vm,
    recovery: &'a dyn SenderRecovery,
    config: &'a EngineConfig,
}

impl<'a> TransactionExecutor<'a> {
    /// An executor over `repo` using the given VM and crypto collaborators.
    pub fn new(
        repo: &'a mut dyn Repository,
        vm: &'a dyn Vm,
        recovery: &'a dyn SenderRecovery,
        config: &'a EngineConfig,
    ) -> Self {
        TransactionExecutor {
            repo,
            vm,
            recovery,
            config,
        }
    }

    /// Apply `tx` to the world state and return the gas it used.
    ///
    /// A transaction that fails sender resolution, the nonce check, or the
    /// gas prepay uses zero gas. A program run that exhausts its gas or
    /// faults consumes the full gas allowance and leaves no trace beyond
    /// the nonce bump, the outer value transfer for calls, and the prepay.
    pub fn apply_transaction(&mut self, block: &Block, tx: &Transaction) -> Result<u64, StateError> {
        let coinbase = block.header.coinbase;

        // VALIDATE THE SENDER
        let Some(sender) = self.recovery.recover_sender(tx) else {
            log::warn!("[Executor] sender unrecoverable, tx: [{}]", tx.short_hash());
            return Ok(0);
        };
        let Some(sender_account) = self.repo.get_account(&sender)? else {
            log::warn!("[Executor] no such address: {}", hex::encode(sender));
            return Ok(0);
        };

        // VALIDATE THE NONCE
        if sender_account.nonce != tx.nonce {
            log::warn!(
                "[Executor] invalid nonce, account.nonce={} tx.nonce={}",
                sender_account.nonce,
                tx.nonce
            );
            return Ok(0);
        }

        // UPDATE THE NONCE
        self.repo.increase_nonce(&sender)?;

        // FIND OUT THE TRANSACTION TYPE
        let is_creation = tx.is_contract_creation();
        let (receiver, code) = match tx.to {
            // the payload is init code for the derived contract address
            None => (tx.contract_address(&sender), Some(tx.data.clone())),
            Some(to) => {
                if self.repo.get_account(&to)?.is_none() {
                    self.repo.create_account(&to)?;
                    log::debug!(
                        "[Executor] new receiver account created, address={}",
                        hex::encode(to)
                    );
                    (to, None)
                } else {
                    let code = self.repo.get_code(&to)?;
                    if code.is_some() {
                        log::debug!(
                            "[Executor] calling existing contract, address={}",
                            hex::encode(to)
                        );
                    }
                    (to, code)
                }
            }
        };

        // GAS AFFORDABILITY
        // The prepay must be fundable before anything moves; a transaction
        // that cannot pay for its gas leaves only the nonce bump behind.
        let value = tx.value.unwrap_or_default();
        let balance = sender_account.balance;
        let transfers_value = !value.is_zero() && balance >= value;
        let gas_debit = U256::from(tx.gas_limit) * tx.gas_price;
        let required = if transfers_value {
            gas_debit + value
        } else {
            gas_debit
        };
        if balance < required {
            log::debug!(
                "[Executor] no gas to start the execution, sender={}",
                hex::encode(sender)
            );
            return Ok(0);
        }

        // THE SIMPLE VALUE/BALANCE CHANGE
        if transfers_value {
            self.repo.sub_balance(&sender, value)?;
            if !is_creation {
                // crediting a new contract is deferred into the tracked
                // child so it can revert with the run
                self.repo.add_balance(&receiver, value)?;
            }
            log::debug!(
                "[Executor] value transfer, sender={} receiver={} value={}",
                hex::encode(sender),
                hex::encode(receiver),
                value
            );
        }

        // Debit the total purchasable gas from the sender; the coinbase
        // holds it until the leftover is refunded.
        if !gas_debit.is_zero() {
            self.repo.sub_balance(&sender, gas_debit)?;
            self.repo.add_balance(&coinbase, gas_debit)?;
        }

        // CREATE AND/OR EXECUTE CONTRACT
        if is_creation || code.is_some() {
            self.run_program(block, tx, sender, receiver, code, gas_debit, transfers_value)
        } else {
            // REFUND THE PREPAY EXCEPT FOR THE BASE FEE
            let gas_used = GAS_TRANSACTION + tx.data.len() as u64 * GAS_TXDATA;
            let fee = U256::from(gas_used) * tx.gas_price;
            if gas_debit > fee {
                let refund = gas_debit - fee;
                self.repo.add_balance(&sender, refund)?;
                self.repo.sub_balance(&coinbase, refund)?;
            }
            Ok(gas_used)
        }
    }

    /// Run code (or init code) inside a tracked child of the repository and
    /// settle the outcome.
    #[allow(clippy::too_many_arguments)]
    fn run_program(
        &mut self,
        block: &Block,
        tx: &Transaction,
        sender: Address,
        receiver: Address,
        code: Option<Vec<u8>>,
        gas_debit: U256,
        transfers_value: bool,
    ) -> Result<u64, StateError> {
        let coinbase = block.header.coinbase;
        let is_creation = tx.is_contract_creation();
        let mut track = TrackedRepository::new(&mut *self.repo);

        if is_creation {
            // the new contract materializes inside the child, so a failed
            // run reverts its existence along with everything else
            if transfers_value {
                track.add_balance(&receiver, tx.value.unwrap_or_default())?;
            } else {
                track.create_account(&receiver)?;
            }
            log::debug!(
                "[Executor] new contract created, address={}",
                hex::encode(receiver)
            );
        }

        let receiver_balance = track
            .get_account(&receiver)?
            .map(|a| a.balance)
            .unwrap_or_default();
        let invoke = ProgramInvoke::from_transaction(
            tx,
            block,
            code.unwrap_or_default(),
            sender,
            receiver,
            receiver_balance,
        );

        let outcome = if self.config.play_vm {
            self.vm.play(&invoke, &mut track)
        } else {
            ProgramOutcome::Halt {
                gas_used: 0,
                return_bytes: Vec::new(),
                delete_accounts: Vec::new(),
            }
        };

        match outcome {
            ProgramOutcome::Halt {
                gas_used,
                return_bytes,
                delete_accounts,
            } => {
                let fee = U256::from(gas_used) * tx.gas_price;
                if gas_debit > fee {
                    let refund = gas_debit - fee;
                    log::debug!(
                        "[Executor] gas leftover refunded, sender={} refund={}",
                        hex::encode(sender),
                        refund
                    );
                    track.add_balance(&sender, refund)?;
                    track.sub_balance(&coinbase, refund)?;
                }

                if is_creation && !return_bytes.is_empty() {
                    log::debug!(
                        "[Executor] saving contract body, contract={} code={}",
                        hex::encode(receiver),
                        hex::encode(&return_bytes)
                    );
                    track.save_code(&receiver, return_bytes)?;
                }

                for address in &delete_accounts {
                    track.delete_account(address)?;
                }

                track.commit()?;
                Ok(gas_used)
            }
            ProgramOutcome::OutOfGas { gas_used } => {
                log::debug!(
                    "[Executor] run halted by OutOfGas at {} gas, contract={}",
                    gas_used,
                    hex::encode(receiver)
                );
                track.rollback();
                Ok(tx.gas_limit)
            }
            ProgramOutcome::RuntimeFailure => {
                log::debug!(
                    "[Executor] runtime failure, contract={}",
                    hex::encode(receiver)
                );
                track.rollback();
                Ok(tx.gas_limit)
            }
        }
    }
}
