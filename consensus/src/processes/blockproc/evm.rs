//! A minimal deterministic account based execution module. It applies value transfers,
//! charges fees into the driver account and turns driver calls into logs

use super::{EvmModule, EvmProcessor};
use crate::{
    errors::BlockProcResult,
    model::stores::accounts::{Account, DbAccountsStore},
};
use galaxy_consensus_core::{
    Gas, Hash,
    block::BlockCtx,
    config::params::Rules,
    tx::{Address, DRIVER_ADDRESS, Log, Receipt, ReceiptStatus, Transaction, TxPayload},
};
use galaxy_core::{trace, warn};
use galaxy_database::prelude::{DirectDbWriter, StoreResult};
use galaxy_hashes::{HASH_SIZE, Hasher, HasherBase, HasherExtensions, StateHash};
use std::{collections::BTreeMap, sync::Arc};

/// Intrinsic gas of every user transaction
pub const TRANSFER_GAS: Gas = 21_000;

const fn driver_topic(tag: u8) -> Hash {
    let mut bytes = [0u8; HASH_SIZE];
    bytes[0] = 0xd1;
    bytes[HASH_SIZE - 1] = tag;
    Hash::from_bytes(bytes)
}

pub const SET_VALIDATOR_TOPIC: Hash = driver_topic(1);
pub const DEACTIVATE_VALIDATOR_TOPIC: Hash = driver_topic(2);
pub const ADVANCE_EPOCHS_TOPIC: Hash = driver_topic(3);

/// Account state on top of the accounts store. Changes stay in memory until [`StateDb::commit`]
#[derive(Clone)]
pub struct StateDb {
    store: Arc<DbAccountsStore>,
    root: Hash,
    dirty: BTreeMap<Address, Account>,
}

impl StateDb {
    pub fn new(store: Arc<DbAccountsStore>, root: Hash) -> Self {
        Self { store, root, dirty: BTreeMap::new() }
    }

    pub fn get(&self, address: Address) -> BlockProcResult<Account> {
        match self.dirty.get(&address) {
            Some(account) => Ok(*account),
            None => Ok(self.store.get(address)?),
        }
    }

    pub fn balance(&self, address: Address) -> BlockProcResult<u64> {
        Ok(self.get(address)?.balance)
    }

    pub fn nonce(&self, address: Address) -> BlockProcResult<u64> {
        Ok(self.get(address)?.nonce)
    }

    pub fn set(&mut self, address: Address, account: Account) {
        self.dirty.insert(address, account);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The root the state started from
    pub fn base_root(&self) -> Hash {
        self.root
    }

    /// The root after applying the pending changes
    pub fn calc_root(&self) -> Hash {
        if self.dirty.is_empty() {
            return self.root;
        }
        let mut hasher = StateHash::new();
        hasher.update(self.root).write_len(self.dirty.len());
        for (address, account) in self.dirty.iter() {
            hasher.update(address).write_u64(account.balance).write_u64(account.nonce);
        }
        hasher.finalize()
    }

    /// Writes the pending changes to the store and returns the new root
    pub fn commit(self) -> StoreResult<Hash> {
        let root = self.calc_root();
        let mut writer = DirectDbWriter::new(self.store.db());
        for (address, account) in self.dirty {
            self.store.set(&mut writer, address, account)?;
        }
        Ok(root)
    }
}

/// Result of executing all transactions of a block
pub struct EvmBlock {
    pub ctx: BlockCtx,
    pub root: Hash,
    pub gas_used: Gas,
    /// Every transaction passed for execution, skipped ones included
    pub txs: Vec<Transaction>,
    pub internal_txs: Vec<Hash>,
    pub state: StateDb,
}

pub struct GalaxyEvmModule {
    /// The only account allowed to call the driver directly
    driver_owner: Address,
}

impl GalaxyEvmModule {
    pub fn new(driver_owner: Address) -> Self {
        Self { driver_owner }
    }
}

impl EvmModule for GalaxyEvmModule {
    fn start(&self, block: &BlockCtx, statedb: StateDb, rules: &Rules) -> Box<dyn EvmProcessor> {
        Box::new(GalaxyEvmProcessor {
            block: *block,
            rules: *rules,
            driver_owner: self.driver_owner,
            state: statedb,
            txs: Vec::new(),
            internal_txs: Vec::new(),
            skipped: Vec::new(),
            receipts: Vec::new(),
            gas_used: 0,
        })
    }
}

enum Outcome {
    Applied(Receipt),
    Skipped(&'static str),
}

struct GalaxyEvmProcessor {
    block: BlockCtx,
    rules: Rules,
    driver_owner: Address,
    state: StateDb,
    txs: Vec<Transaction>,
    internal_txs: Vec<Hash>,
    skipped: Vec<u32>,
    receipts: Vec<Receipt>,
    gas_used: Gas,
}

fn driver_log(topic: Hash, payload: &TxPayload) -> Log {
    Log { address: DRIVER_ADDRESS, topics: vec![topic], data: bincode::serialize(payload).unwrap_or_default() }
}

impl GalaxyEvmProcessor {
    fn apply_internal(&mut self, tx: &Transaction) -> BlockProcResult<Outcome> {
        if !tx.is_internal() {
            return Ok(Outcome::Skipped("not an internal transaction"));
        }
        let mut sender = self.state.get(Address::ZERO)?;
        if sender.nonce != tx.nonce {
            return Ok(Outcome::Skipped("wrong internal nonce"));
        }
        sender.nonce += 1;
        self.state.set(Address::ZERO, sender);

        let mut status = ReceiptStatus::Success;
        let mut logs = Vec::new();
        match &tx.payload {
            TxPayload::Transfer => {}
            TxPayload::SetValidator { .. } => logs.push(driver_log(SET_VALIDATOR_TOPIC, &tx.payload)),
            TxPayload::DeactivateValidator { .. } => logs.push(driver_log(DEACTIVATE_VALIDATOR_TOPIC, &tx.payload)),
            TxPayload::AdvanceEpochs { .. } => logs.push(driver_log(ADVANCE_EPOCHS_TOPIC, &tx.payload)),
            TxPayload::DistributeFees { rewards } => {
                let mut driver = self.state.get(DRIVER_ADDRESS)?;
                let total: u64 = rewards.iter().map(|(_, amount)| *amount).sum();
                if total > driver.balance {
                    status = ReceiptStatus::Failed;
                } else {
                    driver.balance -= total;
                    self.state.set(DRIVER_ADDRESS, driver);
                    for (address, amount) in rewards.iter() {
                        let mut account = self.state.get(*address)?;
                        account.balance += amount;
                        self.state.set(*address, account);
                    }
                }
            }
        }
        Ok(Outcome::Applied(Receipt { tx_hash: tx.hash(), status, gas_used: 0, logs }))
    }

    fn apply_user(&mut self, tx: &Transaction) -> BlockProcResult<Outcome> {
        if tx.is_internal() {
            return Ok(Outcome::Skipped("internal sender in a user transaction"));
        }
        if tx.gas < TRANSFER_GAS {
            return Ok(Outcome::Skipped("intrinsic gas too low"));
        }
        if tx.gas_price < self.rules.economy.min_gas_price {
            return Ok(Outcome::Skipped("gas price below the minimum"));
        }
        if self.gas_used + TRANSFER_GAS > self.rules.blocks.max_block_gas {
            return Ok(Outcome::Skipped("block gas limit reached"));
        }
        let mut sender = self.state.get(tx.from)?;
        if sender.nonce != tx.nonce {
            return Ok(Outcome::Skipped("nonce mismatch"));
        }
        let fee = TRANSFER_GAS.saturating_mul(tx.gas_price);
        if sender.balance < fee.saturating_add(tx.value) {
            return Ok(Outcome::Skipped("insufficient balance"));
        }

        sender.nonce += 1;
        sender.balance -= fee;
        self.state.set(tx.from, sender);
        let mut driver = self.state.get(DRIVER_ADDRESS)?;
        driver.balance += fee;
        self.state.set(DRIVER_ADDRESS, driver);

        let mut logs = Vec::new();
        let status = match &tx.payload {
            TxPayload::Transfer => ReceiptStatus::Success,
            TxPayload::AdvanceEpochs { .. } if tx.to == DRIVER_ADDRESS && tx.from == self.driver_owner => {
                logs.push(driver_log(ADVANCE_EPOCHS_TOPIC, &tx.payload));
                ReceiptStatus::Success
            }
            _ => ReceiptStatus::Failed,
        };
        if status == ReceiptStatus::Success && tx.value > 0 {
            let mut sender = self.state.get(tx.from)?;
            sender.balance -= tx.value;
            self.state.set(tx.from, sender);
            let mut recipient = self.state.get(tx.to)?;
            recipient.balance += tx.value;
            self.state.set(tx.to, recipient);
        }
        self.gas_used += TRANSFER_GAS;
        Ok(Outcome::Applied(Receipt { tx_hash: tx.hash(), status, gas_used: TRANSFER_GAS, logs }))
    }
}

impl EvmProcessor for GalaxyEvmProcessor {
    fn execute(&mut self, txs: &[Transaction], internal: bool) -> BlockProcResult<Vec<Receipt>> {
        let mut receipts = Vec::with_capacity(txs.len());
        for tx in txs {
            let position = self.txs.len() as u32;
            let outcome = if internal { self.apply_internal(tx)? } else { self.apply_user(tx)? };
            match outcome {
                Outcome::Applied(receipt) => {
                    if internal {
                        self.internal_txs.push(receipt.tx_hash);
                    }
                    receipts.push(receipt);
                }
                Outcome::Skipped(reason) => {
                    if internal {
                        warn!("Internal transaction {} of block {} skipped: {}", tx.hash(), self.block.idx, reason);
                    } else {
                        trace!("Transaction {} skipped: {}", tx.hash(), reason);
                    }
                    self.skipped.push(position);
                }
            }
            self.txs.push(tx.clone());
        }
        self.receipts.extend(receipts.iter().cloned());
        Ok(receipts)
    }

    fn state(&self) -> &StateDb {
        &self.state
    }

    fn finalize(self: Box<Self>) -> (EvmBlock, Vec<u32>, Vec<Receipt>) {
        let block = EvmBlock {
            ctx: self.block,
            root: self.state.calc_root(),
            gas_used: self.gas_used,
            txs: self.txs,
            internal_txs: self.internal_txs,
            state: self.state,
        };
        (block, self.skipped, self.receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::new_temp_flushable;
    use galaxy_consensus_core::config::params::FAKENET_RULES;
    use galaxy_database::prelude::CachePolicy;

    fn funded_state(store: &Arc<DbAccountsStore>, balances: &[(Address, u64)]) -> StateDb {
        let mut state = StateDb::new(store.clone(), Hash::ZERO);
        for (address, balance) in balances.iter() {
            state.set(*address, Account { balance: *balance, nonce: 0 });
        }
        state
    }

    #[test]
    fn test_transfers_and_skips() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbAccountsStore::new(db, CachePolicy::Count(100)));
        let (alice, bob) = (Address::from_u64(1), Address::from_u64(2));
        let state = funded_state(&store, &[(alice, 1_000_000)]);
        let mut evm = GalaxyEvmModule::new(Address::from_u64(99)).start(&BlockCtx::default(), state, &FAKENET_RULES);

        let txs = vec![
            Transaction::new_transfer(alice, bob, 0, 100, TRANSFER_GAS, 1),
            // Replays the nonce
            Transaction::new_transfer(alice, bob, 0, 100, TRANSFER_GAS, 1),
            Transaction::new_transfer(alice, bob, 1, 10_000_000, TRANSFER_GAS, 1),
            Transaction::new_transfer(bob, alice, 0, 1, TRANSFER_GAS - 1, 1),
        ];
        let receipts = evm.execute(&txs, false).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].status, ReceiptStatus::Success);

        let state = evm.state();
        assert_eq!(state.balance(alice).unwrap(), 1_000_000 - 100 - TRANSFER_GAS);
        assert_eq!(state.balance(bob).unwrap(), 100);
        assert_eq!(state.balance(DRIVER_ADDRESS).unwrap(), TRANSFER_GAS);

        let (block, skipped, all_receipts) = evm.finalize();
        assert_eq!(skipped, vec![1, 2, 3]);
        assert_eq!(all_receipts, receipts);
        assert_eq!(block.gas_used, TRANSFER_GAS);
        assert_ne!(block.root, Hash::ZERO);
    }

    #[test]
    fn test_driver_calls() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbAccountsStore::new(db, CachePolicy::Count(100)));
        let (owner, user) = (Address::from_u64(99), Address::from_u64(1));
        let state = funded_state(&store, &[(owner, 1_000_000), (user, 1_000_000), (DRIVER_ADDRESS, 500)]);
        let mut evm = GalaxyEvmModule::new(owner).start(&BlockCtx::default(), state, &FAKENET_RULES);

        let advance = TxPayload::AdvanceEpochs { num: 1 };
        let mut by_user = Transaction::new_transfer(user, DRIVER_ADDRESS, 0, 0, TRANSFER_GAS, 1);
        by_user.payload = advance.clone();
        let mut by_owner = Transaction::new_transfer(owner, DRIVER_ADDRESS, 0, 0, TRANSFER_GAS, 1);
        by_owner.payload = advance;
        let receipts = evm.execute(&[by_user, by_owner], false).unwrap();
        assert_eq!(receipts[0].status, ReceiptStatus::Failed);
        assert!(receipts[0].logs.is_empty());
        assert_eq!(receipts[1].status, ReceiptStatus::Success);
        assert_eq!(receipts[1].logs[0].topics, vec![ADVANCE_EPOCHS_TOPIC]);
        // The failed call still pays its fee
        assert_eq!(evm.state().nonce(user).unwrap(), 1);

        let internal = vec![
            Transaction::new_internal(0, TxPayload::SetValidator { id: 5, weight: 10, pubkey: vec![] }),
            Transaction::new_internal(1, TxPayload::DistributeFees { rewards: vec![(Address::from_validator(5), 300)] }),
            Transaction::new_internal(1, TxPayload::DeactivateValidator { id: 5 }),
        ];
        let receipts = evm.execute(&internal, true).unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].logs[0].topics, vec![SET_VALIDATOR_TOPIC]);
        assert_eq!(evm.state().balance(Address::from_validator(5)).unwrap(), 300);
        assert_eq!(evm.state().balance(DRIVER_ADDRESS).unwrap(), 500 + 2 * TRANSFER_GAS - 300);

        let (block, skipped, _) = evm.finalize();
        assert_eq!(skipped, vec![4]);
        assert_eq!(block.internal_txs.len(), 2);
    }

    #[test]
    fn test_commit_and_root() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbAccountsStore::new(db, CachePolicy::Count(100)));
        let alice = Address::from_u64(1);
        let clean = StateDb::new(store.clone(), Hash::from_u64_word(7));
        assert_eq!(clean.calc_root(), Hash::from_u64_word(7));

        let state = funded_state(&store, &[(alice, 10)]);
        let expected = state.calc_root();
        assert_eq!(funded_state(&store, &[(alice, 10)]).calc_root(), expected);
        assert_eq!(state.commit().unwrap(), expected);
        assert_eq!(store.get(alice).unwrap(), Account { balance: 10, nonce: 0 });
    }
}
