//! Turns confirmed batches into blocks. The processor is composed of independent modules,
//! each of them consuming the block and epoch states and handing back updated copies.
//!
//! The order of calls for a single block is fixed:
//!
//! 1. The listener and the execution module are opened on the pre block state
//! 2. Genesis and pre block internal transactions are executed
//! 3. Confirmed events are folded into the aggregator, whose result is handed to the listener
//! 4. User transactions of the events are executed, in event order
//! 5. Post block internal transactions are executed
//! 6. Execution and listener are finalized, and the sealer decides whether the epoch ends

pub mod confirmed;
pub mod evm;
pub mod listener;
pub mod sealer;
pub mod transactors;

use crate::{
    errors::{BlockProcError, BlockProcResult},
    model::stores::{accounts::DbAccountsStore, events::EventsStoreReader},
};
use evm::{EvmBlock, StateDb};
use galaxy_consensus_core::{
    Hash, ValidatorId,
    api::ConfirmedBatch,
    block::{Block, BlockCtx},
    config::params::Rules,
    event::Event,
    state::{BlockState, EpochState},
    tx::{Address, Log, Receipt, ReceiptStatus, Transaction},
};
use galaxy_core::{debug, warn};
use galaxy_database::prelude::StoreResultExt;
use std::{collections::HashMap, sync::Arc};

pub trait TxListener {
    fn on_new_log(&mut self, log: &Log);
    fn on_new_receipt(&mut self, tx: &Transaction, receipt: &Receipt, originator: Option<ValidatorId>);
    fn finalize(&mut self) -> BlockState;
    fn update(&mut self, bs: &BlockState, es: &EpochState);
}

pub trait TxListenerModule: Send + Sync {
    fn start(&self, block: &BlockCtx, bs: &BlockState, es: &EpochState) -> Box<dyn TxListener>;
}

pub trait TxTransactor: Send + Sync {
    fn pop_internal_txs(
        &self,
        block: &BlockCtx,
        bs: &BlockState,
        es: &EpochState,
        sealing: bool,
        statedb: &StateDb,
    ) -> BlockProcResult<Vec<Transaction>>;
}

pub trait SealerProcessor {
    fn epoch_sealing(&self) -> bool;
    fn seal_epoch(&mut self) -> (BlockState, EpochState);
    fn update(&mut self, bs: &BlockState, es: &EpochState);
}

pub trait SealerModule: Send + Sync {
    fn start(&self, block: &BlockCtx, bs: &BlockState, es: &EpochState) -> Box<dyn SealerProcessor>;
}

pub trait ConfirmedEventsProcessor {
    fn process_confirmed_event(&mut self, event: &Event);
    fn finalize(&mut self, block: &BlockCtx, skipped: bool) -> BlockState;
}

pub trait ConfirmedEventsModule: Send + Sync {
    fn start(&self, bs: &BlockState, es: &EpochState) -> Box<dyn ConfirmedEventsProcessor>;
}

pub trait EvmProcessor {
    /// Executes `txs` and returns the receipts of those which were not skipped
    fn execute(&mut self, txs: &[Transaction], internal: bool) -> BlockProcResult<Vec<Receipt>>;

    fn state(&self) -> &StateDb;

    /// Returns the block, the positions of skipped transactions and all receipts
    fn finalize(self: Box<Self>) -> (EvmBlock, Vec<u32>, Vec<Receipt>);
}

pub trait EvmModule: Send + Sync {
    fn start(&self, block: &BlockCtx, statedb: StateDb, rules: &Rules) -> Box<dyn EvmProcessor>;
}

/// The set of modules a [`BlockProcessor`] is composed of
#[derive(Clone)]
pub struct BlockProcModules {
    pub listener: Arc<dyn TxListenerModule>,
    pub genesis_transactor: Arc<dyn TxTransactor>,
    pub pre_transactor: Arc<dyn TxTransactor>,
    pub post_transactor: Arc<dyn TxTransactor>,
    pub sealer: Arc<dyn SealerModule>,
    pub confirmed_events: Arc<dyn ConfirmedEventsModule>,
    pub evm: Arc<dyn EvmModule>,
}

impl BlockProcModules {
    pub fn new(driver_owner: Address) -> Self {
        Self {
            listener: Arc::new(listener::DriverTxListenerModule),
            genesis_transactor: Arc::new(transactors::GenesisTransactor),
            pre_transactor: Arc::new(transactors::PreBlockTransactor),
            post_transactor: Arc::new(transactors::PostBlockTransactor),
            sealer: Arc::new(sealer::EpochsSealerModule),
            confirmed_events: Arc::new(confirmed::ValidatorEventsModule),
            evm: Arc::new(evm::GalaxyEvmModule::new(driver_owner)),
        }
    }
}

pub struct ExecutedBlock {
    pub block: Block,
    pub receipts: Vec<Receipt>,
    /// Account changes of the block, not yet written
    pub statedb: StateDb,
}

pub struct ProcessedBlock {
    /// `None` if the block was skipped as empty
    pub executed: Option<ExecutedBlock>,
    pub block_state: BlockState,
    /// The state of the next epoch, if this block sealed the current one
    pub sealed_epoch: Option<EpochState>,
}

pub struct BlockProcessor {
    modules: BlockProcModules,
    events: Arc<dyn EventsStoreReader + Send + Sync>,
    accounts: Arc<DbAccountsStore>,
}

fn feed_listener(listener: &mut dyn TxListener, txs: &[Transaction], receipts: &[Receipt], originators: &HashMap<Hash, ValidatorId>) {
    let by_hash: HashMap<Hash, &Transaction> = txs.iter().map(|tx| (tx.hash(), tx)).collect();
    for receipt in receipts {
        receipt.logs.iter().for_each(|log| listener.on_new_log(log));
        if let Some(tx) = by_hash.get(&receipt.tx_hash) {
            listener.on_new_receipt(tx, receipt, originators.get(&receipt.tx_hash).copied());
        }
    }
}

impl BlockProcessor {
    pub fn new(modules: BlockProcModules, events: Arc<dyn EventsStoreReader + Send + Sync>, accounts: Arc<DbAccountsStore>) -> Self {
        Self { modules, events, accounts }
    }

    fn load_events(&self, batch: &ConfirmedBatch, es: &EpochState) -> BlockProcResult<Vec<Arc<Event>>> {
        batch
            .events
            .iter()
            .map(|id| {
                let event = self.events.get(*id).optional()?.ok_or(BlockProcError::MissingEvent(*id))?;
                if !es.validators.exists(event.creator) {
                    return Err(BlockProcError::UnknownCreator(*id, event.creator));
                }
                Ok(event)
            })
            .collect()
    }

    /// Processes one confirmed batch on top of `bs` and `es`. Neither state nor storage is touched,
    /// the caller persists the returned result
    pub fn process(&self, ctx: BlockCtx, batch: &ConfirmedBatch, bs: &BlockState, es: &EpochState) -> BlockProcResult<ProcessedBlock> {
        let events = self.load_events(batch, es)?;

        let mut bs = bs.clone();
        for cheater in batch.cheaters.iter() {
            if !bs.epoch_cheaters.contains(cheater) {
                bs.epoch_cheaters.push(*cheater);
            }
        }

        let mut user_txs = Vec::new();
        let mut originators = HashMap::new();
        for event in events.iter() {
            for tx in event.txs.iter() {
                originators.entry(tx.hash()).or_insert(event.creator);
                user_txs.push(tx.clone());
            }
        }

        let statedb = StateDb::new(self.accounts.clone(), bs.finalized_state_root);
        let mut listener = self.modules.listener.start(&ctx, &bs, es);
        let mut evm = self.modules.evm.start(&ctx, statedb, &es.rules);
        let mut sealer = self.modules.sealer.start(&ctx, &bs, es);
        let sealing = sealer.epoch_sealing();

        let mut pre_txs = self.modules.genesis_transactor.pop_internal_txs(&ctx, &bs, es, sealing, evm.state())?;
        let receipts = evm.execute(&pre_txs, true)?;
        feed_listener(listener.as_mut(), &pre_txs, &receipts, &originators);
        let txs = self.modules.pre_transactor.pop_internal_txs(&ctx, &bs, es, sealing, evm.state())?;
        let receipts = evm.execute(&txs, true)?;
        feed_listener(listener.as_mut(), &txs, &receipts, &originators);
        pre_txs.extend(txs);

        let mut aggregator = self.modules.confirmed_events.start(&listener.finalize(), es);
        events.iter().for_each(|event| aggregator.process_confirmed_event(event));

        let skip = pre_txs.is_empty()
            && user_txs.is_empty()
            && !sealing
            && ctx.time < bs.last_block.time.saturating_add(es.rules.blocks.max_empty_block_skip_period);
        if skip {
            debug!("Skipping empty block {} with atropos {}", ctx.idx, ctx.atropos);
            let block_state = aggregator.finalize(&ctx, true);
            return Ok(ProcessedBlock { executed: None, block_state, sealed_epoch: None });
        }

        let aggregated = aggregator.finalize(&ctx, false);
        listener.update(&aggregated, es);

        let receipts = evm.execute(&user_txs, false)?;
        feed_listener(listener.as_mut(), &user_txs, &receipts, &originators);

        let current = listener.finalize();
        sealer.update(&current, es);
        let sealing = sealer.epoch_sealing();
        let post_txs = self.modules.post_transactor.pop_internal_txs(&ctx, &current, es, sealing, evm.state())?;
        let receipts = evm.execute(&post_txs, true)?;
        for receipt in receipts.iter().filter(|r| r.status != ReceiptStatus::Success) {
            warn!("Post block internal transaction {} of block {} failed", receipt.tx_hash, ctx.idx);
        }
        feed_listener(listener.as_mut(), &post_txs, &receipts, &originators);

        let (evm_block, skipped_txs, receipts) = evm.finalize();
        let mut block_state = listener.finalize();
        block_state.finalized_state_root = evm_block.root;
        block_state.last_block = ctx;
        block_state.cheaters_written = block_state.epoch_cheaters.len() as u32;

        let block = Block {
            idx: ctx.idx,
            time: ctx.time,
            atropos: ctx.atropos,
            events: batch.events.clone(),
            txs: evm_block.txs.iter().map(|tx| tx.hash()).collect(),
            internal_txs: evm_block.internal_txs,
            skipped_txs,
            gas_used: evm_block.gas_used,
            root: evm_block.root,
        };

        sealer.update(&block_state, es);
        let sealed_epoch = if sealer.epoch_sealing() {
            let (sealed_bs, sealed_es) = sealer.seal_epoch();
            block_state = sealed_bs;
            Some(sealed_es)
        } else {
            None
        };

        Ok(ProcessedBlock { executed: Some(ExecutedBlock { block, receipts, statedb: evm_block.state }), block_state, sealed_epoch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::stores::{
            accounts::Account,
            events::{DbEventsStore, EventsStore},
        },
        test_helpers::{TestDag, new_temp_flushable},
    };
    use evm::TRANSFER_GAS;
    use galaxy_consensus_core::state::ValidatorBlockState;
    use galaxy_database::prelude::{CachePolicy, DirectDbWriter, FlushableDb};

    struct Setup {
        dag: TestDag,
        events: Arc<DbEventsStore>,
        processor: BlockProcessor,
        es: EpochState,
        bs: BlockState,
    }

    fn setup(db: Arc<FlushableDb>) -> Setup {
        let mut dag = TestDag::new(1);
        let es = dag.epoch_state(&[(1, 1), (2, 1)]);
        let bs = BlockState {
            validator_states: vec![ValidatorBlockState::default(); 2],
            next_validator_profiles: es.validator_profiles.clone(),
            ..Default::default()
        };
        let events = Arc::new(DbEventsStore::new(db.clone(), CachePolicy::Count(100)));
        let accounts = Arc::new(DbAccountsStore::new(db.clone(), CachePolicy::Count(100)));
        accounts.set(DirectDbWriter::new(&db), Address::from_u64(1), Account { balance: 1_000_000, nonce: 0 }).unwrap();
        let processor = BlockProcessor::new(BlockProcModules::new(Address::from_u64(99)), events.clone(), accounts);
        Setup { dag, events, processor, es, bs }
    }

    fn batch_of(setup: &Setup, events: &[Arc<Event>]) -> (BlockCtx, ConfirmedBatch) {
        events.iter().for_each(|event| setup.events.insert(event.clone()).unwrap());
        let atropos = events.last().unwrap();
        let ctx = BlockCtx { idx: setup.bs.last_block.idx + 1, time: atropos.creation_time, atropos: atropos.id() };
        (ctx, ConfirmedBatch { epoch: 1, atropos: atropos.id(), events: events.iter().map(|e| e.id()).collect(), cheaters: vec![] })
    }

    #[test]
    fn test_first_block_is_deterministic() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        let tx = Transaction::new_transfer(Address::from_u64(1), Address::from_u64(2), 0, 50, TRANSFER_GAS, 1);
        let a1 = s.dag.add_with(1, &[], |e| e.txs = vec![tx.clone()]);
        let b1 = s.dag.add(2, &[a1.id()]);
        let (ctx, batch) = batch_of(&s, &[a1.clone(), b1.clone()]);

        let first = s.processor.process(ctx, &batch, &s.bs, &s.es).unwrap();
        let second = s.processor.process(ctx, &batch, &s.bs, &s.es).unwrap();
        assert_eq!(first.block_state, second.block_state);
        let (block, block2) = (&first.executed.as_ref().unwrap().block, &second.executed.as_ref().unwrap().block);
        assert_eq!(block, block2);

        // Genesis registration precedes the user transaction
        assert_eq!(block.internal_txs.len(), 2);
        assert_eq!(block.txs.len(), 3);
        assert_eq!(block.txs[2], tx.hash());
        assert!(block.skipped_txs.is_empty());
        assert_eq!(block.gas_used, TRANSFER_GAS);
        assert_eq!(first.block_state.last_block, ctx);
        assert_eq!(first.block_state.finalized_state_root, block.root);
        assert_eq!(first.block_state.epoch_gas, a1.gas_power_used + b1.gas_power_used);
        let a = s.es.validators.get_idx(1).unwrap();
        assert_eq!(first.block_state.validator_states[a].originated, TRANSFER_GAS);
        assert!(first.sealed_epoch.is_none());
    }

    #[test]
    fn test_empty_block_is_skipped() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        s.es.rules.blocks.max_empty_block_skip_period = 1_000_000;
        s.bs.last_block = BlockCtx { idx: 5, time: 1, ..Default::default() };
        let a1 = s.dag.add(1, &[]);
        let (ctx, batch) = batch_of(&s, &[a1.clone()]);

        let processed = s.processor.process(ctx, &batch, &s.bs, &s.es).unwrap();
        assert!(processed.executed.is_none());
        assert_eq!(processed.block_state.last_block, s.bs.last_block);
        assert_eq!(processed.block_state.epoch_gas, a1.gas_power_used);

        // The same batch is not skipped once the skip period elapsed
        s.es.rules.blocks.max_empty_block_skip_period = 0;
        let processed = s.processor.process(ctx, &batch, &s.bs, &s.es).unwrap();
        assert_eq!(processed.executed.unwrap().block.idx, 6);
    }

    #[test]
    fn test_sealing_leaves_input_states_intact() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        s.bs.last_block = BlockCtx { idx: 5, time: 1, ..Default::default() };
        s.bs.advance_epochs = 1;
        let a1 = s.dag.add(1, &[]);
        let (ctx, mut batch) = batch_of(&s, &[a1.clone()]);
        batch.cheaters = vec![2];
        let es_before = s.es.clone();

        let processed = s.processor.process(ctx, &batch, &s.bs, &s.es).unwrap();
        let sealed = processed.sealed_epoch.unwrap();
        assert_eq!(sealed.epoch, 2);
        // The cheater is deactivated by a pre block transaction and left out of the next set
        assert_eq!(sealed.validators.ids(), &[1]);
        assert_eq!(sealed.epoch_start, ctx.time);
        assert_eq!(processed.block_state.advance_epochs, 0);
        assert!(processed.block_state.epoch_cheaters.is_empty());
        assert_eq!(s.es, es_before);
    }

    #[test]
    fn test_missing_event_fails() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        let a1 = s.dag.add(1, &[]);
        let batch = ConfirmedBatch { epoch: 1, atropos: a1.id(), events: vec![a1.id()], cheaters: vec![] };
        let result = s.processor.process(BlockCtx::default(), &batch, &s.bs, &s.es);
        assert!(matches!(result, Err(BlockProcError::MissingEvent(id)) if id == a1.id()));
    }
}
