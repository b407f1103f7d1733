pub mod storage;
pub mod test_consensus;

use crate::{
    errors::{ConsensusError, ConsensusResult, LlrError},
    model::stores::{
        blocks::BlocksStoreReader,
        events::{EventsStore, EventsStoreReader},
        highest_before::HighestBeforeStoreReader,
        states::{StatesStore, StatesStoreReader},
    },
    pipeline::{
        BusyFlags, ProcessingCounters,
        block_worker::{BlockProcessingMessage, BlockTask, BlockWorker},
        emitter::{Emitter, TxPool},
        exclusive::{ExclusiveAccess, ExclusiveCtx},
        flusher::Flusher,
        monitor::ConsensusMonitor,
    },
    processes::{
        adapter::{feed_engine, seal_epoch},
        blockproc::{BlockProcModules, BlockProcessor},
        dagidx::DagIndex,
        eventcheck::Checkers,
        llr::LlrProcessor,
        quorum::QuorumEngine,
    },
};
use crossbeam_channel::{Sender as CrossbeamSender, unbounded as unbounded_crossbeam};
use galaxy_consensus_core::{
    BlockIndex, Epoch, Timestamp, ValidatorId,
    api::ConsensusEngine,
    block::Block,
    config::{Config, genesis::Genesis},
    dag::HighestBefore,
    errors::event::EventError,
    event::{Event, EventId, MutableEvent, calc_gas_power_used},
    llr::{BlockVotes, EpochVote, FullBlockRecord, FullEpochRecord},
    state::{BlockState, EpochState},
    tx::Transaction,
    validators::Validators,
};
use galaxy_core::{core::Core, debug, error, info, service::Service, time::unix_now, trace};
use galaxy_database::prelude::{DB, StoreResultExt};
use parking_lot::Mutex;
use secp256k1::Keypair;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use self::storage::ConsensusStorage;

const CONSENSUS: &str = "consensus";

/// State mutated only under exclusive access
pub struct ProcessingState {
    engine: Box<dyn ConsensusEngine>,
    dag_index: DagIndex,
    /// The epoch the engine and the index were last reset for
    epoch: Epoch,
}

pub struct Consensus {
    // Config
    config: Arc<Config>,

    // Storage
    storage: Arc<ConsensusStorage>,

    // Processing
    checkers: Arc<Checkers>,
    access: Arc<ExclusiveAccess<ProcessingState>>,
    llr: LlrProcessor,
    block_sender: CrossbeamSender<BlockProcessingMessage>,
    block_worker: Arc<BlockWorker>,
    flusher: Arc<Flusher<ProcessingState>>,
    monitor: Arc<ConsensusMonitor>,
    emitters: Mutex<Vec<Arc<Emitter>>>,

    // Handles of threads joined on shutdown
    emitter_handles: Mutex<Vec<JoinHandle<()>>>,
    background_handles: Mutex<Vec<JoinHandle<()>>>,

    busy: Arc<BusyFlags>,
    closed: AtomicBool,

    // Counters
    counters: Arc<ProcessingCounters>,
}

impl Consensus {
    /// Opens the consensus over `db`. Genesis is applied only if the database is empty
    pub fn new(db: Arc<DB>, config: Arc<Config>, genesis: &Genesis) -> ConsensusResult<Self> {
        let storage = ConsensusStorage::new(db, &config);
        if !storage.is_initialized()? {
            storage.apply_genesis(genesis)?;
        }
        let es = storage.epoch_state()?;

        let thread_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.perf.heavy_check_threads)
                .thread_name(|i| format!("heavy-check-{i}"))
                .build()
                .unwrap(),
        );
        let checkers = Arc::new(Checkers::new(
            &es,
            storage.events_store.clone(),
            thread_pool,
            config.perf.heavy_check_batch_threshold,
        ));

        let dag_index = DagIndex::new(
            es.validators.clone(),
            storage.highest_before_store.clone(),
            storage.events_store.lookup(),
            config.enable_sanity_checks,
        );
        let engine: Box<dyn ConsensusEngine> = Box::new(QuorumEngine::new(es.epoch, es.validators.clone()));
        let access = Arc::new(ExclusiveAccess::new(ProcessingState { engine, dag_index, epoch: es.epoch }));

        let busy = Arc::new(BusyFlags::default());
        let counters = Arc::new(ProcessingCounters::default());

        let (block_sender, block_receiver) = unbounded_crossbeam();
        let processor =
            BlockProcessor::new(BlockProcModules::new(config.driver_owner), storage.events_store.clone(), storage.accounts_store.clone());
        let block_worker = Arc::new(BlockWorker::new(
            block_receiver,
            storage.clone(),
            processor,
            checkers.clone(),
            busy.clone(),
            counters.clone(),
        ));
        let flusher = Arc::new(Flusher::new(access.clone(), storage.clone(), busy.clone(), counters.clone(), config.perf.flush_period));
        let llr = LlrProcessor::new(storage.llr_store.clone(), storage.states_store.clone(), storage.blocks_store.clone());

        info!("Consensus opened at epoch {} with {} validators", es.epoch, es.validators.len());

        Ok(Self {
            monitor: Arc::new(ConsensusMonitor::new(counters.clone())),
            config,
            storage,
            checkers,
            access,
            llr,
            block_sender,
            block_worker,
            flusher,
            emitters: Default::default(),
            emitter_handles: Default::default(),
            background_handles: Default::default(),
            busy,
            closed: AtomicBool::new(false),
            counters,
        })
    }

    /// Registers a local validator identity. Its emitter starts with the processors
    pub fn add_emitter(&self, creator: ValidatorId, keypair: Keypair) -> Arc<TxPool> {
        let emitter = Arc::new(Emitter::new(creator, keypair, self.config.perf.emit_interval));
        let pool = emitter.pool().clone();
        self.emitters.lock().push(emitter);
        pool
    }

    /// Spawns all processing threads. Returns the handle of the block worker, which exits last
    pub fn run_processors(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        if self.closed.load(Ordering::SeqCst) {
            return vec![];
        }
        let mut background = self.background_handles.lock();
        if self.config.enable_flusher {
            let flusher = self.flusher.clone();
            background.push(thread::Builder::new().name("flusher".to_string()).spawn(move || flusher.worker()).unwrap());
        }
        let monitor = self.monitor.clone();
        background.push(thread::Builder::new().name("consensus-monitor".to_string()).spawn(move || monitor.worker()).unwrap());

        let mut emitter_handles = self.emitter_handles.lock();
        for emitter in self.emitters.lock().iter().cloned() {
            let consensus = self.clone();
            emitter_handles.push(
                thread::Builder::new()
                    .name(format!("emitter-{}", emitter.creator()))
                    .spawn(move || emitter.worker(consensus))
                    .unwrap(),
            );
        }

        let block_worker = self.block_worker.clone();
        vec![thread::Builder::new().name("block-worker".to_string()).spawn(move || block_worker.worker()).unwrap()]
    }

    /// Stops the emitters and the flusher, commits everything and lets the block worker exit.
    /// Calling it more than once has no effect
    pub fn shutdown(&self) {
        self.emitters.lock().iter().for_each(|emitter| emitter.signal_exit());
        for handle in self.emitter_handles.lock().drain(..) {
            let _ = handle.join();
        }

        self.flusher.signal_exit();
        self.monitor.signal_exit();
        for handle in self.background_handles.lock().drain(..) {
            let _ = handle.join();
        }

        let closed_now = self.access.run(|_| {
            if self.closed.swap(true, Ordering::SeqCst) {
                return false;
            }
            let flushed = self.storage.commit();
            debug!("Final commit of {} entries", flushed);
            true
        });
        if closed_now {
            let _ = self.block_sender.send(BlockProcessingMessage::Exit);
            info!("Consensus closed");
        }
    }

    /// Runs `f` under exclusive access, once the engine and the index follow the stored epoch
    /// and the pending writes are committed if they grew too large
    fn run_exclusive<R>(&self, f: impl FnOnce(&mut ExclusiveCtx<ProcessingState>) -> ConsensusResult<R>) -> ConsensusResult<R> {
        self.access.run(|ctx| {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ConsensusError::ShuttingDown);
            }
            self.sync_epoch(ctx.state)?;
            if self.storage.is_commit_needed(100, 100) {
                self.storage.commit();
                self.counters.flushes.fetch_add(1, Ordering::Relaxed);
            }
            f(ctx)
        })
    }

    fn sync_epoch(&self, state: &mut ProcessingState) -> ConsensusResult<()> {
        let es = self.storage.epoch_state()?;
        if es.epoch != state.epoch {
            debug!("Resetting the engine from epoch {} to {}", state.epoch, es.epoch);
            self.reset_to(state, &es);
        }
        Ok(())
    }

    fn reset_to(&self, state: &mut ProcessingState, es: &EpochState) {
        seal_epoch(
            state.engine.as_mut(),
            &mut state.dag_index,
            es,
            self.storage.highest_before_store.clone(),
            self.storage.events_store.lookup(),
        );
        state.epoch = es.epoch;
    }

    /// Validates, stores and orders a single event. A rejected event leaves no trace
    pub fn process_event(&self, event: Arc<Event>) -> ConsensusResult<()> {
        let _busy = self.busy.event_guard();
        self.counters.events_received.fetch_add(1, Ordering::Relaxed);

        let result = self
            .checkers
            .validate(&event)
            .map_err(ConsensusError::from)
            .and_then(|_| self.run_exclusive(|ctx| self.insert_validated(ctx, &event)));

        match &result {
            Ok(()) => {
                self.counters.events_accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(ConsensusError::Rejected(err)) => {
                self.counters.events_rejected.fetch_add(1, Ordering::Relaxed);
                debug!("Event {} rejected at {} stage: {}", event.id(), err.stage(), err);
            }
            Err(ConsensusError::ShuttingDown) => {}
            Err(err) => error!("Processing event {} failed: {}", event.id(), err),
        }
        result
    }

    fn insert_validated(&self, ctx: &mut ExclusiveCtx<ProcessingState>, event: &Arc<Event>) -> ConsensusResult<()> {
        // Both may have changed since the lock-free validation
        if event.epoch != ctx.state.epoch {
            return Err(EventError::WrongEpoch(ctx.state.epoch, event.epoch).into());
        }
        if self.storage.events_store.has(event.id())? {
            return Err(EventError::AlreadyKnown(event.id()).into());
        }

        let vector = Arc::new(ctx.state.dag_index.calc_highest_before(event)?);
        let batches = feed_engine(ctx.state.engine.as_mut(), &ctx.state.dag_index, event, vector.clone())?;
        // The engine holds the event from here on, so the index and the store must follow
        self.store_accepted(&ctx.state.dag_index, event, vector)
            .unwrap_or_else(|err| panic!("storing accepted event {} failed: {err}", event.id()));
        for batch in batches {
            let task = BlockTask::new(batch, ctx.register_task());
            self.block_sender
                .send(BlockProcessingMessage::Process(task))
                .map_err(|_| ConsensusError::Consistency("block worker is not running".to_string()))?;
        }
        Ok(())
    }

    fn store_accepted(&self, dag_index: &DagIndex, event: &Arc<Event>, vector: Arc<HighestBefore>) -> ConsensusResult<()> {
        dag_index.insert(event, vector)?;
        self.storage.events_store.insert(event.clone())?;
        Ok(())
    }

    /// Builds an unsigned event of `creator` on top of its own head and the heads of other validators.
    /// Transactions are taken from the front of `pending` as long as the gas power allows
    pub fn create_event(&self, creator: ValidatorId, pending: &mut VecDeque<Transaction>) -> ConsensusResult<MutableEvent> {
        let es = self.storage.epoch_state()?;
        let events = &self.storage.events_store;
        let max_parents = es.rules.dag.max_parents as usize;

        let mut parents = Vec::with_capacity(max_parents);
        if let Some(head) = events.get_head(es.epoch, creator).optional()? {
            parents.push(head);
        }
        for head in events.heads(es.epoch)? {
            if parents.len() >= max_parents {
                break;
            }
            if events.get(head)?.creator != creator {
                parents.push(head);
            }
        }
        self.build_event(creator, &parents, unix_now(), pending)
    }

    /// Builds an unsigned event with the given parents, the self-parent (if any) first
    pub fn build_event(
        &self,
        creator: ValidatorId,
        parents: &[EventId],
        time: Timestamp,
        pending: &mut VecDeque<Transaction>,
    ) -> ConsensusResult<MutableEvent> {
        let es = self.storage.epoch_state()?;
        if !es.validators.exists(creator) {
            return Err(EventError::UnknownCreator(creator).into());
        }
        let parents = parents
            .iter()
            .map(|id| self.storage.events_store.get(*id).optional()?.ok_or(ConsensusError::Rejected(EventError::UnknownParent(*id))))
            .collect::<ConsensusResult<Vec<_>>>()?;

        let self_parent = parents.first().filter(|p| p.creator == creator);
        let seq = self_parent.map_or(1, |p| p.seq + 1);
        let lamport = parents.iter().map(|p| p.lamport).max().unwrap_or(0) + 1;
        let time = parents.iter().map(|p| p.creation_time).fold(time, Timestamp::max);

        let economy = &es.rules.economy;
        let available = self.checkers.available_gas_power(creator, time, self_parent.map(|p| p.as_ref()));
        let mut used = calc_gas_power_used(parents.len(), 0, &[], economy);
        if used > available {
            return Err(EventError::InsufficientGasPower(used, available).into());
        }
        let mut txs = Vec::new();
        while let Some(tx) = pending.front() {
            let next = used.saturating_add(tx.gas);
            if txs.len() >= es.rules.dag.max_txs as usize || next > available || next > economy.max_event_gas {
                break;
            }
            used = next;
            if let Some(tx) = pending.pop_front() {
                txs.push(tx);
            }
        }

        Ok(MutableEvent {
            epoch: es.epoch,
            seq,
            creator,
            lamport,
            creation_time: time,
            parents: parents.iter().map(|p| p.id()).collect(),
            gas_power_left: available - used,
            gas_power_used: used,
            txs,
            ..Default::default()
        })
    }

    /// Adopts the decided record of a future epoch, dropping the local progress of the current one
    pub fn switch_epoch_to(&self, epoch: Epoch) -> ConsensusResult<()> {
        self.run_exclusive(|ctx| {
            let current = ctx.state.epoch;
            if epoch <= current {
                return Err(ConsensusError::EpochNotAhead(epoch, current));
            }
            let record = self.decided_epoch_record(epoch)?;
            {
                let mut states = self.storage.states_store.write();
                states.set_block_state(Arc::new(record.block_state.clone()))?;
                states.set_epoch_state(Arc::new(record.epoch_state.clone()))?;
            }
            self.reset_to(ctx.state, &record.epoch_state);
            self.checkers.on_new_epoch(&record.epoch_state);
            info!("Switched from epoch {} to epoch {}", current, epoch);
            Ok(())
        })
    }

    fn decided_epoch_record(&self, epoch: Epoch) -> ConsensusResult<Arc<FullEpochRecord>> {
        let not_decided = || LlrError::NotDecided(format!("epoch {}", epoch));
        let decided = self.storage.llr_store.get_decided_epoch(epoch)?.ok_or_else(not_decided)?;
        let record = self.storage.states_store.read().get_history(epoch).optional()?.ok_or_else(not_decided)?;
        if record.hash() != decided {
            return Err(LlrError::Mismatch(decided, record.hash()).into());
        }
        Ok(record)
    }

    /// Returns the blocks whose record got decided by these votes
    pub fn process_block_votes(&self, votes: &BlockVotes) -> ConsensusResult<Vec<BlockIndex>> {
        self.run_exclusive(|_| Ok(self.llr.process_block_votes(votes)?))
    }

    /// Returns whether the vote decided the epoch record
    pub fn process_epoch_vote(&self, vote: &EpochVote) -> ConsensusResult<bool> {
        self.run_exclusive(|_| Ok(self.llr.process_epoch_vote(vote)?))
    }

    pub fn process_full_block_record(&self, record: &FullBlockRecord) -> ConsensusResult<()> {
        self.run_exclusive(|_| Ok(self.llr.process_full_block_record(record)?))
    }

    pub fn process_full_epoch_record(&self, record: &FullEpochRecord) -> ConsensusResult<()> {
        self.run_exclusive(|_| Ok(self.llr.process_full_epoch_record(record)?))
    }

    /// Blocks until every block task queued so far is processed
    pub fn wait_for_processing(&self) {
        self.access.run(|_| ())
    }

    /// Heads of the current epoch, one per creator
    pub fn heads(&self) -> ConsensusResult<Vec<EventId>> {
        Ok(self.storage.events_store.heads(self.storage.epoch_state()?.epoch)?)
    }

    pub fn get_event(&self, id: EventId) -> ConsensusResult<Option<Arc<Event>>> {
        Ok(self.storage.events_store.get(id).optional()?)
    }

    pub fn get_highest_before(&self, id: EventId) -> ConsensusResult<Option<Arc<HighestBefore>>> {
        Ok(self.storage.highest_before_store.get(id).optional()?)
    }

    pub fn get_block(&self, idx: BlockIndex) -> ConsensusResult<Option<Arc<Block>>> {
        Ok(self.storage.blocks_store.get_block(idx).optional()?)
    }

    pub fn get_epoch(&self) -> ConsensusResult<Epoch> {
        Ok(self.storage.epoch_state()?.epoch)
    }

    /// The validator set of the current epoch
    pub fn get_validators(&self) -> ConsensusResult<Validators> {
        Ok(self.storage.epoch_state()?.validators.clone())
    }

    pub fn epoch_state(&self) -> ConsensusResult<Arc<EpochState>> {
        Ok(self.storage.epoch_state()?)
    }

    pub fn block_state(&self) -> ConsensusResult<Arc<BlockState>> {
        Ok(self.storage.block_state()?)
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn storage(&self) -> &Arc<ConsensusStorage> {
        &self.storage
    }

    pub fn flusher(&self) -> &Arc<Flusher<ProcessingState>> {
        &self.flusher
    }

    pub fn busy_flags(&self) -> &Arc<BusyFlags> {
        &self.busy
    }

    pub fn counters(&self) -> &Arc<ProcessingCounters> {
        &self.counters
    }
}

impl Service for Consensus {
    fn ident(self: Arc<Consensus>) -> &'static str {
        CONSENSUS
    }

    fn start(self: Arc<Consensus>, _core: Arc<Core>) -> Vec<JoinHandle<()>> {
        trace!("{} starting", CONSENSUS);
        self.run_processors()
    }

    fn stop(self: Arc<Consensus>) {
        trace!("{} stopping", CONSENSUS);
        self.shutdown()
    }
}
