use super::{BusyFlags, ProcessingCounters, exclusive::InFlightGuard};
use crate::{
    consensus::storage::ConsensusStorage,
    errors::{BlockProcError, BlockProcResult},
    model::stores::{
        blocks::BlocksStore,
        events::EventsStoreReader,
        states::{StatesStore, StatesStoreReader},
    },
    processes::{blockproc::BlockProcessor, eventcheck::Checkers},
};
use crossbeam_channel::Receiver;
use galaxy_consensus_core::{api::ConfirmedBatch, block::BlockCtx, llr::FullEpochRecord};
use galaxy_core::{debug, error, info, time::Stopwatch, trace, warn};
use galaxy_database::prelude::StoreResultExt;
use std::sync::{Arc, atomic::Ordering};

pub enum BlockProcessingMessage {
    Exit,
    Process(BlockTask),
}

/// A confirmed batch on its way to the block worker. The task counts as in flight until it is dropped
pub struct BlockTask {
    pub batch: ConfirmedBatch,
    _in_flight: InFlightGuard,
}

impl BlockTask {
    pub fn new(batch: ConfirmedBatch, in_flight: InFlightGuard) -> Self {
        Self { batch, _in_flight: in_flight }
    }
}

/// Turns confirmed batches into blocks, one at a time and in the order they were confirmed
pub struct BlockWorker {
    receiver: Receiver<BlockProcessingMessage>,
    storage: Arc<ConsensusStorage>,
    processor: BlockProcessor,
    checkers: Arc<Checkers>,
    busy: Arc<BusyFlags>,
    counters: Arc<ProcessingCounters>,
}

impl BlockWorker {
    pub fn new(
        receiver: Receiver<BlockProcessingMessage>,
        storage: Arc<ConsensusStorage>,
        processor: BlockProcessor,
        checkers: Arc<Checkers>,
        busy: Arc<BusyFlags>,
        counters: Arc<ProcessingCounters>,
    ) -> Self {
        Self { receiver, storage, processor, checkers, busy, counters }
    }

    pub fn worker(self: &Arc<BlockWorker>) {
        while let Ok(msg) = self.receiver.recv() {
            match msg {
                BlockProcessingMessage::Exit => break,
                BlockProcessingMessage::Process(task) => {
                    self.busy.set_block_busy(true);
                    if let Err(err) = self.process_batch(&task.batch) {
                        error!("Failed processing the batch decided by {}: {}", task.batch.atropos, err);
                    }
                    self.busy.set_block_busy(false);
                }
            };
        }
        trace!("block worker exiting");
    }

    fn process_batch(&self, batch: &ConfirmedBatch) -> BlockProcResult<()> {
        let _swo = Stopwatch::<500>::with_threshold("process_batch op");
        let (bs, es) = {
            let states = self.storage.states_store.read();
            (states.get_block_state()?, states.get_epoch_state()?)
        };
        // The epoch may have been sealed by an earlier batch of the same feed
        if batch.epoch != es.epoch {
            warn!("Discarding the batch decided by {} of epoch {}, the current epoch is {}", batch.atropos, batch.epoch, es.epoch);
            self.counters.batches_discarded.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let atropos =
            self.storage.events_store.get(batch.atropos).optional()?.ok_or(BlockProcError::MissingEvent(batch.atropos))?;
        let last = bs.last_block;
        let time = if atropos.creation_time > last.time { atropos.creation_time } else { last.time + 1 };
        let ctx = BlockCtx { idx: last.idx + 1, time, atropos: batch.atropos };

        let processed = self.processor.process(ctx, batch, &bs, &es)?;

        let mut states = self.storage.states_store.write();
        match processed.executed {
            Some(executed) => {
                let root = executed.statedb.commit()?;
                debug_assert_eq!(root, executed.block.root);
                debug!(
                    "Block {} with {} events and {} txs, gas used {}",
                    ctx.idx,
                    batch.events.len(),
                    executed.block.txs.len(),
                    executed.block.gas_used
                );
                self.storage.blocks_store.insert(Arc::new(executed.block), Arc::new(executed.receipts))?;
                self.counters.blocks_processed.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.counters.blocks_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
        states.set_block_state(Arc::new(processed.block_state.clone()))?;

        if let Some(sealed) = processed.sealed_epoch {
            states.set_epoch_state(Arc::new(sealed.clone()))?;
            states.set_history(Arc::new(FullEpochRecord { block_state: processed.block_state, epoch_state: sealed.clone() }))?;
            drop(states);
            self.checkers.on_new_epoch(&sealed);
            self.counters.epochs_sealed.fetch_add(1, Ordering::Relaxed);
            info!("Sealed epoch {} at block {}, the next epoch has {} validators", es.epoch, ctx.idx, sealed.validators.len());
        }
        Ok(())
    }
}
