use super::{BusyFlags, ProcessingCounters, exclusive::ExclusiveAccess};
use crate::consensus::storage::ConsensusStorage;
use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use galaxy_core::{debug, trace};
use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

/// The flusher lets pending writes grow beyond the regular thresholds, since the
/// event path commits on its own once they are reached
pub const FLUSHER_PERIOD_PCT: u64 = 120;
pub const FLUSHER_SIZE_PCT: u64 = 100;

/// Commits pending storage writes while the node is idle
pub struct Flusher<T> {
    access: Arc<ExclusiveAccess<T>>,
    storage: Arc<ConsensusStorage>,
    busy: Arc<BusyFlags>,
    counters: Arc<ProcessingCounters>,
    period: Duration,
    quit_sender: Sender<()>,
    quit_receiver: Receiver<()>,
}

impl<T> Flusher<T> {
    pub fn new(
        access: Arc<ExclusiveAccess<T>>,
        storage: Arc<ConsensusStorage>,
        busy: Arc<BusyFlags>,
        counters: Arc<ProcessingCounters>,
        period: Duration,
    ) -> Self {
        let (quit_sender, quit_receiver) = unbounded();
        Self { access, storage, busy, counters, period, quit_sender, quit_receiver }
    }

    pub fn worker(self: &Arc<Self>) {
        let ticker = tick(self.period);
        loop {
            select! {
                recv(ticker) -> _ => {
                    self.try_commit();
                }
                recv(self.quit_receiver) -> _ => break,
            }
        }
        trace!("flusher exiting");
    }

    pub fn signal_exit(&self) {
        let _ = self.quit_sender.send(());
    }

    /// Commits if nothing is being processed and the thresholds are exceeded. Returns whether it committed
    pub fn try_commit(&self) -> bool {
        if self.busy.is_busy() || !self.storage.is_commit_needed(FLUSHER_PERIOD_PCT, FLUSHER_SIZE_PCT) {
            return false;
        }
        self.access.run(|_| {
            // Intake may have started while we were waiting
            if self.busy.is_busy() || !self.storage.is_commit_needed(FLUSHER_PERIOD_PCT, FLUSHER_SIZE_PCT) {
                return false;
            }
            let flushed = self.storage.commit();
            self.counters.flushes.fetch_add(1, Ordering::Relaxed);
            debug!("Flusher committed {} entries", flushed);
            true
        })
    }
}
