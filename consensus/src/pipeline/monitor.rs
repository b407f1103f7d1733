use super::ProcessingCounters;
use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use galaxy_core::{info, trace};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically logs processing rates
pub struct ConsensusMonitor {
    counters: Arc<ProcessingCounters>,
    quit_sender: Sender<()>,
    quit_receiver: Receiver<()>,
}

impl ConsensusMonitor {
    pub fn new(counters: Arc<ProcessingCounters>) -> ConsensusMonitor {
        let (quit_sender, quit_receiver) = unbounded();
        ConsensusMonitor { counters, quit_sender, quit_receiver }
    }

    pub fn worker(self: &Arc<ConsensusMonitor>) {
        let ticker = tick(SNAPSHOT_INTERVAL);
        let mut last_snapshot = self.counters.snapshot();
        let mut last_log_time = Instant::now();
        loop {
            select! {
                recv(ticker) -> _ => {}
                recv(self.quit_receiver) -> _ => break,
            }

            let snapshot = self.counters.snapshot();
            if snapshot == last_snapshot {
                // No update, avoid printing useless info
                last_log_time = Instant::now();
                continue;
            }

            let delta = &snapshot - &last_snapshot;
            let now = Instant::now();
            info!(
                "Processed {} events ({} rejected) and {} blocks ({} skipped) in the last {:.2}s; {} epochs sealed, {} commits",
                delta.events_accepted,
                delta.events_rejected,
                delta.blocks_processed,
                delta.blocks_skipped,
                (now - last_log_time).as_secs_f64(),
                delta.epochs_sealed,
                delta.flushes,
            );

            last_snapshot = snapshot;
            last_log_time = now;
        }

        trace!("monitor thread exiting");
    }

    pub fn signal_exit(&self) {
        let _ = self.quit_sender.send(());
    }
}
