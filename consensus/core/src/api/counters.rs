use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct ProcessingCounters {
    pub events_received: AtomicU64,
    pub events_accepted: AtomicU64,
    pub events_rejected: AtomicU64,
    pub blocks_processed: AtomicU64,
    pub blocks_skipped: AtomicU64,
    pub batches_discarded: AtomicU64,
    pub epochs_sealed: AtomicU64,
    pub flushes: AtomicU64,
}

impl ProcessingCounters {
    pub fn snapshot(&self) -> ProcessingCountersSnapshot {
        ProcessingCountersSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_skipped: self.blocks_skipped.load(Ordering::Relaxed),
            batches_discarded: self.batches_discarded.load(Ordering::Relaxed),
            epochs_sealed: self.epochs_sealed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessingCountersSnapshot {
    pub events_received: u64,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub blocks_processed: u64,
    pub blocks_skipped: u64,
    pub batches_discarded: u64,
    pub epochs_sealed: u64,
    pub flushes: u64,
}

impl core::ops::Sub for &ProcessingCountersSnapshot {
    type Output = ProcessingCountersSnapshot;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            events_received: self.events_received.saturating_sub(rhs.events_received),
            events_accepted: self.events_accepted.saturating_sub(rhs.events_accepted),
            events_rejected: self.events_rejected.saturating_sub(rhs.events_rejected),
            blocks_processed: self.blocks_processed.saturating_sub(rhs.blocks_processed),
            blocks_skipped: self.blocks_skipped.saturating_sub(rhs.blocks_skipped),
            batches_discarded: self.batches_discarded.saturating_sub(rhs.batches_discarded),
            epochs_sealed: self.epochs_sealed.saturating_sub(rhs.epochs_sealed),
            flushes: self.flushes.saturating_sub(rhs.flushes),
        }
    }
}
