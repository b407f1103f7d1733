//! Threads driving the node: event intake runs on the callers' threads, confirmed batches are
//! turned into blocks by the block worker, and the flusher commits the pending storage writes
//! whenever the node is idle.

pub mod block_worker;
pub mod emitter;
pub mod exclusive;
pub mod flusher;
pub mod monitor;

pub use galaxy_consensus_core::api::counters::ProcessingCounters;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Tracks whether any event or block is currently being processed
#[derive(Default)]
pub struct BusyFlags {
    events: AtomicUsize,
    block: AtomicBool,
}

impl BusyFlags {
    /// Marks an event as being processed until the returned guard drops
    pub fn event_guard(&self) -> EventBusyGuard<'_> {
        self.events.fetch_add(1, Ordering::SeqCst);
        EventBusyGuard { flags: self }
    }

    pub fn set_block_busy(&self, busy: bool) {
        self.block.store(busy, Ordering::SeqCst);
    }

    pub fn events_in_process(&self) -> usize {
        self.events.load(Ordering::SeqCst)
    }

    pub fn is_block_busy(&self) -> bool {
        self.block.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.events_in_process() > 0 || self.is_block_busy()
    }
}

pub struct EventBusyGuard<'a> {
    flags: &'a BusyFlags,
}

impl Drop for EventBusyGuard<'_> {
    fn drop(&mut self) {
        self.flags.events.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_flags() {
        let flags = BusyFlags::default();
        assert!(!flags.is_busy());
        {
            let _a = flags.event_guard();
            let _b = flags.event_guard();
            assert_eq!(flags.events_in_process(), 2);
            assert!(flags.is_busy());
        }
        assert!(!flags.is_busy());
        flags.set_block_busy(true);
        assert!(flags.is_busy());
        flags.set_block_busy(false);
        assert!(!flags.is_busy());
    }
}
