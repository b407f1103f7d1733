use crate::{db::DB, errors::StoreResult};
use galaxy_core::trace;
use parking_lot::{Mutex, RwLock};
use rocksdb::{Direction, IteratorMode, ReadOptions, WriteBatch};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::Arc,
    time::{Duration, Instant},
};

/// Thresholds for forcing the not yet flushed writes onto disk
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub max_non_flushed_size: usize,
    pub max_non_flushed_period: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_non_flushed_size: 20 * 1024 * 1024, max_non_flushed_period: Duration::from_secs(30 * 60) }
    }
}

#[derive(Default)]
struct Dirty {
    /// `None` marks a pending deletion
    entries: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    size: usize,
}

impl Dirty {
    fn entry_size(key: &[u8], value: &Option<Vec<u8>>) -> usize {
        key.len() + value.as_ref().map_or(0, |v| v.len())
    }

    fn set(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) {
        self.size += Self::entry_size(&key, &value);
        if let Some(prev) = self.entries.get(&key) {
            self.size -= Self::entry_size(&key, prev);
        }
        self.entries.insert(key, value);
    }
}

/// A write-back layer over [`DB`]. All writes land in memory and become durable only
/// through [`FlushableDb::flush`], which applies them as a single atomic write batch.
/// Reads observe the not yet flushed writes first.
pub struct FlushableDb {
    db: Arc<DB>,
    dirty: RwLock<Dirty>,
    last_flush: Mutex<Instant>,
    config: StoreConfig,
}

impl FlushableDb {
    pub fn new(db: Arc<DB>, config: StoreConfig) -> Self {
        Self { db, dirty: Default::default(), last_flush: Mutex::new(Instant::now()), config }
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(value) = self.dirty.read().entries.get(key) {
            return Ok(value.clone());
        }
        Ok(self.db.get_pinned(key)?.map(|slice| slice.to_vec()))
    }

    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        if let Some(value) = self.dirty.read().entries.get(key) {
            return Ok(value.is_some());
        }
        Ok(self.db.get_pinned(key)?.is_some())
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.dirty.write().set(key, Some(value));
    }

    pub fn delete(&self, key: Vec<u8>) {
        self.dirty.write().set(key, None);
    }

    /// Returns all live entries whose key starts with `prefix`, ordered by key
    pub fn prefix_entries(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged = BTreeMap::new();
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(rocksdb::PrefixRange(prefix));
        for item in self.db.iterator_opt(IteratorMode::From(prefix, Direction::Forward), read_opts) {
            let (key, value) = item?;
            merged.insert(key.to_vec(), value.to_vec());
        }

        let dirty = self.dirty.read();
        for (key, value) in dirty.entries.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }
        Ok(merged.into_iter().collect())
    }

    /// Writes all pending entries in one batch. On error the pending entries are kept
    pub fn flush(&self) -> StoreResult<usize> {
        let mut dirty = self.dirty.write();
        let count = dirty.entries.len();
        if count > 0 {
            let mut batch = WriteBatch::default();
            for (key, value) in dirty.entries.iter() {
                match value {
                    Some(value) => batch.put(key, value),
                    None => batch.delete(key),
                }
            }
            self.db.write(batch)?;
            *dirty = Dirty::default();
        }
        *self.last_flush.lock() = Instant::now();
        trace!("flushed {} entries", count);
        Ok(count)
    }

    pub fn not_flushed_size(&self) -> usize {
        self.dirty.read().size
    }

    pub fn not_flushed_entries(&self) -> usize {
        self.dirty.read().entries.len()
    }

    pub fn since_last_flush(&self) -> Duration {
        self.last_flush.lock().elapsed()
    }

    /// Whether the pending writes exceed `size_pct` percent of the size threshold
    /// or were pending for longer than `period_pct` percent of the period threshold
    pub fn is_commit_needed(&self, period_pct: u64, size_pct: u64) -> bool {
        let size_limit = (self.config.max_non_flushed_size as u64).saturating_mul(size_pct) / 100;
        let period_pct = u32::try_from(period_pct).unwrap_or(u32::MAX);
        let period_limit = self.config.max_non_flushed_period.saturating_mul(period_pct) / 100;
        self.not_flushed_size() as u64 > size_limit || (self.not_flushed_entries() > 0 && self.since_last_flush() > period_limit)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn inner(&self) -> &Arc<DB> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_temp_db, prelude::ConnBuilder};

    #[test]
    fn test_overlay_reads_and_flush() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let flushable = FlushableDb::new(db.clone(), StoreConfig { max_non_flushed_size: 10, max_non_flushed_period: Duration::from_secs(60) });

        flushable.put(vec![1, 1], vec![10]);
        flushable.put(vec![1, 2], vec![20]);
        flushable.put(vec![2, 1], vec![30]);
        assert_eq!(flushable.get(&[1, 1]).unwrap(), Some(vec![10]));
        assert!(db.get(&[1, 1]).unwrap().is_none());
        assert_eq!(flushable.not_flushed_size(), 9);
        assert!(!flushable.is_commit_needed(100, 100));
        assert!(flushable.is_commit_needed(100, 50));

        assert_eq!(flushable.flush().unwrap(), 3);
        assert_eq!(flushable.not_flushed_size(), 0);
        assert_eq!(db.get(&[1, 1]).unwrap(), Some(vec![10]));

        flushable.delete(vec![1, 1]);
        flushable.put(vec![1, 3], vec![40]);
        assert!(!flushable.contains(&[1, 1]).unwrap());
        let entries = flushable.prefix_entries(&[1]).unwrap();
        assert_eq!(entries, vec![(vec![1, 2], vec![20]), (vec![1, 3], vec![40])]);

        // Not flushed data is lost when the overlay is dropped
        drop(flushable);
        assert_eq!(db.get(&[1, 1]).unwrap(), Some(vec![10]));
        assert!(db.get(&[1, 3]).unwrap().is_none());
    }

    #[test]
    fn test_commit_needed_by_period() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let flushable = FlushableDb::new(db, StoreConfig { max_non_flushed_size: usize::MAX / 200, max_non_flushed_period: Duration::ZERO });
        assert!(!flushable.is_commit_needed(100, 100));
        flushable.put(vec![1], vec![1]);
        std::thread::sleep(Duration::from_millis(2));
        assert!(flushable.is_commit_needed(100, 100));
    }

    #[test]
    fn test_huge_thresholds_never_trigger() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let config = StoreConfig { max_non_flushed_size: usize::MAX, max_non_flushed_period: Duration::MAX };
        let flushable = FlushableDb::new(db, config);
        flushable.put(vec![1], vec![1]);
        assert!(!flushable.is_commit_needed(120, 100));
        assert!(!flushable.is_commit_needed(u64::MAX, u64::MAX));
        assert!(flushable.is_commit_needed(0, 0));
    }
}
