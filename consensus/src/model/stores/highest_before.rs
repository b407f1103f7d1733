use super::{BeKey, bucket_pair_key};
use galaxy_consensus_core::{
    Epoch, Seq, ValidatorId,
    dag::HighestBefore,
    event::EventId,
};
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, DirectDbWriter, FlushableDb, StoreError, StoreResult};
use galaxy_database::registry::DatabaseStorePrefixes;
use std::sync::Arc;

pub trait HighestBeforeStoreReader {
    fn get(&self, id: EventId) -> StoreResult<Arc<HighestBefore>>;
    fn has(&self, id: EventId) -> StoreResult<bool>;

    /// The first indexed event of `creator` at `seq`. A second one is a fork
    fn get_branch_seq(&self, epoch: Epoch, creator: ValidatorId, seq: Seq) -> StoreResult<EventId>;
}

pub trait HighestBeforeStore: HighestBeforeStoreReader {
    // This is append only
    fn insert(&self, id: EventId, creator: ValidatorId, seq: Seq, vector: Arc<HighestBefore>) -> StoreResult<()>;
}

/// A DB + cache implementation of `HighestBeforeStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbHighestBeforeStore {
    db: Arc<FlushableDb>,
    access: CachedDbAccess<EventId, Arc<HighestBefore>>,
    branch_seqs_access: CachedDbAccess<BeKey<13>, EventId>,
}

impl DbHighestBeforeStore {
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::HighestBefore.into()),
            branch_seqs_access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::BranchSeqs.into()),
        }
    }
}

impl HighestBeforeStoreReader for DbHighestBeforeStore {
    fn get(&self, id: EventId) -> StoreResult<Arc<HighestBefore>> {
        self.access.read(id)
    }

    fn has(&self, id: EventId) -> StoreResult<bool> {
        self.access.has(id)
    }

    fn get_branch_seq(&self, epoch: Epoch, creator: ValidatorId, seq: Seq) -> StoreResult<EventId> {
        self.branch_seqs_access.read(bucket_pair_key(epoch, creator, seq))
    }
}

impl HighestBeforeStore for DbHighestBeforeStore {
    fn insert(&self, id: EventId, creator: ValidatorId, seq: Seq, vector: Arc<HighestBefore>) -> StoreResult<()> {
        if self.access.has(id)? {
            return Err(StoreError::HashAlreadyExists(id.as_hash()));
        }
        let branch_key = bucket_pair_key(id.epoch(), creator, seq);
        if !self.branch_seqs_access.has(branch_key)? {
            self.branch_seqs_access.write(DirectDbWriter::new(&self.db), branch_key, id)?;
        }
        self.access.write(DirectDbWriter::new(&self.db), id, vector)?;
        Ok(())
    }
}
