use super::{BeKey, bucket_key};
use galaxy_consensus_core::{
    Epoch, ValidatorId,
    event::{Event, EventId},
};
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, DirectDbWriter, FlushableDb, StoreError, StoreResult, StoreResultExt};
use galaxy_database::registry::DatabaseStorePrefixes;
use std::sync::Arc;

pub trait EventsStoreReader {
    fn get(&self, id: EventId) -> StoreResult<Arc<Event>>;
    fn has(&self, id: EventId) -> StoreResult<bool>;

    /// The known event with the highest seq of `creator` in `epoch`
    fn get_head(&self, epoch: Epoch, creator: ValidatorId) -> StoreResult<EventId>;

    /// Heads of all creators who emitted at least one event in `epoch`, ordered by creator id
    fn heads(&self, epoch: Epoch) -> StoreResult<Vec<EventId>>;
}

pub trait EventsStore: EventsStoreReader {
    // This is append only
    fn insert(&self, event: Arc<Event>) -> StoreResult<()>;
}

/// A DB + cache implementation of `EventsStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbEventsStore {
    db: Arc<FlushableDb>,
    access: CachedDbAccess<EventId, Arc<Event>>,
    heads_access: CachedDbAccess<BeKey<9>, (u32, EventId)>,
}

impl DbEventsStore {
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Events.into()),
            heads_access: CachedDbAccess::new(db, CachePolicy::Count(1024), DatabaseStorePrefixes::EventHeads.into()),
        }
    }

    /// Lookup closure over the store, for components which must not depend on the store type
    pub fn lookup(self: &Arc<Self>) -> Arc<dyn Fn(EventId) -> Option<Arc<Event>> + Send + Sync> {
        let store = self.clone();
        Arc::new(move |id| store.get(id).ok())
    }
}

impl EventsStoreReader for DbEventsStore {
    fn get(&self, id: EventId) -> StoreResult<Arc<Event>> {
        self.access.read(id)
    }

    fn has(&self, id: EventId) -> StoreResult<bool> {
        self.access.has(id)
    }

    fn get_head(&self, epoch: Epoch, creator: ValidatorId) -> StoreResult<EventId> {
        Ok(self.heads_access.read(bucket_key(epoch, creator))?.1)
    }

    fn heads(&self, epoch: Epoch) -> StoreResult<Vec<EventId>> {
        Ok(self.heads_access.iterator(Some(&epoch.to_be_bytes()))?.into_iter().map(|(_, (_, id))| id).collect())
    }
}

impl EventsStore for DbEventsStore {
    fn insert(&self, event: Arc<Event>) -> StoreResult<()> {
        let id = event.id();
        if self.access.has(id)? {
            return Err(StoreError::HashAlreadyExists(id.as_hash()));
        }
        let head_key = bucket_key(event.epoch, event.creator);
        let head_seq = self.heads_access.read(head_key).optional()?.map_or(0, |(seq, _)| seq);
        if event.seq > head_seq {
            self.heads_access.write(DirectDbWriter::new(&self.db), head_key, (event.seq, id))?;
        }
        self.access.write(DirectDbWriter::new(&self.db), id, event)?;
        Ok(())
    }
}
