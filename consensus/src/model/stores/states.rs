use super::BeKey;
use galaxy_consensus_core::{
    Epoch,
    llr::FullEpochRecord,
    state::{BlockState, EpochState},
};
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, CachedDbItem, DirectDbWriter, FlushableDb, StoreResult};
use galaxy_database::registry::DatabaseStorePrefixes;
use std::sync::Arc;

pub trait StatesStoreReader {
    fn get_epoch_state(&self) -> StoreResult<Arc<EpochState>>;
    fn get_block_state(&self) -> StoreResult<Arc<BlockState>>;

    fn get_epoch(&self) -> StoreResult<Epoch> {
        Ok(self.get_epoch_state()?.epoch)
    }

    /// The states `epoch` started with
    fn get_history(&self, epoch: Epoch) -> StoreResult<Arc<FullEpochRecord>>;
}

pub trait StatesStore: StatesStoreReader {
    fn set_epoch_state(&mut self, epoch_state: Arc<EpochState>) -> StoreResult<()>;
    fn set_block_state(&mut self, block_state: Arc<BlockState>) -> StoreResult<()>;
    fn set_history(&mut self, record: Arc<FullEpochRecord>) -> StoreResult<()>;
}

/// Epoch and block states of the node. Both are singletons, replaced as a whole
#[derive(Clone)]
pub struct DbStatesStore {
    db: Arc<FlushableDb>,
    epoch_state: CachedDbItem<Arc<EpochState>>,
    block_state: CachedDbItem<Arc<BlockState>>,
    history_access: CachedDbAccess<BeKey<4>, Arc<FullEpochRecord>>,
}

impl DbStatesStore {
    pub fn new(db: Arc<FlushableDb>, history_cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            epoch_state: CachedDbItem::new(db.clone(), DatabaseStorePrefixes::EpochState.into()),
            block_state: CachedDbItem::new(db.clone(), DatabaseStorePrefixes::BlockState.into()),
            history_access: CachedDbAccess::new(db, history_cache_policy, DatabaseStorePrefixes::EpochHistory.into()),
        }
    }

    /// Whether genesis was already applied on this database
    pub fn is_initialized(&self) -> StoreResult<bool> {
        Ok(self.db.contains(&[DatabaseStorePrefixes::EpochState.into()])?)
    }
}

impl StatesStoreReader for DbStatesStore {
    fn get_epoch_state(&self) -> StoreResult<Arc<EpochState>> {
        self.epoch_state.read()
    }

    fn get_block_state(&self) -> StoreResult<Arc<BlockState>> {
        self.block_state.read()
    }

    fn get_history(&self, epoch: Epoch) -> StoreResult<Arc<FullEpochRecord>> {
        self.history_access.read(epoch.into())
    }
}

impl StatesStore for DbStatesStore {
    fn set_epoch_state(&mut self, epoch_state: Arc<EpochState>) -> StoreResult<()> {
        self.epoch_state.write(DirectDbWriter::new(&self.db), &epoch_state)
    }

    fn set_block_state(&mut self, block_state: Arc<BlockState>) -> StoreResult<()> {
        self.block_state.write(DirectDbWriter::new(&self.db), &block_state)
    }

    fn set_history(&mut self, record: Arc<FullEpochRecord>) -> StoreResult<()> {
        self.history_access.write(DirectDbWriter::new(&self.db), record.epoch().into(), record)
    }
}
