use crate::{
    model::stores::{
        accounts::{Account, DbAccountsStore},
        blocks::DbBlocksStore,
        events::DbEventsStore,
        highest_before::DbHighestBeforeStore,
        llr::DbLlrStore,
        states::{DbStatesStore, StatesStore, StatesStoreReader},
    },
    processes::blockproc::evm::StateDb,
};
use galaxy_consensus_core::{
    config::{Config, genesis::Genesis},
    llr::FullEpochRecord,
    state::{BlockState, EpochState},
};
use galaxy_core::{info, trace};
use galaxy_database::prelude::{CachePolicy, DB, FlushableDb, StoreConfig, StoreResult};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

pub struct ConsensusStorage {
    // DB
    db: Arc<FlushableDb>,

    // Locked stores
    pub states_store: Arc<RwLock<DbStatesStore>>,

    // Append-only stores
    pub events_store: Arc<DbEventsStore>,
    pub highest_before_store: Arc<DbHighestBeforeStore>,
    pub blocks_store: Arc<DbBlocksStore>,

    // Execution and light record stores
    pub accounts_store: Arc<DbAccountsStore>,
    pub llr_store: Arc<DbLlrStore>,
}

impl ConsensusStorage {
    pub fn new(db: Arc<DB>, config: &Config) -> Arc<Self> {
        let perf = &config.perf;
        let store_config =
            StoreConfig { max_non_flushed_size: perf.max_non_flushed_size, max_non_flushed_period: perf.max_non_flushed_period };
        let db = Arc::new(FlushableDb::new(db, store_config));

        let events_policy = CachePolicy::Count(perf.events_cache_size);
        let vectors_policy = CachePolicy::Count(perf.vectors_cache_size);
        let blocks_policy = CachePolicy::Count(perf.blocks_cache_size);
        // Small stores with rare access
        let states_policy = CachePolicy::Count(16);
        let llr_policy = CachePolicy::Count(perf.blocks_cache_size);

        Arc::new(Self {
            states_store: Arc::new(RwLock::new(DbStatesStore::new(db.clone(), states_policy))),
            events_store: Arc::new(DbEventsStore::new(db.clone(), events_policy)),
            highest_before_store: Arc::new(DbHighestBeforeStore::new(db.clone(), vectors_policy)),
            blocks_store: Arc::new(DbBlocksStore::new(db.clone(), blocks_policy)),
            accounts_store: Arc::new(DbAccountsStore::new(db.clone(), blocks_policy)),
            llr_store: Arc::new(DbLlrStore::new(db.clone(), llr_policy)),
            db,
        })
    }

    pub fn db(&self) -> &Arc<FlushableDb> {
        &self.db
    }

    pub fn is_initialized(&self) -> StoreResult<bool> {
        self.states_store.read().is_initialized()
    }

    pub fn epoch_state(&self) -> StoreResult<Arc<EpochState>> {
        self.states_store.read().get_epoch_state()
    }

    pub fn block_state(&self) -> StoreResult<Arc<BlockState>> {
        self.states_store.read().get_block_state()
    }

    /// Writes the initial states and balances. The result is committed right away
    pub fn apply_genesis(&self, genesis: &Genesis) -> StoreResult<()> {
        let mut balances = BTreeMap::new();
        for (address, balance) in genesis.balances.iter() {
            *balances.entry(*address).or_insert(0u64) += balance;
        }
        let mut statedb = StateDb::new(self.accounts_store.clone(), Default::default());
        for (address, balance) in balances {
            statedb.set(address, Account { balance, nonce: 0 });
        }
        let root = statedb.commit()?;

        let es = genesis.epoch_state();
        let bs = genesis.block_state(root);
        let mut states = self.states_store.write();
        states.set_epoch_state(Arc::new(es.clone()))?;
        states.set_block_state(Arc::new(bs.clone()))?;
        states.set_history(Arc::new(FullEpochRecord { block_state: bs, epoch_state: es.clone() }))?;
        drop(states);

        self.commit();
        info!("Applied genesis of epoch {} with {} validators and {} funded accounts", es.epoch, es.validators.len(), genesis.balances.len());
        Ok(())
    }

    pub fn is_commit_needed(&self, period_pct: u64, size_pct: u64) -> bool {
        self.db.is_commit_needed(period_pct, size_pct)
    }

    /// Makes all pending writes durable. A failure leaves the node in an unknown state and is fatal
    pub fn commit(&self) -> usize {
        let flushed = self.db.flush().unwrap_or_else(|err| panic!("storage commit failed: {err}"));
        trace!("Committed {} entries", flushed);
        flushed
    }
}
