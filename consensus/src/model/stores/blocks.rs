use super::BeKey;
use galaxy_consensus_core::{BlockIndex, block::Block, tx::Receipt};
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, DirectDbWriter, FlushableDb, StoreError, StoreResult};
use galaxy_database::registry::DatabaseStorePrefixes;
use std::sync::Arc;

pub trait BlocksStoreReader {
    fn get_block(&self, idx: BlockIndex) -> StoreResult<Arc<Block>>;
    fn has_block(&self, idx: BlockIndex) -> StoreResult<bool>;
    fn get_receipts(&self, idx: BlockIndex) -> StoreResult<Arc<Vec<Receipt>>>;
}

pub trait BlocksStore: BlocksStoreReader {
    // This is append only
    fn insert(&self, block: Arc<Block>, receipts: Arc<Vec<Receipt>>) -> StoreResult<()>;
}

/// A DB + cache implementation of `BlocksStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbBlocksStore {
    db: Arc<FlushableDb>,
    blocks_access: CachedDbAccess<BeKey<8>, Arc<Block>>,
    receipts_access: CachedDbAccess<BeKey<8>, Arc<Vec<Receipt>>>,
}

impl DbBlocksStore {
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            blocks_access: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Blocks.into()),
            receipts_access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::Receipts.into()),
        }
    }
}

impl BlocksStoreReader for DbBlocksStore {
    fn get_block(&self, idx: BlockIndex) -> StoreResult<Arc<Block>> {
        self.blocks_access.read(idx.into())
    }

    fn has_block(&self, idx: BlockIndex) -> StoreResult<bool> {
        self.blocks_access.has(idx.into())
    }

    fn get_receipts(&self, idx: BlockIndex) -> StoreResult<Arc<Vec<Receipt>>> {
        self.receipts_access.read(idx.into())
    }
}

impl BlocksStore for DbBlocksStore {
    fn insert(&self, block: Arc<Block>, receipts: Arc<Vec<Receipt>>) -> StoreResult<()> {
        let key = BeKey::from(block.idx);
        if self.blocks_access.has(key)? {
            return Err(StoreError::KeyAlreadyExists(block.idx.to_string()));
        }
        self.receipts_access.write(DirectDbWriter::new(&self.db), key, receipts)?;
        self.blocks_access.write(DirectDbWriter::new(&self.db), key, block)?;
        Ok(())
    }
}
