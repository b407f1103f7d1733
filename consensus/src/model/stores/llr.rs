use super::BeKey;
use galaxy_consensus_core::{BlockIndex, Epoch, Hash, ValidatorId, Weight};
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, DirectDbWriter, FlushableDb, StoreResult, StoreResultExt};
use galaxy_database::registry::DatabaseStorePrefixes;
use std::sync::Arc;

fn block_vote_key(idx: BlockIndex, hash: Hash) -> BeKey<40> {
    BeKey::from_parts(&[&idx.to_be_bytes(), &hash.as_bytes()])
}

fn block_voter_key(idx: BlockIndex, voter: ValidatorId) -> BeKey<12> {
    BeKey::from_parts(&[&idx.to_be_bytes(), &voter.to_be_bytes()])
}

fn epoch_vote_key(epoch: Epoch, hash: Hash) -> BeKey<36> {
    BeKey::from_parts(&[&epoch.to_be_bytes(), &hash.as_bytes()])
}

fn epoch_voter_key(epoch: Epoch, voter: ValidatorId) -> BeKey<8> {
    BeKey::from_parts(&[&epoch.to_be_bytes(), &voter.to_be_bytes()])
}

/// Accumulated weights of light record votes and the hashes they decided
#[derive(Clone)]
pub struct DbLlrStore {
    db: Arc<FlushableDb>,
    block_votes: CachedDbAccess<BeKey<40>, Weight>,
    block_voters: CachedDbAccess<BeKey<12>, Hash>,
    decided_blocks: CachedDbAccess<BeKey<8>, Hash>,
    epoch_votes: CachedDbAccess<BeKey<36>, Weight>,
    epoch_voters: CachedDbAccess<BeKey<8>, Hash>,
    decided_epochs: CachedDbAccess<BeKey<4>, Hash>,
}

impl DbLlrStore {
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            block_votes: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::BlockVotes.into()),
            block_voters: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::BlockVoters.into()),
            decided_blocks: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::DecidedBlocks.into()),
            epoch_votes: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::EpochVotes.into()),
            epoch_voters: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::EpochVoters.into()),
            decided_epochs: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::DecidedEpochs.into()),
        }
    }

    pub fn has_block_vote(&self, idx: BlockIndex, voter: ValidatorId) -> StoreResult<bool> {
        self.block_voters.has(block_voter_key(idx, voter))
    }

    /// Adds `weight` to the votes for `hash` at block `idx` and returns the new total
    pub fn add_block_vote(&self, idx: BlockIndex, voter: ValidatorId, hash: Hash, weight: Weight) -> StoreResult<Weight> {
        let key = block_vote_key(idx, hash);
        let total = self.block_votes.read(key).optional()?.unwrap_or_default() + weight;
        self.block_voters.write(DirectDbWriter::new(&self.db), block_voter_key(idx, voter), hash)?;
        self.block_votes.write(DirectDbWriter::new(&self.db), key, total)?;
        Ok(total)
    }

    pub fn get_decided_block(&self, idx: BlockIndex) -> StoreResult<Option<Hash>> {
        self.decided_blocks.read(idx.into()).optional()
    }

    pub fn set_decided_block(&self, idx: BlockIndex, hash: Hash) -> StoreResult<()> {
        self.decided_blocks.write(DirectDbWriter::new(&self.db), idx.into(), hash)
    }

    pub fn has_epoch_vote(&self, epoch: Epoch, voter: ValidatorId) -> StoreResult<bool> {
        self.epoch_voters.has(epoch_voter_key(epoch, voter))
    }

    pub fn add_epoch_vote(&self, epoch: Epoch, voter: ValidatorId, hash: Hash, weight: Weight) -> StoreResult<Weight> {
        let key = epoch_vote_key(epoch, hash);
        let total = self.epoch_votes.read(key).optional()?.unwrap_or_default() + weight;
        self.epoch_voters.write(DirectDbWriter::new(&self.db), epoch_voter_key(epoch, voter), hash)?;
        self.epoch_votes.write(DirectDbWriter::new(&self.db), key, total)?;
        Ok(total)
    }

    pub fn get_decided_epoch(&self, epoch: Epoch) -> StoreResult<Option<Hash>> {
        self.decided_epochs.read(epoch.into()).optional()
    }

    pub fn set_decided_epoch(&self, epoch: Epoch, hash: Hash) -> StoreResult<()> {
        self.decided_epochs.write(DirectDbWriter::new(&self.db), epoch.into(), hash)
    }
}
