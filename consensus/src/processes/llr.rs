use crate::{
    errors::{LlrError, LlrResult},
    model::stores::{
        blocks::{BlocksStore, BlocksStoreReader, DbBlocksStore},
        llr::DbLlrStore,
        states::{DbStatesStore, StatesStore, StatesStoreReader},
    },
};
use galaxy_consensus_core::{
    BlockIndex, Epoch, Hash, ValidatorId, Weight,
    llr::{BlockVotes, EpochVote, FullBlockRecord, FullEpochRecord},
    sign::{parse_pubkey, verify_hash},
    state::EpochState,
};
use galaxy_core::{debug, info};
use galaxy_database::prelude::StoreResultExt;
use parking_lot::RwLock;
use std::sync::Arc;

/// Whether `weight` out of `total` is enough to decide a record hash
fn is_decisive(weight: Weight, total: Weight) -> bool {
    weight as u128 * 3 > total as u128
}

/// Counts validator votes on block and epoch record hashes and accepts full records
/// matching the decided hashes
pub struct LlrProcessor {
    llr_store: Arc<DbLlrStore>,
    states_store: Arc<RwLock<DbStatesStore>>,
    blocks_store: Arc<DbBlocksStore>,
}

impl LlrProcessor {
    pub fn new(llr_store: Arc<DbLlrStore>, states_store: Arc<RwLock<DbStatesStore>>, blocks_store: Arc<DbBlocksStore>) -> Self {
        Self { llr_store, states_store, blocks_store }
    }

    /// The state holding the validator set votes of `epoch` are counted against
    fn voting_epoch_state(&self, epoch: Epoch) -> LlrResult<Arc<EpochState>> {
        let states = self.states_store.read();
        let current = states.get_epoch_state()?;
        if current.epoch == epoch {
            return Ok(current);
        }
        match states.get_history(epoch).optional()? {
            Some(record) => Ok(Arc::new(record.epoch_state.clone())),
            None => Err(LlrError::UnknownEpoch(epoch)),
        }
    }

    fn verify_voter(es: &EpochState, voter: ValidatorId, hash: Hash, signature: &[u8]) -> LlrResult<Weight> {
        let weight = es.validators.get_weight(voter);
        let profile = es.validator_profiles.get(&voter).filter(|_| weight > 0).ok_or(LlrError::UnknownVoter(voter, es.epoch))?;
        let pubkey = parse_pubkey(&profile.pubkey).map_err(|_| LlrError::WrongSignature(voter))?;
        verify_hash(hash, signature, &pubkey).map_err(|_| LlrError::WrongSignature(voter))?;
        Ok(weight)
    }

    /// Counts the votes and returns the blocks whose record hash got decided by them.
    /// Repeated votes of the same validator for a block are ignored
    pub fn process_block_votes(&self, votes: &BlockVotes) -> LlrResult<Vec<BlockIndex>> {
        if votes.votes.is_empty() {
            return Err(LlrError::EmptyVote);
        }
        let es = self.voting_epoch_state(votes.epoch)?;
        let weight = Self::verify_voter(&es, votes.creator, votes.signing_hash(), &votes.signature)?;

        let mut decided = Vec::new();
        for (idx, hash) in votes.blocks() {
            if self.llr_store.has_block_vote(idx, votes.creator)? {
                continue;
            }
            let total = self.llr_store.add_block_vote(idx, votes.creator, hash, weight)?;
            if is_decisive(total, es.validators.total_weight()) && self.llr_store.get_decided_block(idx)?.is_none() {
                debug!("Block record {} decided as {}", idx, hash);
                self.llr_store.set_decided_block(idx, hash)?;
                decided.push(idx);
            }
        }
        Ok(decided)
    }

    /// Counts the vote and returns whether it decided the epoch record hash
    pub fn process_epoch_vote(&self, vote: &EpochVote) -> LlrResult<bool> {
        let es = self.voting_epoch_state(vote.voting_epoch)?;
        let weight = Self::verify_voter(&es, vote.creator, vote.signing_hash(), &vote.signature)?;
        if self.llr_store.has_epoch_vote(vote.epoch, vote.creator)? {
            return Ok(false);
        }
        let total = self.llr_store.add_epoch_vote(vote.epoch, vote.creator, vote.vote, weight)?;
        if is_decisive(total, es.validators.total_weight()) && self.llr_store.get_decided_epoch(vote.epoch)?.is_none() {
            debug!("Epoch record {} decided as {}", vote.epoch, vote.vote);
            self.llr_store.set_decided_epoch(vote.epoch, vote.vote)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn process_full_block_record(&self, record: &FullBlockRecord) -> LlrResult<()> {
        let idx = record.block.idx;
        if self.blocks_store.has_block(idx)? {
            return Err(LlrError::KnownBlock(idx));
        }
        let decided = self.llr_store.get_decided_block(idx)?.ok_or_else(|| LlrError::NotDecided(format!("block {}", idx)))?;
        let hash = record.hash();
        if decided != hash {
            return Err(LlrError::Mismatch(decided, hash));
        }
        self.blocks_store.insert(Arc::new(record.block.clone()), Arc::new(record.receipts.clone()))?;
        Ok(())
    }

    /// Stores a decided epoch record, making the epoch available for switching to
    pub fn process_full_epoch_record(&self, record: &FullEpochRecord) -> LlrResult<()> {
        let epoch = record.epoch();
        let decided = self.llr_store.get_decided_epoch(epoch)?.ok_or_else(|| LlrError::NotDecided(format!("epoch {}", epoch)))?;
        let hash = record.hash();
        if decided != hash {
            return Err(LlrError::Mismatch(decided, hash));
        }
        self.states_store.write().set_history(Arc::new(record.clone()))?;
        info!("Accepted the record of epoch {}", epoch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestDag, new_temp_flushable};
    use galaxy_consensus_core::{block::Block, sign::sign_hash, state::BlockState};
    use galaxy_database::prelude::CachePolicy;

    struct Setup {
        dag: TestDag,
        es: EpochState,
        llr: LlrProcessor,
    }

    fn setup(db: Arc<galaxy_database::prelude::FlushableDb>) -> Setup {
        let mut dag = TestDag::new(1);
        let es = dag.epoch_state(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
        let mut states = DbStatesStore::new(db.clone(), CachePolicy::Count(10));
        states.set_epoch_state(Arc::new(es.clone())).unwrap();
        states.set_block_state(Arc::new(BlockState::default())).unwrap();
        let llr = LlrProcessor::new(
            Arc::new(DbLlrStore::new(db.clone(), CachePolicy::Count(10))),
            Arc::new(RwLock::new(states)),
            Arc::new(DbBlocksStore::new(db, CachePolicy::Count(10))),
        );
        Setup { dag, es, llr }
    }

    fn block_votes(dag: &mut TestDag, creator: ValidatorId, start: BlockIndex, votes: Vec<Hash>) -> BlockVotes {
        let mut votes = BlockVotes { creator, epoch: 1, start, votes, signature: vec![] };
        votes.signature = sign_hash(votes.signing_hash(), &dag.keypair(creator));
        votes
    }

    #[test]
    fn test_block_record_decided_by_third_of_weight() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        let record = FullBlockRecord { block: Block { idx: 7, ..Default::default() }, receipts: vec![] };
        let hash = record.hash();

        assert!(matches!(s.llr.process_full_block_record(&record), Err(LlrError::NotDecided(_))));

        // 1 of 4 is not more than a third
        assert!(s.llr.process_block_votes(&block_votes(&mut s.dag, 1, 7, vec![hash])).unwrap().is_empty());
        // Voting twice does not add weight
        assert!(s.llr.process_block_votes(&block_votes(&mut s.dag, 1, 7, vec![hash])).unwrap().is_empty());
        assert_eq!(s.llr.process_block_votes(&block_votes(&mut s.dag, 2, 6, vec![Hash::ZERO, hash])).unwrap(), vec![7]);

        let mut forged = block_votes(&mut s.dag, 3, 7, vec![hash]);
        forged.creator = 4;
        assert!(matches!(s.llr.process_block_votes(&forged), Err(LlrError::WrongSignature(4))));
        assert!(matches!(s.llr.process_block_votes(&block_votes(&mut s.dag, 9, 7, vec![hash])), Err(LlrError::UnknownVoter(9, 1))));

        let tampered = FullBlockRecord { block: Block { idx: 7, time: 1, ..Default::default() }, receipts: vec![] };
        assert!(matches!(s.llr.process_full_block_record(&tampered), Err(LlrError::Mismatch(..))));
        s.llr.process_full_block_record(&record).unwrap();
        assert!(matches!(s.llr.process_full_block_record(&record), Err(LlrError::KnownBlock(7))));
    }

    #[test]
    fn test_epoch_record_becomes_history() {
        let (_lifetime, db) = new_temp_flushable();
        let mut s = setup(db);
        let mut next_es = s.es.clone();
        next_es.epoch = 2;
        let record = FullEpochRecord { block_state: BlockState::default(), epoch_state: next_es };

        for creator in [1, 2] {
            let mut vote = EpochVote { creator, voting_epoch: 1, epoch: 2, vote: record.hash(), signature: vec![] };
            vote.signature = sign_hash(vote.signing_hash(), &s.dag.keypair(creator));
            assert_eq!(s.llr.process_epoch_vote(&vote).unwrap(), creator == 2);
        }
        let unknown = EpochVote { creator: 1, voting_epoch: 5, epoch: 6, vote: Hash::ZERO, signature: vec![] };
        assert!(matches!(s.llr.process_epoch_vote(&unknown), Err(LlrError::UnknownEpoch(5))));

        s.llr.process_full_epoch_record(&record).unwrap();
        assert_eq!(*s.llr.states_store.read().get_history(2).unwrap(), record);
        // Votes of epoch 2 are now counted against its recorded validator set
        assert_eq!(s.llr.voting_epoch_state(2).unwrap().epoch, 2);
    }
}
