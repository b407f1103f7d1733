//! Light records: validators vote on the hashes of block and epoch records so that
//! a lagging node can adopt those records once enough weight agrees on them

use crate::{
    BlockIndex, Epoch, Hash, ValidatorId,
    block::Block,
    state::{BlockState, EpochState},
    tx::Receipt,
};
use galaxy_hashes::{Hasher, HasherBase, HasherExtensions, RecordHash};
use serde::{Deserialize, Serialize};

/// Votes for the records of consecutive blocks starting at `start`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVotes {
    pub creator: ValidatorId,
    pub epoch: Epoch,
    pub start: BlockIndex,
    pub votes: Vec<Hash>,
    pub signature: Vec<u8>,
}

impl BlockVotes {
    pub fn signing_hash(&self) -> Hash {
        let mut hasher = RecordHash::new();
        hasher.write_u8(0).write_u32(self.creator).write_u32(self.epoch).write_u64(self.start).write_len(self.votes.len());
        self.votes.iter().for_each(|vote| {
            hasher.update(vote);
        });
        hasher.finalize()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockIndex, Hash)> + '_ {
        self.votes.iter().enumerate().map(|(i, vote)| (self.start + i as BlockIndex, *vote))
    }
}

/// Vote for the record of the state `epoch` started with
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochVote {
    pub creator: ValidatorId,
    /// The epoch whose votes are counted against its validator set
    pub voting_epoch: Epoch,
    pub epoch: Epoch,
    pub vote: Hash,
    pub signature: Vec<u8>,
}

impl EpochVote {
    pub fn signing_hash(&self) -> Hash {
        let mut hasher = RecordHash::new();
        hasher.write_u8(1).write_u32(self.creator).write_u32(self.voting_epoch).write_u32(self.epoch).update(self.vote);
        hasher.finalize()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullBlockRecord {
    pub block: Block,
    pub receipts: Vec<Receipt>,
}

impl FullBlockRecord {
    pub fn hash(&self) -> Hash {
        let mut hasher = RecordHash::new();
        hasher.write_u8(2).update(self.block.hash()).write_var_bytes(&bincode::serialize(&self.receipts).unwrap_or_default());
        hasher.finalize()
    }
}

/// The states a node adopts to jump to `epoch_state.epoch`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullEpochRecord {
    pub block_state: BlockState,
    pub epoch_state: EpochState,
}

impl FullEpochRecord {
    pub fn epoch(&self) -> Epoch {
        self.epoch_state.epoch
    }

    pub fn hash(&self) -> Hash {
        let mut hasher = RecordHash::new();
        hasher.write_u8(3).update(self.block_state.hash()).update(self.epoch_state.hash());
        hasher.finalize()
    }
}
