use crate::{BlockIndex, Gas, Hash, Timestamp, event::EventId};
use galaxy_hashes::{BlockHash, Hasher, HasherBase, HasherExtensions};
use serde::{Deserialize, Serialize};

/// Describes the block being built. Produced by the controller out of a confirmed batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCtx {
    pub idx: BlockIndex,
    pub time: Timestamp,
    pub atropos: EventId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub idx: BlockIndex,
    pub time: Timestamp,
    pub atropos: EventId,
    /// Confirmed events folded into this block, in consensus order
    pub events: Vec<EventId>,
    /// Hashes of all executed transactions, internal ones first
    pub txs: Vec<Hash>,
    pub internal_txs: Vec<Hash>,
    /// Indices into `txs` of transactions which were skipped by the execution module
    pub skipped_txs: Vec<u32>,
    pub gas_used: Gas,
    /// State root after the block
    pub root: Hash,
}

impl Block {
    pub fn hash(&self) -> Hash {
        let mut hasher = BlockHash::new();
        hasher.write_u64(self.idx).write_u64(self.time).update(self.atropos).write_len(self.events.len());
        self.events.iter().for_each(|id| {
            hasher.update(id);
        });
        hasher.write_len(self.txs.len());
        self.txs.iter().for_each(|h| {
            hasher.update(h);
        });
        hasher.write_len(self.skipped_txs.len());
        self.skipped_txs.iter().for_each(|i| {
            hasher.write_u32(*i);
        });
        hasher.write_u64(self.gas_used).update(self.root);
        hasher.finalize()
    }
}
