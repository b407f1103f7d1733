use crate::Seq;
use serde::{Deserialize, Serialize};

/// The highest and lowest sequence numbers observed on a single validator branch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSeq {
    pub seq: Seq,
    pub min_seq: Seq,
}

impl BranchSeq {
    /// `min_seq` marker of a branch on which a self-fork was observed
    pub const FORK_DETECTED_MIN_SEQ: Seq = Seq::MAX;

    pub const FORK_DETECTED: BranchSeq = BranchSeq { seq: 0, min_seq: Self::FORK_DETECTED_MIN_SEQ };

    pub fn new(seq: Seq, min_seq: Seq) -> Self {
        Self { seq, min_seq }
    }

    pub fn is_empty(&self) -> bool {
        self.seq == 0 && !self.is_fork_detected()
    }

    pub fn is_fork_detected(&self) -> bool {
        self.min_seq == Self::FORK_DETECTED_MIN_SEQ
    }
}

/// Highest-Before vector of an event: for every validator branch (by its index in the
/// epoch's validator set), the sequence range observed through the event's ancestry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighestBefore {
    branches: Vec<BranchSeq>,
}

impl HighestBefore {
    pub fn new(size: usize) -> Self {
        Self { branches: vec![BranchSeq::default(); size] }
    }

    pub fn size(&self) -> usize {
        self.branches.len()
    }

    pub fn get(&self, branch: usize) -> BranchSeq {
        self.branches.get(branch).copied().unwrap_or_default()
    }

    pub fn seq(&self, branch: usize) -> Seq {
        self.get(branch).seq
    }

    pub fn min_seq(&self, branch: usize) -> Seq {
        self.get(branch).min_seq
    }

    pub fn is_fork_detected(&self, branch: usize) -> bool {
        self.get(branch).is_fork_detected()
    }

    pub fn set(&mut self, branch: usize, value: BranchSeq) {
        self.branches[branch] = value;
    }

    /// Merges `other` into `self` branch by branch. A fork marker on either side wins,
    /// otherwise `seq` takes the maximum and `min_seq` the minimum of non-empty entries
    pub fn collect_from(&mut self, other: &HighestBefore) {
        for (mine, theirs) in self.branches.iter_mut().zip(other.branches.iter()) {
            if mine.is_fork_detected() {
                continue;
            }
            if theirs.is_fork_detected() {
                *mine = BranchSeq::FORK_DETECTED;
                continue;
            }
            if theirs.seq == 0 {
                continue;
            }
            if mine.seq == 0 {
                *mine = *theirs;
                continue;
            }
            mine.seq = mine.seq.max(theirs.seq);
            mine.min_seq = mine.min_seq.min(theirs.min_seq);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchSeq> {
        self.branches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_from() {
        let mut a = HighestBefore::new(3);
        a.set(0, BranchSeq::new(2, 1));
        let mut b = HighestBefore::new(3);
        b.set(0, BranchSeq::new(3, 2));
        b.set(1, BranchSeq::new(1, 1));
        b.set(2, BranchSeq::FORK_DETECTED);

        a.collect_from(&b);
        assert_eq!(a.get(0), BranchSeq::new(3, 1));
        assert_eq!(a.get(1), BranchSeq::new(1, 1));
        assert!(a.is_fork_detected(2));
        assert!(!a.get(2).is_empty());
        assert_eq!(a.get(10), BranchSeq::default());
    }
}
