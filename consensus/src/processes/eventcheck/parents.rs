use super::EpochContext;
use arc_swap::ArcSwap;
use galaxy_consensus_core::{
    errors::event::{EventError, EventResult},
    event::Event,
};
use std::{collections::HashSet, sync::Arc};

/// Checks an event against its parents. `parents` are in the same order as `event.parents`
pub trait ParentsCheck: Send + Sync {
    fn validate(&self, event: &Event, parents: &[Arc<Event>]) -> EventResult<()>;
}

pub struct ParentsChecker {
    ctx: Arc<ArcSwap<EpochContext>>,
}

impl ParentsChecker {
    pub fn new(ctx: Arc<ArcSwap<EpochContext>>) -> Self {
        Self { ctx }
    }
}

impl ParentsCheck for ParentsChecker {
    fn validate(&self, event: &Event, parents: &[Arc<Event>]) -> EventResult<()> {
        let ctx = self.ctx.load();

        let mut creators = HashSet::with_capacity(parents.len());
        for (i, parent) in parents.iter().enumerate() {
            // The only parent of the own branch is the self-parent, and it goes first
            if i > 0 && parent.creator == event.creator {
                return Err(EventError::WrongSelfParent);
            }
            if parent.epoch != event.epoch {
                return Err(EventError::ParentOfOtherEpoch(parent.id()));
            }
            if !creators.insert(parent.creator) {
                return Err(EventError::DoubleParents(parent.creator));
            }
            if !ctx.validators.exists(parent.creator) {
                return Err(EventError::UnknownParentCreator(parent.creator));
            }
        }

        let self_parent = parents.first().filter(|p| p.creator == event.creator);
        match (event.seq, self_parent) {
            (1, None) => {}
            (1, Some(_)) => return Err(EventError::UnexpectedSelfParent),
            (_, None) => return Err(EventError::WrongSelfParent),
            (seq, Some(self_parent)) => {
                if seq != self_parent.seq + 1 {
                    return Err(EventError::WrongSeq(self_parent.seq + 1, seq));
                }
            }
        }

        let expected_lamport = parents.iter().map(|p| p.lamport).max().unwrap_or(0) + 1;
        if event.lamport != expected_lamport {
            return Err(EventError::WrongLamport(expected_lamport, event.lamport));
        }

        if parents.iter().any(|p| event.creation_time < p.creation_time) {
            return Err(EventError::PastTime);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestDag, test_epoch_state};

    fn checker() -> ParentsChecker {
        let es = test_epoch_state(1, &[(1, 1), (2, 1)]);
        ParentsChecker::new(Arc::new(ArcSwap::from_pointee(EpochContext::from(&es))))
    }

    #[test]
    fn test_valid_chain() {
        let checker = checker();
        let mut dag = TestDag::new(1);
        let a1 = dag.add(1, &[]);
        let b1 = dag.add(2, &[]);
        let a2 = dag.add(1, &[a1.id(), b1.id()]);
        assert!(checker.validate(&a1, &[]).is_ok());
        assert!(checker.validate(&a2, &[a1.clone(), b1.clone()]).is_ok());
    }

    #[test]
    fn test_parent_rules() {
        let checker = checker();
        let mut dag = TestDag::new(1);
        let a1 = dag.add(1, &[]);
        let b1 = dag.add(2, &[]);
        let b2 = dag.add(2, &[b1.id()]);

        let self_parent_not_first = dag.add_with(1, &[b1.id(), a1.id()], |e| e.seq = 2);
        assert_eq!(checker.validate(&self_parent_not_first, &[b1.clone(), a1.clone()]), Err(EventError::WrongSelfParent));

        let first_with_late_self_parent = dag.add_with(1, &[b1.id(), a1.id()], |e| e.seq = 1);
        assert_eq!(checker.validate(&first_with_late_self_parent, &[b1.clone(), a1.clone()]), Err(EventError::WrongSelfParent));

        let first_with_self_parent = dag.add_with(1, &[a1.id()], |e| e.seq = 1);
        assert_eq!(checker.validate(&first_with_self_parent, &[a1.clone()]), Err(EventError::UnexpectedSelfParent));

        let double = dag.add(1, &[a1.id(), b1.id(), b2.id()]);
        assert_eq!(checker.validate(&double, &[a1.clone(), b1.clone(), b2.clone()]), Err(EventError::DoubleParents(2)));

        let wrong_lamport = dag.add_with(1, &[a1.id(), b2.id()], |e| e.lamport = 2);
        assert_eq!(checker.validate(&wrong_lamport, &[a1.clone(), b2.clone()]), Err(EventError::WrongLamport(3, 2)));

        let wrong_seq = dag.add_with(1, &[a1.id()], |e| e.seq = 3);
        assert_eq!(checker.validate(&wrong_seq, &[a1.clone()]), Err(EventError::WrongSeq(2, 3)));

        let past = dag.add_with(1, &[a1.id(), b2.id()], |e| e.creation_time = b2.creation_time - 1);
        assert_eq!(checker.validate(&past, &[a1.clone(), b2.clone()]), Err(EventError::PastTime));

        let mut other_epoch = TestDag::new(2);
        let c1 = other_epoch.add(1, &[]);
        let cross = dag.add(2, &[b2.id(), c1.id()]);
        assert_eq!(checker.validate(&cross, &[b2.clone(), c1.clone()]), Err(EventError::ParentOfOtherEpoch(c1.id())));
    }
}
