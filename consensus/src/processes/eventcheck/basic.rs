use super::EpochContext;
use arc_swap::ArcSwap;
use galaxy_consensus_core::{
    errors::event::{EventError, EventResult},
    event::Event,
};
use std::{collections::HashSet, sync::Arc};

/// Structural sanity of an event, independent of any other event
pub trait BasicCheck: Send + Sync {
    fn validate(&self, event: &Event) -> EventResult<()>;
}

pub struct BasicChecker {
    ctx: Arc<ArcSwap<EpochContext>>,
}

impl BasicChecker {
    pub fn new(ctx: Arc<ArcSwap<EpochContext>>) -> Self {
        Self { ctx }
    }
}

impl BasicCheck for BasicChecker {
    fn validate(&self, event: &Event) -> EventResult<()> {
        let rules = self.ctx.load().rules.dag;

        if event.signature.is_empty() {
            return Err(EventError::NoSignature);
        }
        if event.epoch == 0 || event.seq == 0 || event.lamport == 0 {
            return Err(EventError::NotInitialized);
        }
        let calculated = event.calc_id();
        if calculated != event.id() {
            return Err(EventError::WrongId(calculated, event.id()));
        }
        if event.parents.len() > rules.max_parents as usize {
            return Err(EventError::TooManyParents(event.parents.len(), rules.max_parents));
        }
        if event.parents.iter().collect::<HashSet<_>>().len() != event.parents.len() {
            return Err(EventError::DuplicateParents);
        }
        if event.seq > 1 && event.parents.is_empty() {
            return Err(EventError::NoParents(event.seq));
        }
        if event.extra.len() > rules.max_extra_data as usize {
            return Err(EventError::ExtraTooLarge(event.extra.len(), rules.max_extra_data));
        }
        if event.txs.len() > rules.max_txs as usize {
            return Err(EventError::TooManyTxs(event.txs.len(), rules.max_txs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestDag, test_epoch_state};

    #[test]
    fn test_basic_rejections() {
        let es = test_epoch_state(1, &[(1, 1)]);
        let checker = BasicChecker::new(Arc::new(ArcSwap::from_pointee(EpochContext::from(&es))));
        let mut dag = TestDag::new(1);
        let a1 = dag.add(1, &[]);
        assert!(checker.validate(&a1).is_ok());

        let mut unsigned = a1.to_mutable();
        unsigned.signature.clear();
        assert_eq!(checker.validate(&unsigned.build()), Err(EventError::NoSignature));

        let orphan = dag.add_with(1, &[], |e| e.seq = 2);
        assert_eq!(checker.validate(&orphan), Err(EventError::NoParents(2)));

        let duplicated = dag.add_with(1, &[], |e| {
            e.seq = 2;
            e.parents = vec![a1.id(), a1.id()];
        });
        assert_eq!(checker.validate(&duplicated), Err(EventError::DuplicateParents));

        let big = dag.add_with(1, &[], |e| e.extra = vec![0; es.rules.dag.max_extra_data as usize + 1]);
        assert!(matches!(checker.validate(&big), Err(EventError::ExtraTooLarge(..))));
    }
}
