use galaxy_consensus_core::{
    Epoch, Lamport, Seq, ValidatorId, Weight,
    api::{ConfirmedBatch, ConsensusEngine, DagIndexView},
    dag::HighestBefore,
    errors::engine::{EngineError, EngineResult},
    event::{Event, EventId},
    validators::Validators,
};
use itertools::Itertools;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

struct PendingEvent {
    branch: usize,
    seq: Seq,
    lamport: Lamport,
    parents: Vec<EventId>,
}

/// A simple weight-quorum engine. An event is confirmed once validators holding more than
/// 2/3 of the weight have a latest event which observes it, and all its parents are confirmed.
/// Confirmation order is deterministic and respects causality
pub struct QuorumEngine {
    epoch: Epoch,
    validators: Validators,
    /// Per branch, the highest seq event fed so far
    latest: Vec<Option<(Seq, EventId)>>,
    pending: HashMap<EventId, PendingEvent>,
}

impl QuorumEngine {
    pub fn new(epoch: Epoch, validators: Validators) -> Self {
        let latest = vec![None; validators.len()];
        Self { epoch, validators, latest, pending: HashMap::new() }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn observed_weight(observers: &[(Weight, Arc<HighestBefore>)], event: &PendingEvent) -> Weight {
        observers
            .iter()
            .filter(|(_, hb)| !hb.is_fork_detected(event.branch) && hb.seq(event.branch) >= event.seq)
            .map(|(weight, _)| *weight)
            .sum()
    }

    /// Extracts the confirmed pending events. Pending events stay untouched on error
    fn confirm(&mut self, index: &dyn DagIndexView) -> EngineResult<Vec<ConfirmedBatch>> {
        let observers = self
            .latest
            .iter()
            .enumerate()
            .filter_map(|(branch, latest)| latest.map(|(_, id)| (branch, id)))
            .map(|(branch, id)| {
                let hb = index.merged_highest_before(&id)?.ok_or(EngineError::UnindexedEvent(id))?;
                Ok((self.validators.get_weight_by_idx(branch), hb))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        let quorum = self.validators.quorum();
        let mut confirmed: HashSet<EventId> = self
            .pending
            .iter()
            .filter(|(_, pending)| Self::observed_weight(&observers, pending) >= quorum)
            .map(|(id, _)| *id)
            .collect();

        // Drop events whose parents are still pending, until the set is closed under ancestry
        loop {
            let closed: HashSet<EventId> = confirmed
                .iter()
                .filter(|id| self.pending[*id].parents.iter().all(|p| !self.pending.contains_key(p) || confirmed.contains(p)))
                .copied()
                .collect();
            if closed.len() == confirmed.len() {
                break;
            }
            confirmed = closed;
        }

        let events = confirmed
            .into_iter()
            .map(|id| (self.pending[&id].lamport, id))
            .sorted()
            .map(|(_, id)| id)
            .collect_vec();
        let Some(&atropos) = events.last() else {
            return Ok(vec![]);
        };
        let atropos_vector = index.merged_highest_before(&atropos)?.ok_or(EngineError::UnindexedEvent(atropos))?;
        let cheaters: Vec<ValidatorId> =
            (0..self.validators.len()).filter(|&b| atropos_vector.is_fork_detected(b)).map(|b| self.validators.get_id(b)).collect();

        events.iter().for_each(|id| {
            self.pending.remove(id);
        });
        Ok(vec![ConfirmedBatch { epoch: self.epoch, atropos, events, cheaters }])
    }
}

impl ConsensusEngine for QuorumEngine {
    fn process(&mut self, event: &Event, index: &dyn DagIndexView) -> EngineResult<Vec<ConfirmedBatch>> {
        if event.epoch != self.epoch {
            return Err(EngineError::EpochMismatch(self.epoch, event.epoch));
        }
        let id = event.id();
        if index.merged_highest_before(&id)?.is_none() {
            return Err(EngineError::UnindexedEvent(id));
        }
        let branch =
            index.branch_of(event.creator).ok_or_else(|| EngineError::General(format!("creator {} has no branch", event.creator)))?;

        let prev_latest = self.latest[branch];
        if prev_latest.is_none_or(|(seq, _)| event.seq > seq) {
            self.latest[branch] = Some((event.seq, id));
        }
        self.pending.insert(id, PendingEvent { branch, seq: event.seq, lamport: event.lamport, parents: event.parents.clone() });

        let result = self.confirm(index);
        if result.is_err() {
            self.pending.remove(&id);
            self.latest[branch] = prev_latest;
        }
        result
    }

    fn reset(&mut self, epoch: Epoch, validators: Validators) {
        *self = Self::new(epoch, validators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::stores::highest_before::DbHighestBeforeStore,
        processes::{adapter::IndexAdapter, dagidx::DagIndex},
        test_helpers::{TestDag, new_temp_flushable},
    };
    use galaxy_database::prelude::CachePolicy;

    #[test]
    fn test_confirmation_order() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbHighestBeforeStore::new(db, CachePolicy::Count(100)));
        let validators = Validators::new([(1, 1), (2, 1)]);
        let mut dag = TestDag::new(1);
        let index = DagIndex::new(validators.clone(), store, dag.lookup(), false);
        let mut engine = QuorumEngine::new(1, validators);

        let mut feed = |event: Arc<Event>| {
            index.index(&event).unwrap();
            engine.process(&event, &IndexAdapter::new(&index)).unwrap()
        };

        let a1 = dag.add(1, &[]);
        let b1 = dag.add(2, &[]);
        let a2 = dag.add(1, &[a1.id(), b1.id()]);
        let b2 = dag.add(2, &[b1.id(), a2.id()]);

        assert!(feed(a1.clone()).is_empty());
        assert!(feed(b1.clone()).is_empty());
        // Only b1 is observed by both a2 and b1
        assert_eq!(feed(a2.clone()), vec![ConfirmedBatch { epoch: 1, atropos: b1.id(), events: vec![b1.id()], cheaters: vec![] }]);
        assert_eq!(feed(b2.clone()), vec![ConfirmedBatch { epoch: 1, atropos: a2.id(), events: vec![a1.id(), a2.id()], cheaters: vec![] }]);
    }

    #[test]
    fn test_rejects_unindexed_and_foreign_epoch() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbHighestBeforeStore::new(db, CachePolicy::Count(100)));
        let validators = Validators::new([(1, 1)]);
        let mut dag = TestDag::new(1);
        let index = DagIndex::new(validators.clone(), store, dag.lookup(), false);
        let mut engine = QuorumEngine::new(1, validators.clone());

        let a1 = dag.add(1, &[]);
        assert_eq!(engine.process(&a1, &IndexAdapter::new(&index)), Err(EngineError::UnindexedEvent(a1.id())));

        engine.reset(2, validators);
        index.index(&a1).unwrap();
        assert_eq!(engine.process(&a1, &IndexAdapter::new(&index)), Err(EngineError::EpochMismatch(2, 1)));
    }

    struct BrokenLookup<'a> {
        inner: IndexAdapter<'a>,
        broken: EventId,
    }

    impl DagIndexView for BrokenLookup<'_> {
        fn branch_of(&self, validator: ValidatorId) -> Option<usize> {
            self.inner.branch_of(validator)
        }

        fn merged_highest_before(&self, id: &EventId) -> EngineResult<Option<Arc<HighestBefore>>> {
            if *id == self.broken {
                return Err(EngineError::IndexLookup("read failure".to_string()));
            }
            self.inner.merged_highest_before(id)
        }
    }

    #[test]
    fn test_failed_lookup_leaves_no_trace() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbHighestBeforeStore::new(db, CachePolicy::Count(100)));
        let validators = Validators::new([(1, 1), (2, 1)]);
        let mut dag = TestDag::new(1);
        let index = DagIndex::new(validators.clone(), store, dag.lookup(), false);
        let mut engine = QuorumEngine::new(1, validators);

        let a1 = dag.add(1, &[]);
        let b1 = dag.add(2, &[a1.id()]);
        index.index(&a1).unwrap();
        index.index(&b1).unwrap();
        assert!(engine.process(&a1, &IndexAdapter::new(&index)).unwrap().is_empty());

        let broken = BrokenLookup { inner: IndexAdapter::new(&index), broken: a1.id() };
        assert!(matches!(engine.process(&b1, &broken), Err(EngineError::IndexLookup(_))));
        assert_eq!(engine.pending_len(), 1);

        // The retry confirms a1, observed by both latest events
        let batches = engine.process(&b1, &IndexAdapter::new(&index)).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].events, vec![a1.id()]);
        assert_eq!(engine.pending_len(), 1);
    }
}
