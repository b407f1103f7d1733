use crate::{
    model::stores::highest_before::DbHighestBeforeStore,
    processes::dagidx::{DagIndex, EventLookup},
};
use galaxy_consensus_core::{
    ValidatorId,
    api::{ConfirmedBatch, ConsensusEngine, DagIndexView},
    dag::HighestBefore,
    errors::engine::{EngineError, EngineResult},
    event::{Event, EventId},
    state::EpochState,
};
use galaxy_core::debug;
use std::sync::Arc;

/// Exposes the DAG index to the consensus engine, optionally along with the vector of an
/// event which is not stored yet. Holds no state of its own
pub struct IndexAdapter<'a> {
    index: &'a DagIndex,
    unstored: Option<(EventId, Arc<HighestBefore>)>,
}

impl<'a> IndexAdapter<'a> {
    pub fn new(index: &'a DagIndex) -> Self {
        Self { index, unstored: None }
    }

    pub fn with_unstored(index: &'a DagIndex, id: EventId, vector: Arc<HighestBefore>) -> Self {
        Self { index, unstored: Some((id, vector)) }
    }
}

impl DagIndexView for IndexAdapter<'_> {
    fn branch_of(&self, validator: ValidatorId) -> Option<usize> {
        self.index.branch_of(validator)
    }

    fn merged_highest_before(&self, id: &EventId) -> EngineResult<Option<Arc<HighestBefore>>> {
        if let Some((unstored_id, vector)) = &self.unstored
            && unstored_id == id
        {
            return Ok(Some(vector.clone()));
        }
        self.index.get_merged_highest_before(*id).map_err(|err| EngineError::IndexLookup(err.to_string()))
    }
}

/// Feeds an event to the engine, along with its vector computed by [`DagIndex::calc_highest_before`],
/// and relays the batches it confirmed. The vector does not need to be stored yet
pub fn feed_engine(
    engine: &mut dyn ConsensusEngine,
    index: &DagIndex,
    event: &Event,
    vector: Arc<HighestBefore>,
) -> EngineResult<Vec<ConfirmedBatch>> {
    let batches = engine.process(event, &IndexAdapter::with_unstored(index, event.id(), vector))?;
    for batch in batches.iter() {
        if batch.epoch != event.epoch {
            return Err(EngineError::EpochMismatch(event.epoch, batch.epoch));
        }
        debug!("Engine confirmed {} events with atropos {}", batch.events.len(), batch.atropos);
    }
    Ok(batches)
}

/// Relays an epoch seal to the engine and the index
pub fn seal_epoch(
    engine: &mut dyn ConsensusEngine,
    index: &mut DagIndex,
    es: &EpochState,
    store: Arc<DbHighestBeforeStore>,
    get_event: EventLookup,
) {
    index.reset(es.validators.clone(), store, get_event);
    engine.reset(es.epoch, es.validators.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        processes::quorum::QuorumEngine,
        test_helpers::{TestDag, new_temp_flushable},
    };
    use galaxy_consensus_core::{Epoch, validators::Validators};
    use galaxy_database::prelude::CachePolicy;

    struct FailingEngine;

    impl ConsensusEngine for FailingEngine {
        fn process(&mut self, _event: &Event, _index: &dyn DagIndexView) -> EngineResult<Vec<ConfirmedBatch>> {
            Err(EngineError::General("unavailable".to_string()))
        }

        fn reset(&mut self, _epoch: Epoch, _validators: Validators) {}
    }

    #[test]
    fn test_engine_sees_unstored_vector() {
        let (_lifetime, db) = new_temp_flushable();
        let store = Arc::new(DbHighestBeforeStore::new(db, CachePolicy::Count(100)));
        let validators = Validators::new([(1, 1)]);
        let mut dag = TestDag::new(1);
        let index = DagIndex::new(validators.clone(), store, dag.lookup(), true);
        let a1 = dag.add(1, &[]);
        let vector = Arc::new(index.calc_highest_before(&a1).unwrap());

        // A failed feed leaves the index untouched, so the event can be retried
        assert!(feed_engine(&mut FailingEngine, &index, &a1, vector.clone()).is_err());
        assert!(index.get_merged_highest_before(a1.id()).unwrap().is_none());

        let mut engine = QuorumEngine::new(1, validators);
        let batches = feed_engine(&mut engine, &index, &a1, vector.clone()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].events, vec![a1.id()]);
        assert!(index.get_merged_highest_before(a1.id()).unwrap().is_none());

        index.insert(&a1, vector.clone()).unwrap();
        assert_eq!(index.get_merged_highest_before(a1.id()).unwrap(), Some(vector));
    }
}
