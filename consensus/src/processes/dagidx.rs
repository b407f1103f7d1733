use crate::{
    errors::{DagIndexError, DagIndexResult},
    model::stores::highest_before::{DbHighestBeforeStore, HighestBeforeStore, HighestBeforeStoreReader},
};
use galaxy_consensus_core::{
    ValidatorId,
    dag::{BranchSeq, HighestBefore},
    event::{Event, EventId},
    validators::Validators,
};
use galaxy_core::{debug, warn};
use galaxy_database::prelude::StoreResultExt;
use std::sync::Arc;

pub type EventLookup = Arc<dyn Fn(EventId) -> Option<Arc<Event>> + Send + Sync>;

/// Vector clock index of the DAG. For every indexed event it holds the Highest-Before vector:
/// per validator branch, the highest (and lowest) seq the event observes through its ancestry.
///
/// Vectors are computed once, when the event is indexed, and never change afterwards.
/// The index must see events in topological order, parents first
pub struct DagIndex {
    validators: Validators,
    store: Arc<DbHighestBeforeStore>,
    get_event: EventLookup,
    sanity_checks: bool,
}

impl DagIndex {
    pub fn new(validators: Validators, store: Arc<DbHighestBeforeStore>, get_event: EventLookup, sanity_checks: bool) -> Self {
        Self { validators, store, get_event, sanity_checks }
    }

    /// Reinitializes the index for a new epoch. Vectors of already indexed events stay queryable
    pub fn reset(&mut self, validators: Validators, store: Arc<DbHighestBeforeStore>, get_event: EventLookup) {
        debug!("DAG index reset for {} validators", validators.len());
        self.validators = validators;
        self.store = store;
        self.get_event = get_event;
    }

    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    pub fn branch_of(&self, validator: ValidatorId) -> Option<usize> {
        self.validators.get_idx(validator)
    }

    /// Computes, stores and returns the vector of `event`. All parents must already be indexed
    pub fn index(&self, event: &Event) -> DagIndexResult<Arc<HighestBefore>> {
        let vector = Arc::new(self.calc_highest_before(event)?);
        self.insert(event, vector.clone())?;
        Ok(vector)
    }

    /// Computes the vector of `event` without storing it. All parents must already be indexed
    pub fn calc_highest_before(&self, event: &Event) -> DagIndexResult<HighestBefore> {
        let id = event.id();
        let me = self.branch_of(event.creator).ok_or(DagIndexError::UnknownBranch(event.creator, id))?;

        let mut vector = HighestBefore::new(self.validators.len());
        vector.set(me, BranchSeq::new(event.seq, event.seq));

        let mut self_fork = false;
        for parent in event.parents.iter().copied() {
            let parent_vector = self.store.get(parent).optional()?.ok_or(DagIndexError::UnindexedParent(parent, id))?;
            // A parent observing our own branch at this seq or later means the creator forked
            if !parent_vector.is_fork_detected(me) && parent_vector.seq(me) >= event.seq {
                self_fork = true;
            }
            vector.collect_from(&parent_vector);
        }

        if let Some(existing) = self.store.get_branch_seq(id.epoch(), event.creator, event.seq).optional()? {
            self_fork |= existing != id;
        }

        if self_fork {
            warn!("Fork detected: validator {} created two events with seq {} ({})", event.creator, event.seq, id);
            vector.set(me, BranchSeq::FORK_DETECTED);
        }

        if self.sanity_checks {
            self.check_vector(event, &vector)?;
        }
        Ok(vector)
    }

    /// Stores a vector computed by [`DagIndex::calc_highest_before`]
    pub fn insert(&self, event: &Event, vector: Arc<HighestBefore>) -> DagIndexResult<()> {
        Ok(self.store.insert(event.id(), event.creator, event.seq, vector)?)
    }

    pub fn get_merged_highest_before(&self, id: EventId) -> DagIndexResult<Option<Arc<HighestBefore>>> {
        Ok(self.store.get(id).optional()?)
    }

    fn check_vector(&self, event: &Event, vector: &HighestBefore) -> DagIndexResult<()> {
        let id = event.id();
        for parent in event.parents.iter().copied() {
            let parent_event =
                (self.get_event)(parent).ok_or_else(|| DagIndexError::SanityCheck(id, format!("parent {} is not stored", parent)))?;
            let branch = self
                .branch_of(parent_event.creator)
                .ok_or_else(|| DagIndexError::SanityCheck(id, format!("parent creator {} has no branch", parent_event.creator)))?;
            if !vector.is_fork_detected(branch) && vector.seq(branch) < parent_event.seq {
                return Err(DagIndexError::SanityCheck(
                    id,
                    format!("branch {} observed at {} below parent seq {}", branch, vector.seq(branch), parent_event.seq),
                ));
            }
        }
        Ok(())
    }
}
