use crate::{
    Epoch, ValidatorId,
    dag::HighestBefore,
    errors::engine::EngineResult,
    event::{Event, EventId},
    validators::Validators,
};
use std::sync::Arc;

pub mod counters;

/// Read access to the vector clock index, as required by a consensus engine
pub trait DagIndexView {
    /// Position of `validator`'s branch in the vectors
    fn branch_of(&self, validator: ValidatorId) -> Option<usize>;

    /// The vector of `id`, or `None` if the event is not indexed
    fn merged_highest_before(&self, id: &EventId) -> EngineResult<Option<Arc<HighestBefore>>>;
}

/// A set of events the engine decided a final order for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedBatch {
    pub epoch: Epoch,
    /// The event which decided the batch. Its creation time becomes the block time
    pub atropos: EventId,
    /// Confirmed events in their final order, the atropos last
    pub events: Vec<EventId>,
    /// Validators observed forking by the atropos
    pub cheaters: Vec<ValidatorId>,
}

/// The BFT ordering algorithm. Opaque to the pipeline: it only sees events in
/// topological order and hands back confirmed batches
pub trait ConsensusEngine: Send {
    /// Feeds an already validated and indexed event
    fn process(&mut self, event: &Event, index: &dyn DagIndexView) -> EngineResult<Vec<ConfirmedBatch>>;

    /// Starts over for a new epoch and validator set
    fn reset(&mut self, epoch: Epoch, validators: Validators);
}
