use galaxy_consensus_core::{
    BlockIndex, Epoch, Hash, ValidatorId,
    errors::{engine::EngineError, event::EventError},
    event::EventId,
};
use galaxy_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("event rejected at {} stage: {0}", .0.stage())]
    Rejected(#[from] EventError),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("consensus engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("light records error: {0}")]
    Llr(#[from] LlrError),

    #[error("epoch {0} is not ahead of the local epoch {1}")]
    EpochNotAhead(Epoch, Epoch),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("consensus is shutting down")]
    ShuttingDown,
}

pub type ConsensusResult<T> = std::result::Result<T, ConsensusError>;

/// Internal DAG index failures. They indicate a caller bug rather than a bad event
#[derive(Error, Debug)]
pub enum DagIndexError {
    #[error("parent {0} of event {1} is not indexed")]
    UnindexedParent(EventId, EventId),

    #[error("creator {0} of event {1} has no branch in the current validator set")]
    UnknownBranch(ValidatorId, EventId),

    #[error("sanity check failed for event {0}: {1}")]
    SanityCheck(EventId, String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DagIndexError> for ConsensusError {
    fn from(err: DagIndexError) -> Self {
        ConsensusError::Consistency(err.to_string())
    }
}

pub type DagIndexResult<T> = std::result::Result<T, DagIndexError>;

#[derive(Error, Debug)]
pub enum BlockProcError {
    #[error("confirmed event {0} is missing from the store")]
    MissingEvent(EventId),

    #[error("confirmed event {0} is created by {1} who is not a validator of the epoch")]
    UnknownCreator(EventId, ValidatorId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type BlockProcResult<T> = std::result::Result<T, BlockProcError>;

#[derive(Error, Debug)]
pub enum LlrError {
    #[error("no epoch state is known for epoch {0}")]
    UnknownEpoch(Epoch),

    #[error("voter {0} is not a validator of epoch {1}")]
    UnknownVoter(ValidatorId, Epoch),

    #[error("invalid signature of a vote by {0}")]
    WrongSignature(ValidatorId),

    #[error("vote carries no hashes")]
    EmptyVote,

    #[error("no record hash is decided yet for {0}")]
    NotDecided(String),

    #[error("record hash {1} does not match the decided {0}")]
    Mismatch(Hash, Hash),

    #[error("block record {0} is already known")]
    KnownBlock(BlockIndex),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type LlrResult<T> = std::result::Result<T, LlrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_names_stage() {
        let err = ConsensusError::from(EventError::WrongEpoch(1, 2));
        assert_eq!(err.to_string(), "event rejected at epoch stage: event is of epoch 2 while the current epoch is 1");
        let err = ConsensusError::from(DagIndexError::UnindexedParent(EventId::default(), EventId::default()));
        assert!(matches!(err, ConsensusError::Consistency(_)));
    }
}
