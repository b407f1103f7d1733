use crate::{Epoch, event::EventId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("event {0} was not indexed before being fed to the engine")]
    UnindexedEvent(EventId),

    #[error("engine is at epoch {0} but received an event of epoch {1}")]
    EpochMismatch(Epoch, Epoch),

    #[error("index lookup failed: {0}")]
    IndexLookup(String),

    #[error("{0}")]
    General(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
