use crate::{Epoch, Gas, Lamport, Seq, ValidatorId, event::EventId};
use std::fmt::Display;
use thiserror::Error;

/// The validation stage which rejected an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStage {
    Basic,
    Epoch,
    Parents,
    Heavy,
    GasPower,
}

impl Display for CheckStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckStage::Basic => "basic",
            CheckStage::Epoch => "epoch",
            CheckStage::Parents => "parents",
            CheckStage::Heavy => "heavy",
            CheckStage::GasPower => "gas power",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event has no signature")]
    NoSignature,

    #[error("event epoch, seq and lamport must all be positive")]
    NotInitialized,

    #[error("event id {1} does not match its content (expected {0})")]
    WrongId(EventId, EventId),

    #[error("event has {0} parents while at most {1} are allowed")]
    TooManyParents(usize, u32),

    #[error("event refers the same parent twice")]
    DuplicateParents,

    #[error("event with seq {0} must have parents")]
    NoParents(Seq),

    #[error("extra data of {0} bytes exceeds the maximum of {1}")]
    ExtraTooLarge(usize, u32),

    #[error("event has {0} transactions while at most {1} are allowed")]
    TooManyTxs(usize, u32),

    #[error("event is of epoch {1} while the current epoch is {0}")]
    WrongEpoch(Epoch, Epoch),

    #[error("event {0} is already known")]
    AlreadyKnown(EventId),

    #[error("event creator {0} is not a validator of the current epoch")]
    UnknownCreator(ValidatorId),

    #[error("declared gas used {1} differs from the computed {0}")]
    WrongGasUsed(Gas, Gas),

    #[error("gas used {0} exceeds the maximum of {1} per event")]
    TooBigGasUsed(Gas, Gas),

    #[error("parent {0} is unknown")]
    UnknownParent(EventId),

    #[error("parent {0} belongs to another epoch")]
    ParentOfOtherEpoch(EventId),

    #[error("self-parent is missing or not the first parent")]
    WrongSelfParent,

    #[error("first event of a validator cannot have a self-parent")]
    UnexpectedSelfParent,

    #[error("two parents are created by validator {0}")]
    DoubleParents(ValidatorId),

    #[error("parent creator {0} is not a validator of the current epoch")]
    UnknownParentCreator(ValidatorId),

    #[error("expected lamport {0}, got {1}")]
    WrongLamport(Lamport, Lamport),

    #[error("expected seq {0}, got {1}")]
    WrongSeq(Seq, Seq),

    #[error("event creation time is before its self-parent")]
    PastTime,

    #[error("no public key for validator {0}")]
    MissingPubkey(ValidatorId),

    #[error("invalid signature of event {0}")]
    WrongSignature(EventId),

    #[error("declared gas power left {1} differs from the computed {0}")]
    WrongGasPowerLeft(Gas, Gas),

    #[error("insufficient gas power: needed {0}, available {1}")]
    InsufficientGasPower(Gas, Gas),
}

impl EventError {
    pub fn stage(&self) -> CheckStage {
        use EventError::*;
        match self {
            NoSignature | NotInitialized | WrongId(..) | TooManyParents(..) | DuplicateParents | NoParents(_) | ExtraTooLarge(..)
            | TooManyTxs(..) => CheckStage::Basic,
            WrongEpoch(..) | AlreadyKnown(_) | UnknownCreator(_) | WrongGasUsed(..) | TooBigGasUsed(..) => CheckStage::Epoch,
            UnknownParent(_) | ParentOfOtherEpoch(_) | WrongSelfParent | UnexpectedSelfParent | DoubleParents(_)
            | UnknownParentCreator(_) | WrongLamport(..) | WrongSeq(..) | PastTime => CheckStage::Parents,
            MissingPubkey(_) | WrongSignature(_) => CheckStage::Heavy,
            WrongGasPowerLeft(..) | InsufficientGasPower(..) => CheckStage::GasPower,
        }
    }

    /// Resource exhaustion is not a sign of misbehavior, the peer should not be penalized for it
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, EventError::InsufficientGasPower(..))
    }

    /// Errors which may resolve by themselves later, e.g. once a missing parent arrives
    pub fn is_transient(&self) -> bool {
        matches!(self, EventError::UnknownParent(_) | EventError::AlreadyKnown(_))
    }
}

pub type EventResult<T> = std::result::Result<T, EventError>;
