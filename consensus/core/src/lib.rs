pub mod api;
pub mod block;
pub mod config;
pub mod dag;
pub mod errors;
pub mod event;
pub mod llr;
pub mod sign;
pub mod state;
pub mod tx;
pub mod validators;

/// Index of a validator as registered in the validators driver
pub type ValidatorId = u32;

/// Voting weight of a validator
pub type Weight = u64;

pub type Epoch = u32;

/// Per-creator event sequence number, starting at 1 in every epoch
pub type Seq = u32;

pub type Lamport = u32;

pub type BlockIndex = u64;

/// Milliseconds since UNIX epoch
pub type Timestamp = u64;

pub type Gas = u64;

pub use galaxy_hashes::Hash;
