//! # Consistency Invariants
//!
//! The node keeps three layers of state which must agree with each other:
//!
//! - **E**: the set of stored events
//! - **V**: the set of events with a Highest-Before vector in the DAG index
//! - **F**: the set of events fed to the consensus engine
//!
//! Inside a single epoch `F ⊆ V ⊆ E`, and an event enters all three in one exclusive
//! section, parents first. A rejected event enters none of them.
//!
//! Block and epoch states only change in the block worker, and only become visible
//! (to validation, to the engine and to storage) once the block is finalized. Mutations of
//! the engine state and storage commits are serialized by [`pipeline::exclusive::ExclusiveAccess`],
//! which also waits for every in-flight block task before granting access. This guarantees
//! that a commit never captures a half-processed block.

pub mod consensus;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod processes;
pub mod test_helpers;
