pub mod adapter;
pub mod blockproc;
pub mod dagidx;
pub mod eventcheck;
pub mod llr;
pub mod quorum;
