extern crate self as galaxy_core;

pub mod core;
pub mod log;
pub mod service;
pub mod time;

pub use ::log::{debug, error, info, trace, warn};
