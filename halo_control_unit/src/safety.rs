//! Safety subsystem.
//!
//! - [`evaluator`] - Per-cycle emergency verdict from one sample
//! - [`shutdown`] - Ramp-down, reel-in and final stop after a trip

pub mod evaluator;
pub mod shutdown;

pub use evaluator::evaluate;
pub use shutdown::{ReelInEnd, ShutdownReport, ShutdownSequence};
