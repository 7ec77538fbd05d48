//! Simulation driver module.
//!
//! A deterministic spool model that stands in for the motor controller
//! during development, demos and integration tests.

mod driver;
mod spool;

pub use driver::SimulationDriver;
pub use spool::SpoolModel;

use halo_common::hal::driver::MotorDriver;

/// Registry name of the simulation driver.
pub const DRIVER_NAME: &str = "simulation";

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn MotorDriver> {
    Box::new(SimulationDriver::new())
}
