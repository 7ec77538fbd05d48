//! Motor driver implementations.
//!
//! - [`simulation`] - First-order spool model for development and testing
//! - [`vesc`] - VESC motor controller over a UART link
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `MotorDriver` trait from `halo_common::hal::driver`
//! 3. Register its factory in [`register_all_drivers`]

pub mod simulation;
pub mod vesc;

use crate::driver_registry::DriverRegistry;
use halo_common::hal::driver::DriverFactory;
use tracing::warn;

/// Register all built-in drivers. A name already taken keeps its factory.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    let builtins: [(&'static str, DriverFactory); 2] = [
        (simulation::DRIVER_NAME, simulation::create_driver),
        (vesc::DRIVER_NAME, vesc::create_driver),
    ];
    for (name, factory) in builtins {
        if let Err(e) = registry.register(name, factory) {
            warn!(error = %e, "Skipping built-in driver");
        }
    }
}
