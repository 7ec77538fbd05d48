//! VESC motor controller driver.
//!
//! Talks the VESC UART protocol: `COMM_GET_VALUES` for telemetry and
//! `COMM_SET_CURRENT` for the current setpoint.

mod driver;
pub mod packet;
mod transport;

pub use driver::VescDriver;
pub use transport::{SerialTransport, Transport};

use halo_common::hal::driver::MotorDriver;

/// Registry name of the VESC driver.
pub const DRIVER_NAME: &str = "vesc";

/// Factory function to create a VESC driver instance.
pub fn create_driver() -> Box<dyn MotorDriver> {
    Box::new(VescDriver::new())
}
