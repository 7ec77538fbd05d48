//! Hardware abstraction layer types.
//!
//! This module contains the motor driver contract, driver configuration
//! and the telemetry sample exchanged with the control unit.

pub mod config;
pub mod driver;
pub mod types;
