//! # HALO HAL Library
//!
//! Motor driver implementations behind the `MotorDriver` trait defined in
//! `halo_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Simulation and VESC drivers
//!
//! ```text
//! ┌────────────────────────┐      ┌──────────────────────┐
//! │  halo_control_unit     │─────►│  DriverRegistry      │
//! │  (ResistanceController)│      └──────────┬───────────┘
//! └───────────┬────────────┘                 │ create_driver(name)
//!             │ read_telemetry / write_current
//!             ▼                              ▼
//!      ┌──────────────────────────────────────────┐
//!      │  Box<dyn MotorDriver>                    │
//!      │   ├─ SimulationDriver (spool model)      │
//!      │   └─ VescDriver ──► Transport (UART)     │
//!      └──────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;

pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::SimulationDriver;
pub use crate::drivers::vesc::VescDriver;
