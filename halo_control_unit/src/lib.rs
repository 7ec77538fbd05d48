//! # HALO Control Unit Library
//!
//! Safety loop for the HydroHalo resistance trainer. A user pulls a line off
//! a motor-driven spool; the controller holds the requested resistance as
//! motor current, watches telemetry every cycle and, when the user lets go
//! or the line is wound close to the spool, ramps the current down, reels
//! the line in and stops the motor.
//!
//! ## Layers
//!
//! 1. **units** - Encoder counts to line length
//! 2. **command** - Clamped current commands
//! 3. **safety** - Emergency evaluation and the shutdown sequence
//! 4. **state** - Controller lifecycle transitions
//! 5. **controller** - `ResistanceController` operations
//! 6. **cycle** - Fixed-period runner around `tick()`
//!
//! The controller only talks to hardware through
//! `halo_common::hal::driver::MotorDriver` and only waits through
//! [`clock::Clock`], so every path runs against scripted drivers and
//! virtual time in tests.

pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod safety;
pub mod state;
pub mod units;

pub use crate::controller::{ControllerStatus, ResistanceController, SelfCheckReport, TickOutcome};
