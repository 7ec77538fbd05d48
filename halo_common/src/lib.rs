//! HydroHalo Common Library
//!
//! This crate provides shared types, constants and configuration loading
//! utilities for all HydroHalo workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Default calibration and safety constants
//! - [`hal`] - Motor driver contract, driver configuration and telemetry types
//! - [`control_unit`] - Controller configuration, state enums and error taxonomy
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use halo_common::prelude::*;
//!
//! let config = ControllerConfig::default();
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
