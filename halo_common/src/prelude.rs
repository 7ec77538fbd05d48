//! Prelude module for common re-exports.
//!
//! ```rust
//! use halo_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::control_unit::config::{
    ControllerConfig, CycleConfig, ResistanceLevels, ShutdownConfig, SpoolConfig,
};

// ─── Safety / State ─────────────────────────────────────────────────
pub use crate::control_unit::error::{CommandError, TelemetryError};
pub use crate::control_unit::safety::{EmergencyCondition, SafetyConfig};
pub use crate::control_unit::state::{
    ControllerState, ResistanceLevel, ShutdownPhase, StatusFlags,
};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::config::DriverConfig;
pub use crate::hal::driver::{HalError, MotorDriver};
pub use crate::hal::types::TelemetrySample;
