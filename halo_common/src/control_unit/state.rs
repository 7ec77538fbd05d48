//! State enums for the control unit.
//!
//! `ControllerState` is the only long-lived mutable entity of the controller;
//! the enums here only describe it. Transitions live in
//! `halo_control_unit::state::machine`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShutdownPhase {
    /// Stepping the held current down.
    RampDown = 0,
    /// Winding the line in at low current.
    ReelIn = 1,
    /// Commanding zero current.
    FinalStop = 2,
}

/// Controller lifecycle state.
///
/// `Idle → Holding → {Holding | ShuttingDown → Stopped}`. `Stopped` is
/// terminal for a session; only an explicit re-arm returns to `Holding`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ControllerState {
    /// Constructed, never armed.
    #[default]
    Idle,
    /// Applying the user's resistance current every cycle.
    Holding {
        /// Held current [A] as requested (before clamping).
        requested_amps: f64,
    },
    /// Shutdown sequence executing.
    ShuttingDown(ShutdownPhase),
    /// Zero current commanded; waiting for re-arm.
    Stopped,
}

impl ControllerState {
    /// Whether the motor is being driven with the user's level.
    #[inline]
    pub const fn is_holding(&self) -> bool {
        matches!(self, Self::Holding { .. })
    }

    /// Held current, if holding.
    #[inline]
    pub const fn held_current(&self) -> Option<f64> {
        match self {
            Self::Holding { requested_amps } => Some(*requested_amps),
            _ => None,
        }
    }

    /// Whether `set_resistance_level` may arm the controller from here.
    #[inline]
    pub const fn can_arm(&self) -> bool {
        !matches!(self, Self::ShuttingDown(_))
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Holding { requested_amps } => write!(f, "Holding({requested_amps:.2} A)"),
            Self::ShuttingDown(phase) => write!(f, "ShuttingDown({phase:?})"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Named resistance presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl FromStr for ResistanceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "extreme" => Ok(Self::Extreme),
            other => Err(format!(
                "unknown resistance level '{other}' (expected low, medium, high or extreme)"
            )),
        }
    }
}

bitflags! {
    /// Diagnostic flags carried in the status snapshot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        /// Last telemetry read failed.
        const TELEMETRY_STALE = 0x01;
        /// Last current write failed.
        const LINK_DOWN       = 0x02;
        /// Last command was clamped.
        const CLAMPED         = 0x04;
        /// Last sample had no encoder position.
        const ENCODER_MISSING = 0x08;
        /// Last safety evaluation tripped.
        const EMERGENCY       = 0x10;
        /// A zero-current command failed and must be retried by `stop()`.
        const ZERO_PENDING    = 0x20;
    }
}
