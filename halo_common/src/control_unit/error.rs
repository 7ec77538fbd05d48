//! Error taxonomy for the control unit.
//!
//! Telemetry and command errors are transient: they are surfaced through the
//! controller status and never trigger a panic. Emergency conditions are not
//! errors (see `safety::EmergencyCondition`).

use thiserror::Error;

use crate::hal::driver::HalError;

/// Telemetry acquisition failure. The cycle is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Link timeout, malformed response or driver fault.
    #[error("telemetry unavailable: {0}")]
    Unavailable(String),
}

impl From<HalError> for TelemetryError {
    fn from(err: HalError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Current command failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// The write to the motor controller failed. Not retried internally.
    #[error("motor link down: {0}")]
    LinkDown(String),

    /// NaN or infinite setpoint; nothing was written.
    #[error("non-finite current setpoint")]
    NonFiniteSetpoint,

    /// The controller cannot accept the command in its current state.
    #[error("command rejected: {0}")]
    Rejected(&'static str),
}

impl From<HalError> for CommandError {
    fn from(err: HalError) -> Self {
        Self::LinkDown(err.to_string())
    }
}
