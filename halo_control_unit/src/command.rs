//! Current commander: every current setpoint passes through here.
//!
//! Setpoints are clamped into `[-max, +max]` before they reach the driver
//! and the clamp is reported, not hidden. Write failures are returned to
//! the caller and never retried here.

use halo_common::control_unit::error::CommandError;
use halo_common::hal::driver::MotorDriver;
use tracing::{debug, warn};

/// Result of a successful current command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    /// Sent as requested [A].
    Applied(f64),
    /// Request exceeded the limit and was clamped.
    Clamped {
        /// Requested current [A].
        requested: f64,
        /// Current actually sent [A].
        effective: f64,
    },
}

impl CommandOutcome {
    /// Current actually sent [A].
    #[inline]
    pub const fn effective(&self) -> f64 {
        match *self {
            Self::Applied(amps) => amps,
            Self::Clamped { effective, .. } => effective,
        }
    }

    #[inline]
    pub const fn is_clamped(&self) -> bool {
        matches!(self, Self::Clamped { .. })
    }
}

/// Clamp a finite request into `[-max, +max]`.
#[inline]
pub fn clamp_current(requested: f64, max_allowed_current_amps: f64) -> CommandOutcome {
    let effective = requested.clamp(-max_allowed_current_amps, max_allowed_current_amps);
    if effective == requested {
        CommandOutcome::Applied(requested)
    } else {
        CommandOutcome::Clamped {
            requested,
            effective,
        }
    }
}

/// Sends clamped current setpoints and counts what happened.
#[derive(Debug, Clone)]
pub struct CurrentCommander {
    max_allowed_current_amps: f64,
    commands_issued: u64,
    clamps: u64,
    failures: u64,
    last_effective: Option<f64>,
}

impl CurrentCommander {
    /// Commander with the given symmetric limit [A].
    pub const fn new(max_allowed_current_amps: f64) -> Self {
        Self {
            max_allowed_current_amps,
            commands_issued: 0,
            clamps: 0,
            failures: 0,
            last_effective: None,
        }
    }

    /// Clamp `requested_amps` and write it to the driver.
    ///
    /// # Errors
    /// - `CommandError::NonFiniteSetpoint` for NaN or infinite requests;
    ///   nothing is written.
    /// - `CommandError::LinkDown` when the driver write fails.
    pub fn set_current<D: MotorDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        requested_amps: f64,
    ) -> Result<CommandOutcome, CommandError> {
        if !requested_amps.is_finite() {
            warn!(requested_amps, "Rejecting non-finite current setpoint");
            return Err(CommandError::NonFiniteSetpoint);
        }

        let outcome = clamp_current(requested_amps, self.max_allowed_current_amps);
        if let CommandOutcome::Clamped {
            requested,
            effective,
        } = outcome
        {
            self.clamps += 1;
            warn!(requested, effective, "Current setpoint clamped");
        }

        self.commands_issued += 1;
        match driver.write_current(outcome.effective()) {
            Ok(()) => {
                debug!(amps = outcome.effective(), "Current commanded");
                self.last_effective = Some(outcome.effective());
                Ok(outcome)
            }
            Err(e) => {
                self.failures += 1;
                warn!(amps = outcome.effective(), error = %e, "Current command failed");
                Err(e.into())
            }
        }
    }

    #[inline]
    pub const fn max_allowed_current_amps(&self) -> f64 {
        self.max_allowed_current_amps
    }

    /// Commands handed to the driver, including failed writes.
    #[inline]
    pub const fn commands_issued(&self) -> u64 {
        self.commands_issued
    }

    #[inline]
    pub const fn clamps(&self) -> u64 {
        self.clamps
    }

    #[inline]
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Last current the driver accepted [A].
    #[inline]
    pub const fn last_effective(&self) -> Option<f64> {
        self.last_effective
    }
}
