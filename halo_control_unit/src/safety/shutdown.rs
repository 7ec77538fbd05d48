//! Shutdown sequence executed after an emergency trip.
//!
//! RampDown: held current × each ramp factor, settling after each step.
//! ReelIn: low inward current, re-reading position each poll until the
//! line is retracted, feedback is lost or the timeout expires.
//! FinalStop: zero current.
//!
//! The sequence runs to completion on the caller's thread. Command
//! failures are counted and logged; none of them aborts the sequence.

use halo_common::config::ConfigError;
use halo_common::control_unit::config::ShutdownConfig;
use halo_common::control_unit::error::TelemetryError;
use halo_common::control_unit::safety::SafetyConfig;
use halo_common::hal::driver::MotorDriver;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::command::{CommandOutcome, CurrentCommander};
use crate::units::SpoolGeometry;

/// How the reel-in phase ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReelInEnd {
    /// Line at or below the retracted length.
    Retracted {
        /// Length at the last reading [m].
        length_m: f64,
    },
    /// Sample carried no encoder position.
    FeedbackLost,
    /// Telemetry read failed.
    TelemetryUnavailable(TelemetryError),
    /// Reel-in timeout elapsed before the line was retracted.
    TimedOut,
}

/// What the shutdown sequence did.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    /// Currents issued during ramp-down [A].
    pub ramp_commands: Vec<f64>,
    /// Reel-in iterations performed.
    pub reel_in_iterations: u32,
    /// Why reel-in stopped.
    pub reel_in_end: ReelInEnd,
    /// Failed current writes across all phases.
    pub command_failures: u32,
    /// Whether the final zero command reached the driver.
    pub final_stop_ok: bool,
}

/// Phase-by-phase shutdown executor.
///
/// The controller calls [`ramp_down`](Self::ramp_down),
/// [`reel_in`](Self::reel_in) and [`final_stop`](Self::final_stop) in order,
/// publishing its state between phases, then collects the report.
/// Durations are converted once in [`new`](Self::new); a trip only clones
/// the prepared sequence.
#[derive(Debug, Clone)]
pub struct ShutdownSequence {
    ramp_factors: Vec<f64>,
    ramp_settle: Duration,
    reel_in_amps: f64,
    poll_interval: Duration,
    retracted_length_m: f64,
    reel_in_timeout: Duration,
    ramp_commands: Vec<f64>,
    reel_in_iterations: u32,
    command_failures: u32,
}

impl ShutdownSequence {
    /// Create a sequence from the shutdown and safety parameters.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` for a delay or timeout that is not a
    /// representable, bounded number of seconds.
    pub fn new(shutdown: &ShutdownConfig, safety: &SafetyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ramp_factors: shutdown.ramp_factors.clone(),
            ramp_settle: shutdown.ramp_settle()?,
            reel_in_amps: safety.reel_in_current_amps,
            poll_interval: safety.reel_in_poll_interval()?,
            retracted_length_m: shutdown.retracted_length_m,
            reel_in_timeout: shutdown.reel_in_timeout()?,
            ramp_commands: Vec::with_capacity(shutdown.ramp_factors.len()),
            reel_in_iterations: 0,
            command_failures: 0,
        })
    }

    /// Step the held current down through the ramp factors.
    pub fn ramp_down<D, C>(
        &mut self,
        requested_amps: f64,
        driver: &mut D,
        commander: &mut CurrentCommander,
        clock: &C,
    ) where
        D: MotorDriver + ?Sized,
        C: Clock + ?Sized,
    {
        info!(requested_amps, steps = self.ramp_factors.len(), "Ramping down");
        for i in 0..self.ramp_factors.len() {
            let amps = requested_amps * self.ramp_factors[i];
            match commander.set_current(driver, amps) {
                Ok(outcome) => self.ramp_commands.push(outcome.effective()),
                Err(e) => {
                    self.command_failures += 1;
                    warn!(amps, error = %e, "Ramp step failed, continuing");
                }
            }
            clock.sleep(self.ramp_settle);
        }
    }

    /// Wind the line in until retracted, feedback lost or timed out.
    pub fn reel_in<D, C>(
        &mut self,
        driver: &mut D,
        commander: &mut CurrentCommander,
        clock: &C,
        geometry: &SpoolGeometry,
    ) -> ReelInEnd
    where
        D: MotorDriver + ?Sized,
        C: Clock + ?Sized,
    {
        info!(amps = self.reel_in_amps, "Reeling line in");
        let started = clock.now();

        loop {
            if let Err(e) = commander.set_current(driver, self.reel_in_amps) {
                self.command_failures += 1;
                warn!(error = %e, "Reel-in command failed, continuing");
            }
            self.reel_in_iterations += 1;

            let sample = match driver.read_telemetry() {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(error = %e, "Telemetry lost during reel-in, aborting reel-in");
                    return ReelInEnd::TelemetryUnavailable(e.into());
                }
            };
            let Some(position) = geometry.position(sample.encoder_position_counts) else {
                warn!("No encoder position during reel-in, aborting reel-in");
                return ReelInEnd::FeedbackLost;
            };
            debug!(
                length_m = position.length_meters,
                rpm = sample.rotational_speed_rpm,
                "Reel-in poll"
            );
            if position.length_meters <= self.retracted_length_m {
                info!(length_m = position.length_meters, "Line retracted");
                return ReelInEnd::Retracted {
                    length_m: position.length_meters,
                };
            }
            if clock.now().saturating_sub(started) >= self.reel_in_timeout {
                warn!(
                    length_m = position.length_meters,
                    timeout_s = self.reel_in_timeout.as_secs_f64(),
                    "Reel-in timed out"
                );
                return ReelInEnd::TimedOut;
            }

            clock.sleep(self.poll_interval);
        }
    }

    /// Command zero current. `None` if the driver refused it.
    pub fn final_stop<D: MotorDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        commander: &mut CurrentCommander,
    ) -> Option<CommandOutcome> {
        match commander.set_current(driver, 0.0) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.command_failures += 1;
                warn!(error = %e, "Final stop command failed");
                None
            }
        }
    }

    /// Collect the report.
    pub fn finish(self, reel_in_end: ReelInEnd, final_stop_ok: bool) -> ShutdownReport {
        ShutdownReport {
            ramp_commands: self.ramp_commands,
            reel_in_iterations: self.reel_in_iterations,
            reel_in_end,
            command_failures: self.command_failures,
            final_stop_ok,
        }
    }
}
