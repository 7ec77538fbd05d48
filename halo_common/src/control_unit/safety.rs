//! Safety types for the control unit.
//!
//! Defines `SafetyConfig` (the trip thresholds and reel-in parameters) and
//! `EmergencyCondition` (the per-cycle verdict of the safety evaluator).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;
use crate::consts::{
    DEFAULT_MAX_ALLOWED_CURRENT_A, DEFAULT_PULL_FORCE_CURRENT_THRESHOLD_A,
    DEFAULT_REEL_IN_CURRENT_A, DEFAULT_REEL_IN_POLL_INTERVAL_S, DEFAULT_RPM_MOVING_THRESHOLD,
    DEFAULT_STOP_AT_DISTANCE_M, MAX_SHUTDOWN_DELAY_S,
};

use super::config::bounded_secs;

/// Safety thresholds, fixed at controller construction.
///
/// # TOML Example
///
/// ```toml
/// [safety]
/// pull_force_current_threshold_amps = 0.2
/// rpm_moving_threshold = 5.0
/// max_allowed_current_amps = 20.0
/// reel_in_current_amps = -2.0
/// reel_in_poll_interval_s = 0.1
/// stop_at_distance_meters = 1.524
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Below this |current| the line is slack [A].
    pub pull_force_current_threshold_amps: f64,
    /// Below this |speed| the spool is stationary [rpm].
    pub rpm_moving_threshold: f64,
    /// Symmetric clamp for every current command [A].
    pub max_allowed_current_amps: f64,
    /// Reel-in current, negative = inward [A].
    pub reel_in_current_amps: f64,
    /// Delay between reel-in iterations [s].
    pub reel_in_poll_interval_s: f64,
    /// Minimum safe extension [m].
    pub stop_at_distance_meters: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            pull_force_current_threshold_amps: DEFAULT_PULL_FORCE_CURRENT_THRESHOLD_A,
            rpm_moving_threshold: DEFAULT_RPM_MOVING_THRESHOLD,
            max_allowed_current_amps: DEFAULT_MAX_ALLOWED_CURRENT_A,
            reel_in_current_amps: DEFAULT_REEL_IN_CURRENT_A,
            reel_in_poll_interval_s: DEFAULT_REEL_IN_POLL_INTERVAL_S,
            stop_at_distance_meters: DEFAULT_STOP_AT_DISTANCE_M,
        }
    }
}

impl SafetyConfig {
    /// Reel-in poll interval as a `Duration`.
    ///
    /// # Errors
    /// `ValidationError` unless `0 < reel_in_poll_interval_s <= MAX_SHUTDOWN_DELAY_S`.
    pub fn reel_in_poll_interval(&self) -> Result<Duration, ConfigError> {
        bounded_secs(
            "reel_in_poll_interval_s",
            self.reel_in_poll_interval_s,
            MAX_SHUTDOWN_DELAY_S,
            false,
        )
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            (
                "pull_force_current_threshold_amps",
                self.pull_force_current_threshold_amps,
            ),
            ("rpm_moving_threshold", self.rpm_moving_threshold),
            ("max_allowed_current_amps", self.max_allowed_current_amps),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        self.reel_in_poll_interval()?;
        if !self.reel_in_current_amps.is_finite()
            || self.reel_in_current_amps.abs() > self.max_allowed_current_amps
        {
            return Err(ConfigError::ValidationError(format!(
                "|reel_in_current_amps| {} exceeds max_allowed_current_amps {}",
                self.reel_in_current_amps, self.max_allowed_current_amps
            )));
        }
        if !self.stop_at_distance_meters.is_finite() || self.stop_at_distance_meters < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "stop_at_distance_meters must be >= 0, got {}",
                self.stop_at_distance_meters
            )));
        }
        Ok(())
    }
}

/// Verdict of one safety evaluation. Computed fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmergencyCondition {
    /// Normal operation.
    #[default]
    None,
    /// Current and speed both near zero: the user released the line.
    NoPullDetected,
    /// Line at or below the minimum extension while winding in.
    LineNearMinimumExtension,
}

impl EmergencyCondition {
    /// Whether this condition requires the shutdown sequence.
    #[inline]
    pub const fn is_emergency(&self) -> bool {
        !matches!(self, Self::None)
    }
}
