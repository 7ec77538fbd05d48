//! Emergency evaluation.
//!
//! Checks run in a fixed order and the first match wins:
//!
//! 1. **No pull**: current and speed both below their thresholds. The user
//!    has let go of the line.
//! 2. **Minimum extension**: position known, at or below the stop distance,
//!    and the spool is turning inward (`rpm < 0`).

use halo_common::control_unit::safety::{EmergencyCondition, SafetyConfig};
use halo_common::hal::types::TelemetrySample;

use crate::units::LinearPosition;

/// Evaluate one sample against the safety thresholds.
#[inline]
pub fn evaluate(
    sample: &TelemetrySample,
    position: Option<LinearPosition>,
    config: &SafetyConfig,
) -> EmergencyCondition {
    if no_pull(sample, config) {
        return EmergencyCondition::NoPullDetected;
    }
    if near_minimum_extension(sample, position, config) {
        return EmergencyCondition::LineNearMinimumExtension;
    }
    EmergencyCondition::None
}

#[inline]
fn no_pull(sample: &TelemetrySample, config: &SafetyConfig) -> bool {
    sample.motor_current_amps.abs() < config.pull_force_current_threshold_amps
        && sample.rotational_speed_rpm.abs() < config.rpm_moving_threshold
}

#[inline]
fn near_minimum_extension(
    sample: &TelemetrySample,
    position: Option<LinearPosition>,
    config: &SafetyConfig,
) -> bool {
    position.is_some_and(|p| {
        p.length_meters <= config.stop_at_distance_meters && sample.rotational_speed_rpm < 0.0
    })
}
