//! HAL telemetry types.
//!
//! This module defines the data exchanged between a motor driver and the
//! control unit:
//! - `TelemetrySample` - One instantaneous reading of the motor controller
//! - `Calibration` - Sign corrections applied by drivers at commissioning

use serde::{Deserialize, Serialize};

/// Instantaneous motor controller reading.
///
/// Produced once per control cycle and discarded after evaluation.
/// `encoder_position_counts` is `None` when the hardware has no absolute
/// position feedback; callers must treat that as "unknown", never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Measured motor current [A].
    pub motor_current_amps: f64,
    /// Spool rotational speed [rpm], positive = paying out.
    pub rotational_speed_rpm: f64,
    /// Raw encoder position [counts], positive growth = paying out.
    pub encoder_position_counts: Option<i64>,
}

impl TelemetrySample {
    /// Whether the sample carries encoder feedback.
    #[inline]
    pub const fn has_encoder(&self) -> bool {
        self.encoder_position_counts.is_some()
    }
}

/// Direction calibration for raw hardware readings.
///
/// Wiring decides whether increasing encoder counts and positive speed mean
/// paying out or winding in. Drivers apply this before handing samples to
/// the control unit so the safety logic sees one convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Calibration {
    /// Negate encoder counts.
    #[serde(default)]
    pub invert_encoder: bool,
    /// Negate rotational speed.
    #[serde(default)]
    pub invert_rpm: bool,
}

impl Calibration {
    /// Apply the calibration to a raw sample.
    pub fn apply(&self, mut sample: TelemetrySample) -> TelemetrySample {
        if self.invert_rpm {
            sample.rotational_speed_rpm = -sample.rotational_speed_rpm;
        }
        if self.invert_encoder {
            sample.encoder_position_counts = sample.encoder_position_counts.map(i64::wrapping_neg);
        }
        sample
    }
}
