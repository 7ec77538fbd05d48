//! HAL configuration types.
//!
//! This module contains configuration types for the motor drivers:
//! - `DriverConfig` - `[driver]` section: selected driver + per-driver tables
//! - `SimulationConfig` - `[driver.simulation]` spool model parameters
//! - `VescConfig` - `[driver.vesc]` serial link and decoding options
//! - `PositionSource` - Where the VESC driver takes encoder counts from

use crate::consts::{
    DEFAULT_ENCODER_COUNTS_PER_REV, DEFAULT_MOTOR_POLE_PAIRS, DEFAULT_SPOOL_DIAMETER_M,
    DEFAULT_VESC_BAUD, DEFAULT_VESC_PORT, DEFAULT_VESC_TIMEOUT_MS,
};
use crate::hal::driver::HalError;
use crate::hal::types::Calibration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_driver_name() -> String {
    "simulation".to_string()
}

/// `[driver]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Registered driver name ("simulation", "vesc").
    #[serde(default = "default_driver_name")]
    pub name: String,

    /// Simulation driver parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// VESC driver parameters.
    #[serde(default)]
    pub vesc: VescConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: default_driver_name(),
            simulation: SimulationConfig::default(),
            vesc: VescConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Validate the driver configuration.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.name.is_empty() {
            return Err(HalError::ConfigError("driver name cannot be empty".to_string()));
        }
        self.simulation.validate()?;
        self.vesc.validate()
    }
}

/// Spool model parameters for the simulation driver.
///
/// The model is deterministic: every telemetry read advances simulated time
/// by `step_s`, independent of wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Line length paid out at start [m].
    pub initial_length_m: f64,
    /// Maximum line length (fully paid out) [m].
    pub max_length_m: f64,
    /// Force the simulated user pulls with [N].
    pub user_force_n: f64,
    /// Simulated time the user keeps pulling before releasing [s].
    pub pull_seconds: f64,
    /// Simulated time advanced per telemetry read [s].
    pub step_s: f64,
    /// Motor torque constant [N·m/A].
    pub torque_constant_nm_per_a: f64,
    /// Viscous damping of the line [N·s/m].
    pub damping_n_s_per_m: f64,
    /// Spool diameter [m].
    pub spool_diameter_m: f64,
    /// Encoder resolution [counts/rev].
    pub encoder_counts_per_rev: u32,
    /// Whether the simulated hardware reports encoder position.
    pub has_encoder: bool,
    /// Fail every Nth telemetry read (0 = never).
    pub fail_every_n_reads: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_length_m: 2.5,
            max_length_m: 4.0,
            user_force_n: 60.0,
            pull_seconds: 5.0,
            step_s: 0.05,
            torque_constant_nm_per_a: 0.05,
            damping_n_s_per_m: 40.0,
            spool_diameter_m: DEFAULT_SPOOL_DIAMETER_M,
            encoder_counts_per_rev: DEFAULT_ENCODER_COUNTS_PER_REV,
            has_encoder: true,
            fail_every_n_reads: 0,
        }
    }
}

impl SimulationConfig {
    /// Validate model parameters.
    pub fn validate(&self) -> Result<(), HalError> {
        if !(self.step_s > 0.0) {
            return Err(HalError::ConfigError("simulation step_s must be > 0".to_string()));
        }
        if !(self.spool_diameter_m > 0.0) || self.encoder_counts_per_rev == 0 {
            return Err(HalError::ConfigError(
                "simulation spool geometry must be positive".to_string(),
            ));
        }
        if !(self.damping_n_s_per_m > 0.0) {
            return Err(HalError::ConfigError(
                "simulation damping must be > 0".to_string(),
            ));
        }
        if self.initial_length_m < 0.0 || self.initial_length_m > self.max_length_m {
            return Err(HalError::ConfigError(format!(
                "simulation initial_length_m {} outside [0, {}]",
                self.initial_length_m, self.max_length_m
            )));
        }
        Ok(())
    }
}

/// Source of encoder counts on the VESC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSource {
    /// Commutation tachometer (6 × pole pairs counts per revolution).
    #[default]
    Tachometer,
    /// No position feedback.
    None,
}

/// VESC UART link parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VescConfig {
    /// Serial device path.
    pub port: PathBuf,
    /// UART baud rate.
    pub baud: u32,
    /// Response timeout for one request [ms].
    pub timeout_ms: u64,
    /// Motor pole pairs, converts ERPM to mechanical RPM.
    pub pole_pairs: u8,
    /// Where encoder counts come from.
    pub position_source: PositionSource,
    /// Direction calibration.
    #[serde(flatten)]
    pub calibration: Calibration,
}

impl Default for VescConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from(DEFAULT_VESC_PORT),
            baud: DEFAULT_VESC_BAUD,
            timeout_ms: DEFAULT_VESC_TIMEOUT_MS,
            pole_pairs: DEFAULT_MOTOR_POLE_PAIRS,
            position_source: PositionSource::Tachometer,
            calibration: Calibration::default(),
        }
    }
}

impl VescConfig {
    /// Validate link parameters.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.pole_pairs == 0 {
            return Err(HalError::ConfigError("vesc pole_pairs must be > 0".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(HalError::ConfigError("vesc timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}
