//! Configuration structures for the control unit.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every section
//! is optional and falls back to the defaults in `crate::consts`.
//! The configuration is immutable once the controller is constructed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_CYCLE_PERIOD_MS, DEFAULT_ENCODER_COUNTS_PER_REV, DEFAULT_LEVEL_EXTREME_A,
    DEFAULT_LEVEL_HIGH_A, DEFAULT_LEVEL_LOW_A, DEFAULT_LEVEL_MEDIUM_A, DEFAULT_RAMP_FACTORS,
    DEFAULT_RAMP_SETTLE_S, DEFAULT_REEL_IN_TIMEOUT_S, DEFAULT_RETRACTED_LENGTH_M,
    DEFAULT_SPOOL_DIAMETER_M, DEFAULT_TELEMETRY_FAILURE_LIMIT, MAX_CYCLE_PERIOD_MS,
    MAX_REEL_IN_TIMEOUT_S, MAX_SHUTDOWN_DELAY_S,
};
use crate::hal::config::DriverConfig;

use super::safety::SafetyConfig;
use super::state::ResistanceLevel;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level controller configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "halo-cu"
///
/// [spool]
/// encoder_counts_per_rev = 8192
/// diameter_m = 0.027
///
/// [driver]
/// name = "simulation"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Service identity and log level.
    pub shared: SharedConfig,
    /// Control loop pacing and failure escalation.
    pub cycle: CycleConfig,
    /// Spool and encoder geometry.
    pub spool: SpoolConfig,
    /// Trip thresholds and reel-in parameters.
    pub safety: SafetyConfig,
    /// Ramp-down and reel-in termination.
    pub shutdown: ShutdownConfig,
    /// Resistance presets.
    pub levels: ResistanceLevels,
    /// Motor driver selection.
    pub driver: DriverConfig,
}

impl ControllerConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidGeometry` for non-positive circumference or
    ///   zero encoder resolution
    /// - `ConfigError::ValidationError` for any other bound
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.cycle.validate()?;
        self.spool.validate()?;
        self.safety.validate()?;
        self.shutdown.validate()?;
        self.levels.validate(self.safety.max_allowed_current_amps)?;
        self.driver
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Convert `secs` to a `Duration`, requiring `0 <= secs <= max`
/// (`0 < secs` when `allow_zero` is false).
pub(crate) fn bounded_secs(
    name: &str,
    secs: f64,
    max: f64,
    allow_zero: bool,
) -> Result<Duration, ConfigError> {
    let low_ok = if allow_zero { secs >= 0.0 } else { secs > 0.0 };
    if !secs.is_finite() || !low_ok || secs > max {
        let low = if allow_zero { "[0" } else { "(0" };
        return Err(ConfigError::ValidationError(format!(
            "{name} = {secs} outside {low}, {max}] s"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::ValidationError(format!("{name}: {e}")))
}

// ─── Cycle ──────────────────────────────────────────────────────────

fn default_period_ms() -> u64 {
    DEFAULT_CYCLE_PERIOD_MS
}
fn default_failure_limit() -> u32 {
    DEFAULT_TELEMETRY_FAILURE_LIMIT
}

/// `[cycle]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Hold-phase period [ms] (1..=50).
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Consecutive telemetry failures that force a stop (0 = never).
    #[serde(default = "default_failure_limit")]
    pub telemetry_failure_limit: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            telemetry_failure_limit: default_failure_limit(),
        }
    }
}

impl CycleConfig {
    /// Period as a `Duration`.
    #[inline]
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 || self.period_ms > MAX_CYCLE_PERIOD_MS {
            return Err(ConfigError::ValidationError(format!(
                "period_ms {} out of range [1, {}]",
                self.period_ms, MAX_CYCLE_PERIOD_MS
            )));
        }
        Ok(())
    }
}

// ─── Spool ──────────────────────────────────────────────────────────

/// `[spool]` section.
///
/// `circumference_m` overrides `diameter_m` when present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// Encoder counts per spool revolution.
    pub encoder_counts_per_rev: u32,
    /// Spool diameter [m].
    pub diameter_m: f64,
    /// Measured spool circumference [m].
    pub circumference_m: Option<f64>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            encoder_counts_per_rev: DEFAULT_ENCODER_COUNTS_PER_REV,
            diameter_m: DEFAULT_SPOOL_DIAMETER_M,
            circumference_m: None,
        }
    }
}

impl SpoolConfig {
    /// Effective circumference [m].
    #[inline]
    pub fn circumference(&self) -> f64 {
        self.circumference_m
            .unwrap_or(std::f64::consts::PI * self.diameter_m)
    }

    /// Validate geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encoder_counts_per_rev == 0 {
            return Err(ConfigError::InvalidGeometry(
                "encoder_counts_per_rev must be > 0".to_string(),
            ));
        }
        let circumference = self.circumference();
        if !circumference.is_finite() || circumference <= 0.0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "spool circumference must be > 0, got {circumference}"
            )));
        }
        Ok(())
    }
}

// ─── Shutdown ───────────────────────────────────────────────────────

/// `[shutdown]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Fractions of the held current issued in order during ramp-down.
    pub ramp_factors: Vec<f64>,
    /// Hold time after each ramp step [s].
    pub ramp_settle_s: f64,
    /// Length treated as fully retracted [m].
    pub retracted_length_m: f64,
    /// Upper bound on the reel-in phase [s].
    pub reel_in_timeout_s: f64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            ramp_factors: DEFAULT_RAMP_FACTORS.to_vec(),
            ramp_settle_s: DEFAULT_RAMP_SETTLE_S,
            retracted_length_m: DEFAULT_RETRACTED_LENGTH_M,
            reel_in_timeout_s: DEFAULT_REEL_IN_TIMEOUT_S,
        }
    }
}

impl ShutdownConfig {
    /// Settle delay as a `Duration`.
    ///
    /// # Errors
    /// `ValidationError` unless `0 <= ramp_settle_s <= MAX_SHUTDOWN_DELAY_S`.
    pub fn ramp_settle(&self) -> Result<Duration, ConfigError> {
        bounded_secs("ramp_settle_s", self.ramp_settle_s, MAX_SHUTDOWN_DELAY_S, true)
    }

    /// Reel-in timeout as a `Duration`.
    ///
    /// # Errors
    /// `ValidationError` unless `0 < reel_in_timeout_s <= MAX_REEL_IN_TIMEOUT_S`.
    pub fn reel_in_timeout(&self) -> Result<Duration, ConfigError> {
        bounded_secs(
            "reel_in_timeout_s",
            self.reel_in_timeout_s,
            MAX_REEL_IN_TIMEOUT_S,
            false,
        )
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bad) = self
            .ramp_factors
            .iter()
            .find(|f| !f.is_finite() || !(0.0..=1.0).contains(*f))
        {
            return Err(ConfigError::ValidationError(format!(
                "ramp factor {bad} outside [0, 1]"
            )));
        }
        self.ramp_settle()?;
        if !self.retracted_length_m.is_finite() || self.retracted_length_m < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "retracted_length_m must be >= 0, got {}",
                self.retracted_length_m
            )));
        }
        self.reel_in_timeout()?;
        Ok(())
    }
}

// ─── Presets ────────────────────────────────────────────────────────

/// `[levels]` section: preset currents [A].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceLevels {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub extreme: f64,
}

impl Default for ResistanceLevels {
    fn default() -> Self {
        Self {
            low: DEFAULT_LEVEL_LOW_A,
            medium: DEFAULT_LEVEL_MEDIUM_A,
            high: DEFAULT_LEVEL_HIGH_A,
            extreme: DEFAULT_LEVEL_EXTREME_A,
        }
    }
}

impl ResistanceLevels {
    /// Current for a preset [A].
    #[inline]
    pub const fn amps(&self, level: ResistanceLevel) -> f64 {
        match level {
            ResistanceLevel::Low => self.low,
            ResistanceLevel::Medium => self.medium,
            ResistanceLevel::High => self.high,
            ResistanceLevel::Extreme => self.extreme,
        }
    }

    /// Presets must be finite and within the current clamp.
    pub fn validate(&self, max_allowed_current_amps: f64) -> Result<(), ConfigError> {
        for (name, value) in [
            ("low", self.low),
            ("medium", self.medium),
            ("high", self.high),
            ("extreme", self.extreme),
        ] {
            if !value.is_finite() || value.abs() > max_allowed_current_amps {
                return Err(ConfigError::ValidationError(format!(
                    "level {name} = {value} A exceeds max_allowed_current_amps {max_allowed_current_amps}"
                )));
            }
        }
        Ok(())
    }
}
