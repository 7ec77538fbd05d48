//! System-wide constants for the HydroHalo workspace.
//!
//! Single source of truth for default calibration, safety thresholds and
//! shutdown timing. Every value here can be overridden from the TOML config.

use static_assertions::const_assert;

// ─── Spool / Encoder ────────────────────────────────────────────────

/// Encoder counts per spool revolution (CPR × quadrature).
pub const DEFAULT_ENCODER_COUNTS_PER_REV: u32 = 8192;

/// Spool diameter [m] (27 mm).
pub const DEFAULT_SPOOL_DIAMETER_M: f64 = 0.027;

/// Motor pole pairs (ERPM → mechanical RPM).
pub const DEFAULT_MOTOR_POLE_PAIRS: u8 = 7;

// ─── Safety thresholds ──────────────────────────────────────────────

/// Below this motor current the line is considered slack [A].
pub const DEFAULT_PULL_FORCE_CURRENT_THRESHOLD_A: f64 = 0.2;

/// Below this speed the spool is considered stationary [rpm].
pub const DEFAULT_RPM_MOVING_THRESHOLD: f64 = 5.0;

/// Hard ceiling for any current command [A].
pub const DEFAULT_MAX_ALLOWED_CURRENT_A: f64 = 20.0;

/// Reel-in current, negative = inward [A].
pub const DEFAULT_REEL_IN_CURRENT_A: f64 = -2.0;

/// Delay between reel-in telemetry checks [s].
pub const DEFAULT_REEL_IN_POLL_INTERVAL_S: f64 = 0.1;

/// Minimum safe extension (5 ft) [m].
pub const DEFAULT_STOP_AT_DISTANCE_M: f64 = 5.0 * FEET_TO_METERS;

/// Feet → meters.
pub const FEET_TO_METERS: f64 = 0.3048;

// ─── Shutdown sequence ──────────────────────────────────────────────

/// Ramp-down factors applied to the held current, in order.
pub const DEFAULT_RAMP_FACTORS: [f64; 3] = [0.6, 0.3, 0.1];

/// Settle delay after each ramp step [s].
pub const DEFAULT_RAMP_SETTLE_S: f64 = 0.3;

/// Length at which the line counts as fully retracted [m].
pub const DEFAULT_RETRACTED_LENGTH_M: f64 = 0.01;

/// Upper bound on the reel-in phase [s].
pub const DEFAULT_REEL_IN_TIMEOUT_S: f64 = 30.0;

/// Longest accepted ramp settle or reel-in poll delay [s].
pub const MAX_SHUTDOWN_DELAY_S: f64 = 10.0;

/// Longest accepted reel-in timeout [s].
pub const MAX_REEL_IN_TIMEOUT_S: f64 = 600.0;

// ─── Cycle ──────────────────────────────────────────────────────────

/// Control loop period in the hold phase [ms].
pub const DEFAULT_CYCLE_PERIOD_MS: u64 = 50;

/// Longest accepted hold-phase period [ms].
pub const MAX_CYCLE_PERIOD_MS: u64 = 50;

/// Consecutive telemetry failures before a forced stop (0 = never).
pub const DEFAULT_TELEMETRY_FAILURE_LIMIT: u32 = 3;

// ─── Resistance presets [A] ─────────────────────────────────────────

pub const DEFAULT_LEVEL_LOW_A: f64 = 2.0;
pub const DEFAULT_LEVEL_MEDIUM_A: f64 = 5.0;
pub const DEFAULT_LEVEL_HIGH_A: f64 = 10.0;
pub const DEFAULT_LEVEL_EXTREME_A: f64 = 15.0;

// ─── Paths ──────────────────────────────────────────────────────────

/// Default controller configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/halo/halo.toml";

/// Default serial device for the VESC link.
pub const DEFAULT_VESC_PORT: &str = "/dev/ttyUSB0";

/// Default VESC UART baud rate.
pub const DEFAULT_VESC_BAUD: u32 = 115_200;

/// Default VESC response timeout [ms].
pub const DEFAULT_VESC_TIMEOUT_MS: u64 = 100;

const_assert!(-DEFAULT_REEL_IN_CURRENT_A <= DEFAULT_MAX_ALLOWED_CURRENT_A);
const_assert!(DEFAULT_REEL_IN_CURRENT_A < 0.0);
const_assert!(DEFAULT_STOP_AT_DISTANCE_M >= 0.0);
const_assert!(DEFAULT_LEVEL_EXTREME_A <= DEFAULT_MAX_ALLOWED_CURRENT_A);
const_assert!(DEFAULT_CYCLE_PERIOD_MS <= MAX_CYCLE_PERIOD_MS);
const_assert!(DEFAULT_RAMP_SETTLE_S <= MAX_SHUTDOWN_DELAY_S);
const_assert!(DEFAULT_REEL_IN_POLL_INTERVAL_S <= MAX_SHUTDOWN_DELAY_S);
const_assert!(DEFAULT_REEL_IN_TIMEOUT_S <= MAX_REEL_IN_TIMEOUT_S);
const_assert!(DEFAULT_ENCODER_COUNTS_PER_REV > 0);
