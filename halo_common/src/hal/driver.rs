//! The motor driver contract.
//!
//! [`MotorDriver`] is the only way the controller reaches hardware: one
//! telemetry read and one current write per cycle, plus lifecycle hooks.
//! Drivers report every link problem as a [`HalError`]; they never paper
//! over a failed read with a zeroed sample.

use crate::hal::config::DriverConfig;
use crate::hal::types::TelemetrySample;
use thiserror::Error;

/// Driver failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// `init()` could not bring the link or model up.
    #[error("driver init failed: {0}")]
    InitFailed(String),

    /// Driver parameters out of range.
    #[error("driver config: {0}")]
    ConfigError(String),

    /// Read or write on the link failed.
    #[error("link error: {0}")]
    CommunicationError(String),

    /// No complete reply within the link timeout [ms].
    #[error("no reply within {0} ms")]
    Timeout(u64),

    /// Reply arrived but could not be decoded.
    #[error("malformed reply: {0}")]
    MalformedResponse(String),

    /// No driver registered under this name.
    #[error("unknown driver '{0}'")]
    DriverNotFound(String),

    /// A driver with this name is already registered.
    #[error("driver '{0}' registered twice")]
    DuplicateDriver(String),

    /// Called before `init()` or after `shutdown()`.
    #[error("driver not initialized")]
    NotInitialized,
}

/// Constructs an uninitialized driver.
pub type DriverFactory = fn() -> Box<dyn MotorDriver>;

/// Link counters a driver may expose for `self_check` and logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverDiagnostics {
    pub reads: u64,
    pub read_failures: u64,
    pub writes: u64,
    pub write_failures: u64,
    /// Last current the driver accepted [A].
    pub last_written_amps: Option<f64>,
}

/// One motor controller behind one spool.
///
/// Call order: `init()` once, then any number of `read_telemetry()` and
/// `write_current()` calls from the control thread, then `shutdown()`.
/// Reads and writes must return within the driver's link timeout; the
/// cycle period (at most 50 ms) budgets for one of each.
pub trait MotorDriver: Send {
    /// Registry name ("simulation", "vesc").
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// Open the link or reset the model. `InitFailed` on failure.
    fn init(&mut self, config: &DriverConfig) -> Result<(), HalError>;

    /// One telemetry sample, calibrated.
    fn read_telemetry(&mut self) -> Result<TelemetrySample, HalError>;

    /// Command motor current [A]. Already clamped by the caller.
    fn write_current(&mut self, amps: f64) -> Result<(), HalError>;

    /// Release the link. Further calls return `NotInitialized`.
    fn shutdown(&mut self) -> Result<(), HalError>;

    /// Link counters, if the driver keeps them.
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn version(&self) -> &'static str {
        (**self).version()
    }

    fn init(&mut self, config: &DriverConfig) -> Result<(), HalError> {
        (**self).init(config)
    }

    fn read_telemetry(&mut self) -> Result<TelemetrySample, HalError> {
        (**self).read_telemetry()
    }

    fn write_current(&mut self, amps: f64) -> Result<(), HalError> {
        (**self).write_current(amps)
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        (**self).shutdown()
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        (**self).diagnostics()
    }
}
