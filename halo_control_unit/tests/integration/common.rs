//! Shared fixtures: a scripted driver and sample builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use halo_common::control_unit::config::ControllerConfig;
use halo_common::hal::config::DriverConfig;
use halo_common::hal::driver::{HalError, MotorDriver};
use halo_common::hal::types::TelemetrySample;
use parking_lot::Mutex;

use halo_control_unit::clock::ManualClock;
use halo_control_unit::controller::ResistanceController;

#[derive(Debug, Default)]
struct Script {
    samples: VecDeque<Result<TelemetrySample, HalError>>,
    last: TelemetrySample,
    writes: Vec<f64>,
    failing_writes: usize,
    reads: usize,
}

/// Driver replaying queued samples. Once the queue is empty the last good
/// sample repeats. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: TelemetrySample) {
        self.script.lock().samples.push_back(Ok(sample));
    }

    pub fn push_all(&self, samples: impl IntoIterator<Item = TelemetrySample>) {
        let mut script = self.script.lock();
        script.samples.extend(samples.into_iter().map(Ok));
    }

    pub fn push_error(&self, err: HalError) {
        self.script.lock().samples.push_back(Err(err));
    }

    /// The next `n` writes fail with a communication error.
    pub fn fail_next_writes(&self, n: usize) {
        self.script.lock().failing_writes = n;
    }

    /// Currents the driver accepted, in order.
    pub fn writes(&self) -> Vec<f64> {
        self.script.lock().writes.clone()
    }

    pub fn reads(&self) -> usize {
        self.script.lock().reads
    }
}

impl MotorDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn version(&self) -> &'static str {
        "0.0.0"
    }

    fn init(&mut self, _config: &DriverConfig) -> Result<(), HalError> {
        Ok(())
    }

    fn read_telemetry(&mut self) -> Result<TelemetrySample, HalError> {
        let mut script = self.script.lock();
        script.reads += 1;
        match script.samples.pop_front() {
            Some(Ok(sample)) => {
                script.last = sample;
                Ok(sample)
            }
            Some(Err(e)) => Err(e),
            None => Ok(script.last),
        }
    }

    fn write_current(&mut self, amps: f64) -> Result<(), HalError> {
        let mut script = self.script.lock();
        if script.failing_writes > 0 {
            script.failing_writes -= 1;
            return Err(HalError::CommunicationError("scripted write failure".to_string()));
        }
        script.writes.push(amps);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

/// Encoder counts for a line length on the default spool.
pub fn counts_for(length_m: f64) -> i64 {
    let config = ControllerConfig::default();
    let circumference = config.spool.circumference();
    (length_m / circumference * f64::from(config.spool.encoder_counts_per_rev)).round() as i64
}

pub fn sample(amps: f64, rpm: f64, length_m: f64) -> TelemetrySample {
    TelemetrySample {
        motor_current_amps: amps,
        rotational_speed_rpm: rpm,
        encoder_position_counts: Some(counts_for(length_m)),
    }
}

/// User pulling the line out at 2 m.
pub fn pulling() -> TelemetrySample {
    sample(5.0, 40.0, 2.0)
}

/// Line released: no current, spool barely turning.
pub fn released() -> TelemetrySample {
    sample(0.05, 1.0, 2.0)
}

/// Controller on the default configuration and a manual clock. The
/// returned driver and clock share state with the controller's.
pub fn controller() -> (
    ResistanceController<ScriptedDriver, ManualClock>,
    ScriptedDriver,
    ManualClock,
) {
    controller_with(ControllerConfig::default())
}

pub fn controller_with(
    config: ControllerConfig,
) -> (
    ResistanceController<ScriptedDriver, ManualClock>,
    ScriptedDriver,
    ManualClock,
) {
    let driver = ScriptedDriver::new();
    let clock = ManualClock::new();
    let controller = ResistanceController::new(config, driver.clone(), clock.clone())
        .expect("default config is valid");
    (controller, driver, clock)
}

pub fn assert_currents(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
    }
}
