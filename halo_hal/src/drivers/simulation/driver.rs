//! Simulation driver implementation.
//!
//! `SimulationDriver` implements `MotorDriver` on top of [`SpoolModel`].
//! Every telemetry read advances the model by one step, so a run is fully
//! determined by the configuration and the command sequence.

use super::spool::SpoolModel;
use super::DRIVER_NAME;
use halo_common::hal::config::DriverConfig;
use halo_common::hal::driver::{DriverDiagnostics, HalError, MotorDriver};
use halo_common::hal::types::TelemetrySample;
use tracing::{debug, info, warn};

/// Simulation driver implementing the `MotorDriver` trait.
pub struct SimulationDriver {
    /// Spool model, present once initialized
    model: Option<SpoolModel>,
    /// Fail every Nth read (0 = never)
    fail_every_n_reads: u32,
    /// Read/write counters
    diagnostics: DriverDiagnostics,
}

impl SimulationDriver {
    /// Create a new, uninitialized simulation driver.
    pub fn new() -> Self {
        Self {
            model: None,
            fail_every_n_reads: 0,
            diagnostics: DriverDiagnostics::default(),
        }
    }

    /// The spool model, if initialized.
    pub fn model(&self) -> Option<&SpoolModel> {
        self.model.as_ref()
    }

    fn model_mut(&mut self) -> Result<&mut SpoolModel, HalError> {
        self.model.as_mut().ok_or(HalError::NotInitialized)
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &DriverConfig) -> Result<(), HalError> {
        let sim = &config.simulation;
        sim.validate()
            .map_err(|e| HalError::InitFailed(e.to_string()))?;
        info!(
            initial_length_m = sim.initial_length_m,
            max_length_m = sim.max_length_m,
            user_force_n = sim.user_force_n,
            pull_seconds = sim.pull_seconds,
            "Initializing simulation driver"
        );
        self.fail_every_n_reads = sim.fail_every_n_reads;
        self.model = Some(SpoolModel::new(sim.clone()));
        self.diagnostics = DriverDiagnostics::default();
        Ok(())
    }

    fn read_telemetry(&mut self) -> Result<TelemetrySample, HalError> {
        let n = self.fail_every_n_reads;
        let model = self.model_mut()?;
        model.step();
        let sample = model.sample();

        self.diagnostics.reads += 1;
        if n > 0 && self.diagnostics.reads % u64::from(n) == 0 {
            self.diagnostics.read_failures += 1;
            warn!(read = self.diagnostics.reads, "Injected telemetry fault");
            return Err(HalError::CommunicationError(
                "simulated link fault".to_string(),
            ));
        }
        debug!(
            current = sample.motor_current_amps,
            rpm = sample.rotational_speed_rpm,
            "Simulated telemetry"
        );
        Ok(sample)
    }

    fn write_current(&mut self, amps: f64) -> Result<(), HalError> {
        self.model_mut()?.command(amps);
        self.diagnostics.writes += 1;
        self.diagnostics.last_written_amps = Some(amps);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        info!("Shutting down simulation driver");
        self.model = None;
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.diagnostics.clone())
    }
}
