//! Resistance control loop.
//!
//! [`ResistanceController`] owns the driver, the clock and the single
//! `ControllerState`. External callers arm it with a resistance level and
//! stop it; a runner calls [`tick`](ResistanceController::tick) at a fixed
//! period. Each tick in `Holding`:
//!
//! 1. Read telemetry (failure skips the cycle; repeated failures force a stop)
//! 2. Convert encoder counts to line length
//! 3. Re-issue the held current
//! 4. Evaluate safety; on a trip run the shutdown sequence
//! 5. End a timed session whose deadline has passed

use std::fmt;
use std::time::Duration;

use halo_common::config::ConfigError;
use halo_common::control_unit::config::ControllerConfig;
use halo_common::control_unit::error::{CommandError, TelemetryError};
use halo_common::control_unit::safety::EmergencyCondition;
use halo_common::control_unit::state::{ControllerState, ResistanceLevel, StatusFlags};
use halo_common::hal::driver::{DriverDiagnostics, MotorDriver};
use halo_common::hal::types::TelemetrySample;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::command::{CommandOutcome, CurrentCommander};
use crate::safety::evaluator::evaluate;
use crate::safety::shutdown::{ShutdownReport, ShutdownSequence};
use crate::state::machine::{ControllerEvent, ControllerStateMachine, TransitionResult};
use crate::units::{LinearPosition, SpoolGeometry};

// ─── Status ─────────────────────────────────────────────────────────

/// Snapshot of everything the controller knows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerStatus {
    /// Lifecycle state.
    pub state: ControllerState,
    /// Most recent successful telemetry sample.
    pub last_sample: Option<TelemetrySample>,
    /// Position derived from `last_sample`.
    pub last_position: Option<LinearPosition>,
    /// Verdict of the most recent safety evaluation.
    pub last_emergency: EmergencyCondition,
    /// Telemetry failures since the last good sample.
    pub consecutive_telemetry_failures: u32,
    /// Most recent telemetry failure.
    pub last_telemetry_error: Option<TelemetryError>,
    /// Most recent command failure.
    pub last_command_error: Option<CommandError>,
    /// Most recent successful command.
    pub last_command: Option<CommandOutcome>,
    /// Report of the most recent shutdown sequence.
    pub last_shutdown: Option<ShutdownReport>,
    /// Diagnostic flags.
    pub flags: StatusFlags,
    /// Ticks executed.
    pub cycle_count: u64,
    /// Time left in a timed session.
    pub session_remaining: Option<Duration>,
}

/// What one `tick()` did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not holding; telemetry refreshed only.
    Inactive,
    /// Holding, no emergency.
    Holding,
    /// Telemetry read failed; cycle skipped.
    TelemetrySkipped(TelemetryError),
    /// Too many consecutive telemetry failures; motor stopped.
    ForcedStop {
        /// Consecutive failures at the time of the stop.
        failures: u32,
    },
    /// Safety trip; shutdown sequence completed.
    EmergencyStop {
        /// Condition that tripped.
        condition: EmergencyCondition,
        /// What the shutdown sequence did.
        report: ShutdownReport,
    },
    /// Timed session ended; motor stopped.
    SessionComplete,
}

/// Result of [`ResistanceController::self_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelfCheckReport {
    /// Driver name.
    pub driver: &'static str,
    /// Driver version.
    pub driver_version: &'static str,
    /// Whether a telemetry read succeeded.
    pub link_ok: bool,
    /// Read failure, if any.
    pub error: Option<TelemetryError>,
    /// Sample read, if any.
    pub sample: Option<TelemetrySample>,
    /// Whether the sample carried an encoder position.
    pub encoder_present: bool,
    /// Position derived from the sample.
    pub position: Option<LinearPosition>,
    /// Driver counters, if the driver keeps them.
    pub diagnostics: Option<DriverDiagnostics>,
}

impl fmt::Display for SelfCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver {} v{}: ", self.driver, self.driver_version)?;
        match (&self.sample, &self.error) {
            (Some(s), _) => {
                write!(
                    f,
                    "link OK, {:.2} A, {:.1} rpm",
                    s.motor_current_amps, s.rotational_speed_rpm
                )?;
                match self.position {
                    Some(p) => write!(f, ", line {:.3} m", p.length_meters),
                    None => write!(f, ", no encoder"),
                }
            }
            (None, Some(e)) => write!(f, "link FAILED ({e})"),
            (None, None) => write!(f, "link FAILED"),
        }
    }
}

/// Status callback invoked on every state transition.
pub type Subscriber = Box<dyn FnMut(&ControllerStatus) + Send>;

// ─── Controller ─────────────────────────────────────────────────────

/// Safety controller for one motor-driven spool.
pub struct ResistanceController<D: MotorDriver, C: Clock = SystemClock> {
    config: ControllerConfig,
    geometry: SpoolGeometry,
    driver: D,
    clock: C,
    commander: CurrentCommander,
    machine: ControllerStateMachine,
    status: ControllerStatus,
    session_deadline: Option<Duration>,
    subscribers: Vec<Subscriber>,
    shutdown_plan: ShutdownSequence,
}

impl<D: MotorDriver> ResistanceController<D, SystemClock> {
    /// Controller on wall-clock time.
    pub fn with_system_clock(config: ControllerConfig, driver: D) -> Result<Self, ConfigError> {
        Self::new(config, driver, SystemClock::new())
    }
}

impl<D: MotorDriver, C: Clock> ResistanceController<D, C> {
    /// Build a controller in `Idle`. The driver must already be initialized.
    ///
    /// # Errors
    /// `ConfigError::InvalidGeometry` for a zero encoder resolution or a
    /// non-positive circumference; `ConfigError::ValidationError` for any
    /// other out-of-range parameter.
    pub fn new(config: ControllerConfig, driver: D, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = SpoolGeometry::from_config(&config.spool)?;
        let commander = CurrentCommander::new(config.safety.max_allowed_current_amps);
        let shutdown_plan = ShutdownSequence::new(&config.shutdown, &config.safety)?;
        info!(
            driver = driver.name(),
            counts_per_rev = geometry.encoder_counts_per_rev(),
            circumference_m = geometry.spool_circumference_m(),
            max_current_a = config.safety.max_allowed_current_amps,
            "Resistance controller ready"
        );
        Ok(Self {
            config,
            geometry,
            driver,
            clock,
            commander,
            machine: ControllerStateMachine::new(),
            status: ControllerStatus::default(),
            session_deadline: None,
            subscribers: Vec::new(),
            shutdown_plan,
        })
    }

    // ─── Operations ─────────────────────────────────────────────────

    /// Arm the controller (or change the level) and command `amps`.
    ///
    /// A failed write still leaves the controller in `Holding`; the held
    /// current is re-issued every tick and the error is returned here.
    ///
    /// # Errors
    /// - `CommandError::NonFiniteSetpoint`: rejected, state unchanged.
    /// - `CommandError::Rejected`: a shutdown is in progress.
    /// - `CommandError::LinkDown`: the first command failed.
    pub fn set_resistance_level(&mut self, amps: f64) -> Result<CommandOutcome, CommandError> {
        if !amps.is_finite() {
            warn!(amps, "Ignoring non-finite resistance level");
            self.status.last_command_error = Some(CommandError::NonFiniteSetpoint);
            return Err(CommandError::NonFiniteSetpoint);
        }
        if let TransitionResult::Rejected(reason) = self.machine.handle_event(ControllerEvent::Arm(amps)) {
            warn!(amps, reason, "Resistance level rejected");
            return Err(CommandError::Rejected(reason));
        }

        self.session_deadline = None;
        self.status.consecutive_telemetry_failures = 0;
        self.status.last_emergency = EmergencyCondition::None;
        self.status.flags.remove(
            StatusFlags::EMERGENCY | StatusFlags::TELEMETRY_STALE | StatusFlags::ZERO_PENDING,
        );
        info!(amps, "Holding resistance");
        self.notify();

        self.issue_command(amps)
    }

    /// Arm with a named preset.
    pub fn set_resistance_preset(
        &mut self,
        level: ResistanceLevel,
    ) -> Result<CommandOutcome, CommandError> {
        let amps = self.config.levels.amps(level);
        debug!(?level, amps, "Resolved resistance preset");
        self.set_resistance_level(amps)
    }

    /// Arm for a limited time. The session ends with a plain stop.
    ///
    /// The deadline is armed even if the first command fails.
    pub fn set_resistance_for(
        &mut self,
        amps: f64,
        duration: Duration,
    ) -> Result<CommandOutcome, CommandError> {
        let result = self.set_resistance_level(amps);
        if self.machine.state().is_holding() {
            self.session_deadline = Some(self.clock.now() + duration);
            info!(amps, duration_s = duration.as_secs_f64(), "Timed session started");
        }
        result
    }

    /// Stop the motor: `Stopped`, zero current once.
    ///
    /// Repeated calls are no-ops, except that a zero command which failed
    /// earlier is retried.
    pub fn stop(&mut self) -> Result<(), CommandError> {
        match self.machine.handle_event(ControllerEvent::Stop) {
            TransitionResult::Ok(_) => {
                self.session_deadline = None;
                info!("Controller stopped");
                self.notify();
                self.command_zero()
            }
            TransitionResult::Rejected(reason) => {
                if self.machine.state() == ControllerState::Stopped {
                    if self.status.flags.contains(StatusFlags::ZERO_PENDING) {
                        info!("Retrying zero current command");
                        return self.command_zero();
                    }
                    debug!("stop() while already stopped");
                    return Ok(());
                }
                warn!(reason, "stop() rejected");
                Err(CommandError::Rejected(reason))
            }
        }
    }

    /// One control cycle.
    pub fn tick(&mut self) -> TickOutcome {
        self.status.cycle_count += 1;

        let sample = match self.driver.read_telemetry() {
            Ok(sample) => sample,
            Err(e) => return self.on_telemetry_failure(e.into()),
        };
        let position = self.record_sample(sample);

        let ControllerState::Holding { requested_amps } = self.machine.state() else {
            return TickOutcome::Inactive;
        };

        // Failure is recorded in the status; the cycle carries on.
        let _ = self.issue_command(requested_amps);

        let condition = evaluate(&sample, position, &self.config.safety);
        self.status.last_emergency = condition;
        self.status.flags.set(StatusFlags::EMERGENCY, condition.is_emergency());
        if condition.is_emergency() {
            warn!(
                ?condition,
                current = sample.motor_current_amps,
                rpm = sample.rotational_speed_rpm,
                length_m = position.map(|p| p.length_meters),
                "Emergency detected, starting shutdown"
            );
            let report = self.run_shutdown(requested_amps);
            return TickOutcome::EmergencyStop { condition, report };
        }

        if self
            .session_deadline
            .is_some_and(|deadline| self.clock.now() >= deadline)
        {
            info!("Timed session complete");
            let _ = self.stop();
            return TickOutcome::SessionComplete;
        }

        TickOutcome::Holding
    }

    /// Snapshot of the controller status.
    pub fn current_status(&self) -> ControllerStatus {
        let mut status = self.status.clone();
        status.state = self.machine.state();
        status.session_remaining = self
            .session_deadline
            .map(|deadline| deadline.saturating_sub(self.clock.now()));
        status
    }

    /// Register a callback invoked with a snapshot on every state transition.
    pub fn subscribe(&mut self, callback: impl FnMut(&ControllerStatus) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// Read telemetry once and report link and encoder health.
    ///
    /// Never commands current and never changes state.
    pub fn self_check(&mut self) -> SelfCheckReport {
        let read = self.driver.read_telemetry();
        let (sample, error) = match read {
            Ok(sample) => (Some(sample), None),
            Err(e) => (None, Some(TelemetryError::from(e))),
        };
        let position = sample.and_then(|s| self.geometry.position(s.encoder_position_counts));
        let report = SelfCheckReport {
            driver: self.driver.name(),
            driver_version: self.driver.version(),
            link_ok: sample.is_some(),
            error,
            sample,
            encoder_present: sample.is_some_and(|s| s.has_encoder()),
            position,
            diagnostics: self.driver.diagnostics(),
        };
        info!(report = %report, "Self check");
        report
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub const fn state(&self) -> ControllerState {
        self.machine.state()
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[inline]
    pub fn geometry(&self) -> &SpoolGeometry {
        &self.geometry
    }

    #[inline]
    pub fn commander(&self) -> &CurrentCommander {
        &self.commander
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct driver access, e.g. for `shutdown()` on exit.
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn record_sample(&mut self, sample: TelemetrySample) -> Option<LinearPosition> {
        let position = self.geometry.position(sample.encoder_position_counts);
        self.status.last_sample = Some(sample);
        self.status.last_position = position;
        self.status.consecutive_telemetry_failures = 0;
        self.status.flags.remove(StatusFlags::TELEMETRY_STALE);
        self.status.flags.set(StatusFlags::ENCODER_MISSING, !sample.has_encoder());
        position
    }

    fn on_telemetry_failure(&mut self, err: TelemetryError) -> TickOutcome {
        self.status.consecutive_telemetry_failures += 1;
        self.status.flags.insert(StatusFlags::TELEMETRY_STALE);
        let failures = self.status.consecutive_telemetry_failures;
        warn!(failures, error = %err, "Telemetry read failed, skipping cycle");
        self.status.last_telemetry_error = Some(err.clone());

        if !self.machine.state().is_holding() {
            return TickOutcome::Inactive;
        }
        let limit = self.config.cycle.telemetry_failure_limit;
        if limit > 0 && failures >= limit {
            error!(failures, limit, "Telemetry lost, forcing stop");
            let _ = self.stop();
            return TickOutcome::ForcedStop { failures };
        }
        TickOutcome::TelemetrySkipped(err)
    }

    fn issue_command(&mut self, amps: f64) -> Result<CommandOutcome, CommandError> {
        let result = self.commander.set_current(&mut self.driver, amps);
        match &result {
            Ok(outcome) => {
                self.status.last_command = Some(*outcome);
                self.status.flags.set(StatusFlags::CLAMPED, outcome.is_clamped());
                self.status.flags.remove(StatusFlags::LINK_DOWN);
            }
            Err(e) => {
                self.status.last_command_error = Some(e.clone());
                self.status.flags.insert(StatusFlags::LINK_DOWN);
            }
        }
        result
    }

    fn command_zero(&mut self) -> Result<(), CommandError> {
        match self.issue_command(0.0) {
            Ok(_) => {
                self.status.flags.remove(StatusFlags::ZERO_PENDING);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Zero current command failed, will retry on next stop()");
                self.status.flags.insert(StatusFlags::ZERO_PENDING);
                Err(e)
            }
        }
    }

    fn run_shutdown(&mut self, requested_amps: f64) -> ShutdownReport {
        let mut sequence = self.shutdown_plan.clone();
        self.session_deadline = None;

        self.transition(ControllerEvent::EmergencyTrip);
        sequence.ramp_down(requested_amps, &mut self.driver, &mut self.commander, &self.clock);

        self.transition(ControllerEvent::PhaseComplete);
        let reel_in_end =
            sequence.reel_in(&mut self.driver, &mut self.commander, &self.clock, &self.geometry);

        self.transition(ControllerEvent::PhaseComplete);
        let final_command = sequence.final_stop(&mut self.driver, &mut self.commander);
        let final_stop_ok = final_command.is_some();
        self.status.flags.set(StatusFlags::ZERO_PENDING, !final_stop_ok);
        if let Some(outcome) = final_command {
            self.status.last_command = Some(outcome);
            self.status.flags.set(StatusFlags::CLAMPED, outcome.is_clamped());
        }

        let report = sequence.finish(reel_in_end, final_stop_ok);
        info!(
            ramp_steps = report.ramp_commands.len(),
            reel_in_iterations = report.reel_in_iterations,
            reel_in_end = ?report.reel_in_end,
            command_failures = report.command_failures,
            final_stop_ok,
            "Shutdown sequence complete"
        );
        self.status.last_shutdown = Some(report.clone());
        self.transition(ControllerEvent::PhaseComplete);
        report
    }

    fn transition(&mut self, event: ControllerEvent) {
        match self.machine.handle_event(event) {
            TransitionResult::Ok(state) => {
                info!(%state, "State transition");
                self.notify();
            }
            TransitionResult::Rejected(reason) => {
                warn!(?event, reason, "Transition rejected");
            }
        }
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.current_status();
        for subscriber in &mut self.subscribers {
            subscriber(&snapshot);
        }
    }
}
