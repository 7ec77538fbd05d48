//! First-order spool physics.
//!
//! The line is a damped mass-less body: velocity is the net force over the
//! damping coefficient. The user pulls outward with a constant force for
//! `pull_seconds`, then lets go. The motor winds the line in with a force
//! proportional to the magnitude of the commanded current; the sign
//! convention of real wiring is a commissioning concern handled by
//! calibration, not by the model.

use halo_common::hal::config::SimulationConfig;
use halo_common::hal::types::TelemetrySample;
use tracing::trace;

/// Below this speed the line is treated as parked [m/s].
const PARKED_SPEED_M_S: f64 = 1e-6;

/// Spool state advanced in fixed steps.
#[derive(Debug, Clone)]
pub struct SpoolModel {
    config: SimulationConfig,
    /// Paid-out line length [m].
    length_m: f64,
    /// Line speed, positive = paying out [m/s].
    velocity_m_s: f64,
    /// Simulated time [s].
    time_s: f64,
    /// Last commanded motor current [A].
    commanded_amps: f64,
}

impl SpoolModel {
    /// Create a model at its initial length, at rest.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            length_m: config.initial_length_m,
            velocity_m_s: 0.0,
            time_s: 0.0,
            commanded_amps: 0.0,
            config,
        }
    }

    /// Paid-out line length [m].
    #[inline]
    pub const fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Line speed, positive = paying out [m/s].
    #[inline]
    pub const fn velocity_m_s(&self) -> f64 {
        self.velocity_m_s
    }

    /// Simulated time [s].
    #[inline]
    pub const fn time_s(&self) -> f64 {
        self.time_s
    }

    /// Whether the simulated user is still pulling.
    #[inline]
    pub fn user_pulling(&self) -> bool {
        self.time_s < self.config.pull_seconds
    }

    /// Set the motor current applied from the next step on.
    #[inline]
    pub fn command(&mut self, amps: f64) {
        self.commanded_amps = amps;
    }

    /// Advance the model by one step.
    pub fn step(&mut self) {
        let dt = self.config.step_s;
        let radius = self.config.spool_diameter_m / 2.0;
        let user_force = if self.user_pulling() {
            self.config.user_force_n
        } else {
            0.0
        };
        let motor_force = self.commanded_amps.abs() * self.config.torque_constant_nm_per_a / radius;
        let velocity = (user_force - motor_force) / self.config.damping_n_s_per_m;

        let unbounded = self.length_m + velocity * dt;
        let length = unbounded.clamp(0.0, self.config.max_length_m);
        self.velocity_m_s = if length == unbounded { velocity } else { 0.0 };
        self.length_m = length;
        self.time_s += dt;

        trace!(
            t = self.time_s,
            length = self.length_m,
            velocity = self.velocity_m_s,
            "spool step"
        );
    }

    /// Telemetry as the motor controller would report it.
    ///
    /// A parked spool with no user on the line draws no current.
    pub fn sample(&self) -> TelemetrySample {
        let circumference = std::f64::consts::PI * self.config.spool_diameter_m;
        let loaded = self.user_pulling() || self.velocity_m_s.abs() > PARKED_SPEED_M_S;
        let counts_per_rev = f64::from(self.config.encoder_counts_per_rev);
        TelemetrySample {
            motor_current_amps: if loaded { self.commanded_amps } else { 0.0 },
            rotational_speed_rpm: self.velocity_m_s / circumference * 60.0,
            encoder_position_counts: self
                .config
                .has_encoder
                .then(|| (self.length_m / circumference * counts_per_rev).round() as i64),
        }
    }
}
