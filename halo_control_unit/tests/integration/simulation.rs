//! Integration test: controller against the simulation driver.
//!
//! The simulated user pulls for `pull_seconds`, then lets go; the held
//! current winds the line back in until the minimum-extension check trips.

use halo_common::control_unit::config::ControllerConfig;
use halo_common::control_unit::safety::EmergencyCondition;
use halo_common::control_unit::state::ControllerState;
use halo_common::hal::config::{DriverConfig, SimulationConfig};
use halo_common::hal::driver::MotorDriver;
use halo_hal::{DriverRegistry, SimulationDriver};

use halo_control_unit::clock::ManualClock;
use halo_control_unit::controller::{ResistanceController, TickOutcome};
use halo_control_unit::safety::ReelInEnd;

fn simulated(
    sim: SimulationConfig,
) -> ResistanceController<SimulationDriver, ManualClock> {
    let mut driver = SimulationDriver::new();
    driver
        .init(&DriverConfig {
            name: "simulation".to_string(),
            simulation: sim,
            ..Default::default()
        })
        .unwrap();
    ResistanceController::new(ControllerConfig::default(), driver, ManualClock::new()).unwrap()
}

/// Tick until the controller trips or `limit` cycles pass.
fn run_until_trip<D: MotorDriver>(
    c: &mut ResistanceController<D, ManualClock>,
    limit: usize,
) -> Option<TickOutcome> {
    for _ in 0..limit {
        let outcome = c.tick();
        if matches!(outcome, TickOutcome::EmergencyStop { .. }) {
            return Some(outcome);
        }
    }
    None
}

#[test]
fn release_winds_in_and_trips_near_spool() {
    let mut c = simulated(SimulationConfig::default());
    c.set_resistance_level(5.0).unwrap();

    let Some(TickOutcome::EmergencyStop { condition, report }) = run_until_trip(&mut c, 1000) else {
        panic!("simulation never tripped");
    };
    assert_eq!(condition, EmergencyCondition::LineNearMinimumExtension);
    assert!(matches!(report.reel_in_end, ReelInEnd::Retracted { .. }));
    assert!(report.final_stop_ok);
    assert_eq!(c.state(), ControllerState::Stopped);

    let model = c.driver().model().unwrap();
    assert!(model.length_m() < 0.011);
    assert!(!model.user_pulling());
    let diagnostics = c.driver().diagnostics().unwrap();
    assert_eq!(diagnostics.last_written_amps, Some(0.0));
}

#[test]
fn user_pulling_keeps_holding() {
    let mut c = simulated(SimulationConfig {
        pull_seconds: 100.0,
        ..Default::default()
    });
    c.set_resistance_level(5.0).unwrap();

    for _ in 0..200 {
        assert_eq!(c.tick(), TickOutcome::Holding);
    }
    let status = c.current_status();
    assert!(status.last_position.unwrap().length_meters > 2.5);
}

#[test]
fn low_current_without_encoder_trips_no_pull() {
    let mut c = simulated(SimulationConfig {
        initial_length_m: 4.0,
        has_encoder: false,
        ..Default::default()
    });
    c.set_resistance_level(0.05).unwrap();

    let Some(TickOutcome::EmergencyStop { condition, report }) = run_until_trip(&mut c, 10) else {
        panic!("simulation never tripped");
    };
    assert_eq!(condition, EmergencyCondition::NoPullDetected);
    assert_eq!(report.reel_in_end, ReelInEnd::FeedbackLost);
    assert_eq!(c.state(), ControllerState::Stopped);
}

#[test]
fn injected_link_faults_force_stop() {
    let mut c = simulated(SimulationConfig {
        pull_seconds: 100.0,
        fail_every_n_reads: 1,
        ..Default::default()
    });
    c.set_resistance_level(5.0).unwrap();

    assert!(matches!(c.tick(), TickOutcome::TelemetrySkipped(_)));
    assert!(matches!(c.tick(), TickOutcome::TelemetrySkipped(_)));
    assert!(matches!(c.tick(), TickOutcome::ForcedStop { failures: 3 }));
    assert_eq!(c.state(), ControllerState::Stopped);
}

#[test]
fn registry_builds_the_simulation_driver() {
    let registry = DriverRegistry::with_builtin_drivers();
    let mut driver = registry.create_driver("simulation").unwrap();
    driver.init(&DriverConfig::default()).unwrap();

    let mut c = ResistanceController::new(ControllerConfig::default(), driver, ManualClock::new())
        .unwrap();
    let report = c.self_check();
    assert!(report.link_ok);
    assert!(report.encoder_present);
    assert_eq!(report.driver, "simulation");
}
