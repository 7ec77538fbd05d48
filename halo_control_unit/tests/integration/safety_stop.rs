//! Integration test: emergency detection through to `Stopped`.
//!
//! 1. Held current is re-issued every tick while the user pulls
//! 2. A trip (released line, or line near minimum extension while winding
//!    in) runs RampDown → ReelIn → FinalStop
//! 3. The controller ends in `Stopped` with zero current commanded

use std::sync::Arc;
use std::time::Duration;

use halo_common::config::ConfigError;
use halo_common::control_unit::config::ControllerConfig;
use halo_common::control_unit::safety::{EmergencyCondition, SafetyConfig};
use halo_common::control_unit::state::{ControllerState, ShutdownPhase, StatusFlags};
use parking_lot::Mutex;

use halo_control_unit::clock::ManualClock;
use halo_control_unit::command::CommandOutcome;
use halo_control_unit::controller::{ResistanceController, TickOutcome};
use halo_control_unit::safety::{ReelInEnd, evaluate};
use halo_control_unit::units::LinearPosition;

use super::common::{ScriptedDriver, assert_currents, controller, pulling, released, sample};

// ── Evaluator ───────────────────────────────────────────────────────

fn at(length_meters: f64) -> Option<LinearPosition> {
    Some(LinearPosition { length_meters })
}

#[test]
fn released_line_is_no_pull() {
    let s = sample(0.05, 1.0, 2.0);
    assert_eq!(
        evaluate(&s, at(2.0), &SafetyConfig::default()),
        EmergencyCondition::NoPullDetected
    );
}

#[test]
fn winding_in_below_stop_distance_trips() {
    let s = sample(3.0, -3.0, 1.0);
    let config = SafetyConfig {
        stop_at_distance_meters: 1.524,
        ..Default::default()
    };
    assert_eq!(
        evaluate(&s, at(1.0), &config),
        EmergencyCondition::LineNearMinimumExtension
    );
}

#[test]
fn winding_in_above_stop_distance_is_normal() {
    let s = sample(3.0, -3.0, 2.0);
    assert_eq!(
        evaluate(&s, at(2.0), &SafetyConfig::default()),
        EmergencyCondition::None
    );
}

#[test]
fn paying_out_below_stop_distance_is_normal() {
    let s = sample(3.0, 12.0, 1.0);
    assert_eq!(
        evaluate(&s, at(1.0), &SafetyConfig::default()),
        EmergencyCondition::None
    );
}

// ── Controller ──────────────────────────────────────────────────────

#[test]
fn release_runs_full_shutdown() {
    let (mut c, driver, clock) = controller();
    driver.push_all([pulling(), released(), sample(-2.0, -30.0, 0.5), sample(-2.0, -30.0, 0.005)]);

    c.set_resistance_level(5.0).unwrap();
    assert_eq!(c.tick(), TickOutcome::Holding);

    let TickOutcome::EmergencyStop { condition, report } = c.tick() else {
        panic!("expected an emergency stop");
    };
    assert_eq!(condition, EmergencyCondition::NoPullDetected);
    assert_currents(&report.ramp_commands, &[3.0, 1.5, 0.5]);
    assert_eq!(report.reel_in_iterations, 2);
    assert!(matches!(report.reel_in_end, ReelInEnd::Retracted { length_m } if length_m <= 0.01));
    assert!(report.final_stop_ok);
    assert_eq!(report.command_failures, 0);

    assert_currents(
        &driver.writes(),
        &[5.0, 5.0, 5.0, 3.0, 1.5, 0.5, -2.0, -2.0, 0.0],
    );
    assert_eq!(c.state(), ControllerState::Stopped);

    // Three ramp settles and one poll interval between the reel-in reads.
    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len(), 4);
    assert_eq!(clock.total_slept(), Duration::from_secs_f64(0.3) * 3 + Duration::from_secs_f64(0.1));
}

#[test]
fn line_near_minimum_extension_trips() {
    let (mut c, driver, _clock) = controller();
    driver.push_all([pulling(), sample(3.0, -3.0, 1.0), sample(-2.0, -30.0, 0.005)]);

    c.set_resistance_level(5.0).unwrap();
    assert_eq!(c.tick(), TickOutcome::Holding);
    let outcome = c.tick();
    assert!(matches!(
        outcome,
        TickOutcome::EmergencyStop {
            condition: EmergencyCondition::LineNearMinimumExtension,
            ..
        }
    ));

    let status = c.current_status();
    assert_eq!(status.state, ControllerState::Stopped);
    assert_eq!(status.last_emergency, EmergencyCondition::LineNearMinimumExtension);
    assert!(status.flags.contains(StatusFlags::EMERGENCY));
    assert!(status.last_shutdown.is_some());
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn no_trip_while_user_pulls() {
    let (mut c, driver, _clock) = controller();
    driver.push(pulling());

    c.set_resistance_level(5.0).unwrap();
    for _ in 0..20 {
        assert_eq!(c.tick(), TickOutcome::Holding);
    }
    assert_eq!(c.state(), ControllerState::Holding { requested_amps: 5.0 });
    assert_eq!(c.current_status().last_emergency, EmergencyCondition::None);
}

#[test]
fn subscribers_see_every_shutdown_phase() {
    let (mut c, driver, _clock) = controller();
    driver.push_all([pulling(), released(), sample(-2.0, -30.0, 0.005)]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    c.subscribe(move |status| sink.lock().push(status.state));

    c.set_resistance_level(5.0).unwrap();
    c.tick();
    c.tick();

    assert_eq!(
        *seen.lock(),
        vec![
            ControllerState::Holding { requested_amps: 5.0 },
            ControllerState::ShuttingDown(ShutdownPhase::RampDown),
            ControllerState::ShuttingDown(ShutdownPhase::ReelIn),
            ControllerState::ShuttingDown(ShutdownPhase::FinalStop),
            ControllerState::Stopped,
        ]
    );
}

#[test]
fn rearm_after_emergency() {
    let (mut c, driver, _clock) = controller();
    driver.push_all([released(), sample(-2.0, -30.0, 0.005), pulling()]);

    c.set_resistance_level(5.0).unwrap();
    assert!(matches!(c.tick(), TickOutcome::EmergencyStop { .. }));
    assert_eq!(c.state(), ControllerState::Stopped);

    c.set_resistance_level(2.0).unwrap();
    assert_eq!(c.state(), ControllerState::Holding { requested_amps: 2.0 });
    assert_eq!(c.tick(), TickOutcome::Holding);
    assert!(!c.current_status().flags.contains(StatusFlags::EMERGENCY));
}

#[test]
fn clamped_level_is_flagged() {
    let (mut c, driver, _clock) = controller();
    driver.push(pulling());

    let outcome = c.set_resistance_level(50.0).unwrap();
    assert!(outcome.is_clamped());
    assert_eq!(outcome.effective(), 20.0);
    assert_eq!(driver.writes(), vec![20.0]);
    assert!(c.current_status().flags.contains(StatusFlags::CLAMPED));
}

#[test]
fn shutdown_after_clamped_level_reports_the_zero_command() {
    let (mut c, driver, _clock) = controller();
    driver.push_all([pulling(), released(), sample(-2.0, -30.0, 0.005)]);

    assert!(c.set_resistance_level(50.0).unwrap().is_clamped());
    assert_eq!(c.tick(), TickOutcome::Holding);
    assert!(matches!(c.tick(), TickOutcome::EmergencyStop { .. }));

    let status = c.current_status();
    assert_eq!(status.last_command, Some(CommandOutcome::Applied(0.0)));
    assert!(!status.flags.contains(StatusFlags::CLAMPED));
    // Ramp steps scale the requested 50 A and are clamped individually.
    assert_currents(&driver.writes()[3..], &[20.0, 15.0, 5.0, -2.0, 0.0]);
}

#[test]
fn unbounded_reel_in_timeout_is_refused_at_construction() {
    let mut config = ControllerConfig::default();
    config.shutdown.reel_in_timeout_s = 1e30;

    let result = ResistanceController::new(config, ScriptedDriver::new(), ManualClock::new());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
