//! Integration test: the shutdown sequence against a scripted driver.
//!
//! Drives `ShutdownSequence` phase by phase, the way the controller does,
//! and checks every reel-in exit path ends in a zero-current command.

use std::time::Duration;

use halo_common::control_unit::config::ShutdownConfig;
use halo_common::control_unit::error::TelemetryError;
use halo_common::control_unit::safety::SafetyConfig;
use halo_common::hal::driver::HalError;
use halo_common::hal::types::TelemetrySample;

use halo_control_unit::clock::{Clock, ManualClock};
use halo_control_unit::command::CurrentCommander;
use halo_control_unit::safety::{ReelInEnd, ShutdownReport, ShutdownSequence};
use halo_control_unit::units::SpoolGeometry;

use super::common::{ScriptedDriver, assert_currents, sample};

fn run(
    requested_amps: f64,
    driver: &mut ScriptedDriver,
    clock: &ManualClock,
    shutdown: &ShutdownConfig,
) -> ShutdownReport {
    let safety = SafetyConfig::default();
    let geometry = SpoolGeometry::from_config(&Default::default()).unwrap();
    let mut commander = CurrentCommander::new(safety.max_allowed_current_amps);
    let mut sequence = ShutdownSequence::new(shutdown, &safety).unwrap();

    sequence.ramp_down(requested_amps, driver, &mut commander, clock);
    let end = sequence.reel_in(driver, &mut commander, clock, &geometry);
    let ok = sequence.final_stop(driver, &mut commander).is_some();
    sequence.finish(end, ok)
}

#[test]
fn ramp_from_five_amps() {
    let mut driver = ScriptedDriver::new();
    driver.push(sample(-2.0, -30.0, 0.005));
    let clock = ManualClock::new();

    let report = run(5.0, &mut driver, &clock, &ShutdownConfig::default());
    assert_currents(&report.ramp_commands, &[3.0, 1.5, 0.5]);
    assert_currents(&driver.writes(), &[3.0, 1.5, 0.5, -2.0, 0.0]);
    assert_eq!(report.reel_in_iterations, 1);
}

#[test]
fn reel_in_polls_until_retracted() {
    let mut driver = ScriptedDriver::new();
    driver.push_all([1.2, 0.8, 0.4, 0.1, 0.005].map(|l| sample(-2.0, -30.0, l)));
    let clock = ManualClock::new();

    let report = run(2.0, &mut driver, &clock, &ShutdownConfig::default());
    assert_eq!(report.reel_in_iterations, 5);
    assert!(matches!(report.reel_in_end, ReelInEnd::Retracted { .. }));
    assert_eq!(driver.reads(), 5);
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn missing_encoder_ends_reel_in() {
    let mut driver = ScriptedDriver::new();
    driver.push(TelemetrySample {
        motor_current_amps: -2.0,
        rotational_speed_rpm: -30.0,
        encoder_position_counts: None,
    });
    let clock = ManualClock::new();

    let report = run(5.0, &mut driver, &clock, &ShutdownConfig::default());
    assert_eq!(report.reel_in_end, ReelInEnd::FeedbackLost);
    assert_eq!(report.reel_in_iterations, 1);
    assert!(report.final_stop_ok);
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn telemetry_loss_ends_reel_in() {
    let mut driver = ScriptedDriver::new();
    driver.push_error(HalError::Timeout(100));
    let clock = ManualClock::new();

    let report = run(5.0, &mut driver, &clock, &ShutdownConfig::default());
    assert!(matches!(
        report.reel_in_end,
        ReelInEnd::TelemetryUnavailable(TelemetryError::Unavailable(_))
    ));
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn stuck_line_times_out() {
    let mut driver = ScriptedDriver::new();
    driver.push(sample(-2.0, 0.0, 2.0));
    let clock = ManualClock::new();
    let shutdown = ShutdownConfig {
        reel_in_timeout_s: 1.0,
        ..Default::default()
    };

    let report = run(5.0, &mut driver, &clock, &shutdown);
    assert_eq!(report.reel_in_end, ReelInEnd::TimedOut);
    // 0.1 s polls: the timeout is noticed on the eleventh read.
    assert_eq!(report.reel_in_iterations, 11);
    assert!(clock.now() >= Duration::from_secs(1));
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn write_failures_do_not_abort() {
    let mut driver = ScriptedDriver::new();
    driver.push(sample(-2.0, -30.0, 0.005));
    driver.fail_next_writes(4);
    let clock = ManualClock::new();

    let report = run(5.0, &mut driver, &clock, &ShutdownConfig::default());
    // Three ramp steps and the reel-in command failed; the final stop landed.
    assert_eq!(report.command_failures, 4);
    assert!(report.ramp_commands.is_empty());
    assert!(report.final_stop_ok);
    assert_eq!(driver.writes(), vec![0.0]);
}

#[test]
fn failed_final_stop_is_reported() {
    let mut driver = ScriptedDriver::new();
    driver.push(sample(-2.0, -30.0, 0.005));
    let clock = ManualClock::new();
    let safety = SafetyConfig::default();
    let geometry = SpoolGeometry::from_config(&Default::default()).unwrap();
    let mut commander = CurrentCommander::new(safety.max_allowed_current_amps);
    let mut sequence = ShutdownSequence::new(&ShutdownConfig::default(), &safety).unwrap();

    sequence.ramp_down(5.0, &mut driver, &mut commander, &clock);
    let end = sequence.reel_in(&mut driver, &mut commander, &clock, &geometry);
    driver.fail_next_writes(1);
    let ok = sequence.final_stop(&mut driver, &mut commander).is_some();
    let report = sequence.finish(end, ok);

    assert!(!report.final_stop_ok);
    assert_eq!(report.command_failures, 1);
}
