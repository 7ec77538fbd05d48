//! Integration test: arming, stopping, timed sessions and the cycle runner.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use halo_common::control_unit::config::CycleConfig;
use halo_common::control_unit::error::{CommandError, TelemetryError};
use halo_common::control_unit::state::{ControllerState, ResistanceLevel, StatusFlags};
use halo_common::hal::driver::HalError;

use halo_control_unit::clock::Clock;
use halo_control_unit::controller::TickOutcome;
use halo_control_unit::cycle::{CycleRunner, share};

use super::common::{controller, pulling, released, sample};

// ── Stop ────────────────────────────────────────────────────────────

#[test]
fn stop_twice_commands_zero_once() {
    let (mut c, driver, _clock) = controller();
    c.set_resistance_level(2.0).unwrap();

    c.stop().unwrap();
    c.stop().unwrap();

    assert_eq!(driver.writes(), vec![2.0, 0.0]);
    assert_eq!(c.state(), ControllerState::Stopped);
}

#[test]
fn stop_from_idle_commands_zero() {
    let (mut c, driver, _clock) = controller();
    c.stop().unwrap();
    assert_eq!(driver.writes(), vec![0.0]);
    assert_eq!(c.state(), ControllerState::Stopped);
}

#[test]
fn failed_zero_is_retried_by_next_stop() {
    let (mut c, driver, _clock) = controller();
    c.set_resistance_level(2.0).unwrap();

    driver.fail_next_writes(1);
    assert!(matches!(c.stop(), Err(CommandError::LinkDown(_))));
    assert_eq!(c.state(), ControllerState::Stopped);
    assert!(c.current_status().flags.contains(StatusFlags::ZERO_PENDING));

    c.stop().unwrap();
    assert!(!c.current_status().flags.contains(StatusFlags::ZERO_PENDING));

    c.stop().unwrap();
    assert_eq!(driver.writes(), vec![2.0, 0.0]);
}

// ── Arm ─────────────────────────────────────────────────────────────

#[test]
fn arm_with_link_down_still_holds() {
    let (mut c, driver, _clock) = controller();
    driver.push(pulling());
    driver.fail_next_writes(1);

    assert!(matches!(
        c.set_resistance_level(5.0),
        Err(CommandError::LinkDown(_))
    ));
    assert_eq!(c.state(), ControllerState::Holding { requested_amps: 5.0 });
    assert!(c.current_status().flags.contains(StatusFlags::LINK_DOWN));

    // The next cycle re-issues the held current and clears the flag.
    assert_eq!(c.tick(), TickOutcome::Holding);
    assert_eq!(driver.writes(), vec![5.0]);
    assert!(!c.current_status().flags.contains(StatusFlags::LINK_DOWN));
}

#[test]
fn level_change_while_holding() {
    let (mut c, driver, _clock) = controller();
    driver.push(pulling());

    c.set_resistance_preset(ResistanceLevel::Low).unwrap();
    c.tick();
    c.set_resistance_preset(ResistanceLevel::Medium).unwrap();
    c.tick();

    assert_eq!(driver.writes(), vec![2.0, 2.0, 5.0, 5.0]);
}

#[test]
fn infinite_level_is_rejected() {
    let (mut c, driver, _clock) = controller();
    assert_eq!(
        c.set_resistance_level(f64::INFINITY),
        Err(CommandError::NonFiniteSetpoint)
    );
    assert_eq!(c.state(), ControllerState::Idle);
    assert!(driver.writes().is_empty());
}

// ── Telemetry loss ──────────────────────────────────────────────────

#[test]
fn repeated_telemetry_failures_force_stop() {
    let (mut c, driver, _clock) = controller();
    c.set_resistance_level(5.0).unwrap();
    for _ in 0..3 {
        driver.push_error(HalError::Timeout(100));
    }

    assert!(matches!(c.tick(), TickOutcome::TelemetrySkipped(_)));
    assert!(matches!(c.tick(), TickOutcome::TelemetrySkipped(_)));
    assert_eq!(c.tick(), TickOutcome::ForcedStop { failures: 3 });

    assert_eq!(c.state(), ControllerState::Stopped);
    assert_eq!(driver.writes(), vec![5.0, 0.0]);
    let status = c.current_status();
    assert_eq!(status.consecutive_telemetry_failures, 3);
    assert!(matches!(
        status.last_telemetry_error,
        Some(TelemetryError::Unavailable(_))
    ));
}

#[test]
fn good_sample_resets_failure_count() {
    let (mut c, driver, _clock) = controller();
    c.set_resistance_level(5.0).unwrap();
    driver.push_error(HalError::Timeout(100));
    driver.push_error(HalError::Timeout(100));
    driver.push(pulling());
    driver.push_error(HalError::Timeout(100));

    for _ in 0..4 {
        c.tick();
    }
    assert_eq!(c.current_status().consecutive_telemetry_failures, 1);
    assert!(c.state().is_holding());
}

#[test]
fn skipped_cycle_does_not_command() {
    let (mut c, driver, _clock) = controller();
    c.set_resistance_level(5.0).unwrap();
    driver.push_error(HalError::CommunicationError("EIO".to_string()));

    assert!(matches!(c.tick(), TickOutcome::TelemetrySkipped(_)));
    assert_eq!(driver.writes(), vec![5.0]);
    assert!(c.current_status().flags.contains(StatusFlags::TELEMETRY_STALE));
}

// ── Timed sessions ──────────────────────────────────────────────────

#[test]
fn timed_session_ends_with_stop() {
    let (mut c, driver, clock) = controller();
    driver.push(pulling());

    c.set_resistance_for(5.0, Duration::from_secs(10)).unwrap();
    assert_eq!(
        c.current_status().session_remaining,
        Some(Duration::from_secs(10))
    );
    assert_eq!(c.tick(), TickOutcome::Holding);

    clock.advance(Duration::from_secs(4));
    assert_eq!(c.tick(), TickOutcome::Holding);
    assert_eq!(
        c.current_status().session_remaining,
        Some(Duration::from_secs(6))
    );

    clock.advance(Duration::from_secs(6));
    assert_eq!(c.tick(), TickOutcome::SessionComplete);
    assert_eq!(c.state(), ControllerState::Stopped);
    assert_eq!(c.current_status().session_remaining, None);
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn emergency_wins_over_expired_session() {
    let (mut c, driver, clock) = controller();
    driver.push_all([released(), sample(-2.0, -30.0, 0.005)]);

    c.set_resistance_for(5.0, Duration::from_secs(1)).unwrap();
    clock.advance(Duration::from_secs(2));
    assert!(matches!(c.tick(), TickOutcome::EmergencyStop { .. }));
    assert_eq!(c.state(), ControllerState::Stopped);
}

#[test]
fn plain_arm_clears_session() {
    let (mut c, driver, clock) = controller();
    driver.push(pulling());

    c.set_resistance_for(5.0, Duration::from_secs(1)).unwrap();
    c.set_resistance_level(5.0).unwrap();
    clock.advance(Duration::from_secs(5));
    assert_eq!(c.tick(), TickOutcome::Holding);
    assert!(clock.now() >= Duration::from_secs(5));
}

// ── Cycle runner ────────────────────────────────────────────────────

fn fast_cycle() -> CycleConfig {
    CycleConfig {
        period_ms: 1,
        ..Default::default()
    }
}

#[test]
fn runner_stops_after_cycle_limit() {
    let (mut c, driver, _clock) = controller();
    driver.push(pulling());
    c.set_resistance_level(5.0).unwrap();

    let shared = share(c);
    let running = Arc::new(AtomicBool::new(true));
    let mut runner = CycleRunner::new(Arc::clone(&shared), &fast_cycle(), running).max_cycles(5);
    let stats = runner.run().clone();

    assert_eq!(stats.cycle_count, 5);
    assert_eq!(stats.emergency_stops, 0);
    assert_eq!(shared.lock().state(), ControllerState::Stopped);
    assert_eq!(driver.writes().last().copied(), Some(0.0));
}

#[test]
fn runner_exits_on_stop() {
    let (mut c, driver, _clock) = controller();
    driver.push_all([pulling(), pulling(), released(), sample(-2.0, -30.0, 0.005)]);
    c.set_resistance_level(5.0).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let mut runner = CycleRunner::new(share(c), &fast_cycle(), running)
        .exit_on_stop(true)
        .max_cycles(100);
    let stats = runner.run();

    assert_eq!(stats.cycle_count, 3);
    assert_eq!(stats.emergency_stops, 1);
}

#[test]
fn runner_with_cleared_flag_only_stops() {
    let (c, driver, _clock) = controller();
    let running = Arc::new(AtomicBool::new(false));
    let mut runner = CycleRunner::new(share(c), &fast_cycle(), running);

    assert_eq!(runner.run().cycle_count, 0);
    assert_eq!(driver.writes(), vec![0.0]);
}
