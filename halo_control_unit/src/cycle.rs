//! Fixed-period cycle runner around `ResistanceController::tick`.
//!
//! ## RT Setup
//! With the `rt` feature: `mlockall(MCL_CURRENT | MCL_FUTURE)` and
//! `sched_setscheduler(SCHED_FIFO)`. Without it both are no-ops.
//!
//! ## Cycle Loop
//! Absolute-deadline pacing: the next wake time advances by one period per
//! cycle so a slow cycle does not shift the schedule. With `rt` the wait is
//! `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME)`; without it,
//! `thread::sleep` for the remainder. A cycle that runs past its period
//! counts as an overrun and is logged. When the loop falls a full period
//! behind, the schedule is reset.
//!
//! ## Shared Controller
//! The controller lives behind one `parking_lot::Mutex`. The runner holds
//! the lock only for the duration of `tick()`; other threads take it to
//! change the level, stop, or read the status.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use halo_common::control_unit::config::CycleConfig;
use halo_common::control_unit::state::ControllerState;
use halo_common::hal::driver::MotorDriver;

use crate::clock::{Clock, SystemClock};
use crate::controller::{ResistanceController, TickOutcome};

/// Controller shared between the runner and other threads.
pub type SharedController<D, C = SystemClock> = Arc<Mutex<ResistanceController<D, C>>>;

/// Wrap a controller for sharing.
pub fn share<D: MotorDriver, C: Clock>(
    controller: ResistanceController<D, C>,
) -> SharedController<D, C> {
    Arc::new(Mutex::new(controller))
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Running timing and outcome counters. Updated in O(1) per cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleStats {
    /// Ticks executed.
    pub cycle_count: u64,
    /// Duration of the most recent tick.
    pub last: Duration,
    /// Shortest tick, `None` before the first one.
    pub fastest: Option<Duration>,
    /// Longest tick.
    pub slowest: Duration,
    total: Duration,
    /// Ticks that ran past their period.
    pub overruns: u64,
    /// Worst wake-up lateness against the schedule.
    pub max_latency: Duration,
    /// Ticks that ended in an emergency stop.
    pub emergency_stops: u64,
    /// Ticks whose telemetry read failed.
    pub telemetry_skips: u64,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, duration: Duration, latency: Duration) {
        self.cycle_count += 1;
        self.last = duration;
        self.fastest = Some(self.fastest.map_or(duration, |f| f.min(duration)));
        self.slowest = self.slowest.max(duration);
        self.total += duration;
        self.max_latency = self.max_latency.max(latency);
    }

    /// Mean tick duration, zero before the first tick.
    pub fn mean(&self) -> Duration {
        u32::try_from(self.cycle_count)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Duration::ZERO, |n| self.total / n)
    }
}

// ─── RT setup ───────────────────────────────────────────────────────

/// Real-time setup failure.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("mlockall failed: {0}")]
    LockMemory(String),

    #[error("cannot pin to CPU {cpu}: {reason}")]
    Affinity { cpu: usize, reason: String },

    #[error("SCHED_FIFO priority {priority} refused: {source}")]
    Scheduler {
        priority: i32,
        #[source]
        source: std::io::Error,
    },
}

/// Lock memory, pin to `cpu_core` and request `SCHED_FIFO` at `rt_priority`.
/// A no-op unless built with the `rt` feature.
///
/// Call from the thread that will run the cycle loop.
#[cfg(feature = "rt")]
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockallFlags, mlockall};
    use nix::unistd::Pid;

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::LockMemory(e.to_string()))?;

    let affinity = |reason: nix::Error| CycleError::Affinity {
        cpu: cpu_core,
        reason: reason.to_string(),
    };
    let mut cpus = CpuSet::new();
    cpus.set(cpu_core).map_err(affinity)?;
    sched_setaffinity(Pid::from_raw(0), &cpus).map_err(affinity)?;

    let param = libc::sched_param {
        sched_priority: rt_priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(CycleError::Scheduler {
            priority: rt_priority,
            source: std::io::Error::last_os_error(),
        });
    }
    info!(cpu_core, rt_priority, "RT scheduling enabled");
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn rt_setup(_cpu_core: usize, _rt_priority: i32) -> Result<(), CycleError> {
    debug!("Built without `rt`, skipping RT setup");
    Ok(())
}

/// Whether the calling thread runs under a real-time policy.
pub fn detect_rt_mode() -> bool {
    // SAFETY: sched_getscheduler has no memory-safety preconditions.
    let policy = unsafe { libc::sched_getscheduler(0) };
    policy == libc::SCHED_FIFO || policy == libc::SCHED_RR
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Sleeps the cycle thread until an absolute deadline.
struct Pacer {
    origin: Instant,
    /// `CLOCK_MONOTONIC` reading taken together with `origin`.
    #[cfg(feature = "rt")]
    origin_ts: Option<nix::sys::time::TimeSpec>,
}

impl Pacer {
    fn start() -> Self {
        let origin = Instant::now();
        #[cfg(feature = "rt")]
        let origin_ts = match nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(error = %e, "clock_gettime failed, pacing with thread::sleep");
                None
            }
        };
        Self {
            origin,
            #[cfg(feature = "rt")]
            origin_ts,
        }
    }

    fn origin(&self) -> Instant {
        self.origin
    }

    /// Return at or after `deadline`; immediately if it has passed.
    fn sleep_until(&self, deadline: Instant) {
        #[cfg(feature = "rt")]
        {
            use nix::sys::time::TimeSpec;
            use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};

            if let Some(origin_ts) = self.origin_ts {
                let offset = deadline.saturating_duration_since(self.origin);
                let wake = origin_ts + TimeSpec::from_duration(offset);
                loop {
                    match clock_nanosleep(
                        ClockId::CLOCK_MONOTONIC,
                        ClockNanosleepFlags::TIMER_ABSTIME,
                        &wake,
                    ) {
                        Err(nix::errno::Errno::EINTR) => continue,
                        Err(e) => warn!(error = %e, "clock_nanosleep failed"),
                        Ok(_) => {}
                    }
                    return;
                }
            }
        }

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Drives `tick()` at a fixed period until told to stop.
pub struct CycleRunner<D: MotorDriver, C: Clock = SystemClock> {
    controller: SharedController<D, C>,
    period: Duration,
    running: Arc<AtomicBool>,
    exit_on_stop: bool,
    max_cycles: Option<u64>,
    stats: CycleStats,
}

impl<D: MotorDriver, C: Clock> CycleRunner<D, C> {
    /// Runner for `controller` at the configured period.
    pub fn new(
        controller: SharedController<D, C>,
        config: &CycleConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            period: config.period(),
            running,
            exit_on_stop: false,
            max_cycles: None,
            stats: CycleStats::new(),
        }
    }

    /// Leave the loop once the controller reaches `Stopped`.
    pub fn exit_on_stop(mut self, exit: bool) -> Self {
        self.exit_on_stop = exit;
        self
    }

    /// Leave the loop after `cycles` ticks.
    pub fn max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn controller(&self) -> &SharedController<D, C> {
        &self.controller
    }

    /// Run until the running flag clears (or an exit condition hits), then
    /// stop the controller.
    pub fn run(&mut self) -> &CycleStats {
        info!(
            period_ms = self.period.as_millis() as u64,
            rt = detect_rt_mode(),
            "Entering control loop"
        );
        let pacer = Pacer::start();
        let mut next_wake = pacer.origin();

        while self.running.load(Ordering::Acquire) {
            if self.max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                debug!("Cycle limit reached");
                break;
            }

            let cycle_start = Instant::now();
            let latency = cycle_start.saturating_duration_since(next_wake);
            let (outcome, state) = {
                let mut controller = self.controller.lock();
                let outcome = controller.tick();
                (outcome, controller.state())
            };
            let elapsed = cycle_start.elapsed();

            self.stats.record(elapsed, latency);
            if elapsed > self.period {
                self.stats.overruns += 1;
                warn!(
                    elapsed_us = elapsed.as_micros() as u64,
                    period_us = self.period.as_micros() as u64,
                    "Cycle overrun"
                );
            }
            match outcome {
                TickOutcome::EmergencyStop { condition, .. } => {
                    self.stats.emergency_stops += 1;
                    info!(?condition, "Emergency stop completed");
                }
                TickOutcome::TelemetrySkipped(_) => self.stats.telemetry_skips += 1,
                TickOutcome::ForcedStop { failures } => {
                    self.stats.telemetry_skips += 1;
                    warn!(failures, "Controller forced to stop");
                }
                _ => {}
            }

            if self.exit_on_stop && state == ControllerState::Stopped {
                info!("Controller stopped, leaving control loop");
                break;
            }

            next_wake += self.period;
            let now = Instant::now();
            if next_wake > now {
                pacer.sleep_until(next_wake);
            } else if now - next_wake > self.period {
                debug!("Behind schedule, resetting cycle deadline");
                next_wake = now;
            }
        }

        if let Err(e) = self.controller.lock().stop() {
            warn!(error = %e, "Final stop failed");
        }
        info!(
            cycles = self.stats.cycle_count,
            mean_us = self.stats.mean().as_micros() as u64,
            slowest_us = self.stats.slowest.as_micros() as u64,
            overruns = self.stats.overruns,
            "Control loop finished"
        );
        &self.stats
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
