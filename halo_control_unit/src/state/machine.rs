//! ControllerState transitions.
//!
//! `Idle → Holding → {Holding | ShuttingDown(RampDown → ReelIn → FinalStop) → Stopped}`.
//! `stop()` reaches `Stopped` directly from `Idle` or `Holding`. A shutdown
//! in progress cannot be interrupted or re-armed.

use halo_common::control_unit::state::{ControllerState, ShutdownPhase};

/// Result of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionResult {
    /// Transition succeeded; new state.
    Ok(ControllerState),
    /// Transition rejected, with reason.
    Rejected(&'static str),
}

/// Event that can trigger a state transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    /// Operator requested a resistance level [A].
    Arm(f64),
    /// Safety evaluator reported an emergency.
    EmergencyTrip,
    /// Current shutdown phase finished.
    PhaseComplete,
    /// Operator or runner requested a stop.
    Stop,
}

/// Holds the single `ControllerState`.
#[derive(Debug, Clone, Default)]
pub struct ControllerStateMachine {
    state: ControllerState,
}

impl ControllerStateMachine {
    /// Create a state machine in `Idle`.
    pub const fn new() -> Self {
        Self {
            state: ControllerState::Idle,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&mut self, event: ControllerEvent) -> TransitionResult {
        use ControllerEvent::*;
        use ControllerState::*;
        use ShutdownPhase::*;

        let next = match (self.state, event) {
            // Idle/Stopped/Holding → Holding (arm or level change)
            (Idle | Stopped | Holding { .. }, Arm(amps)) => Holding {
                requested_amps: amps,
            },

            // Holding → ShuttingDown
            (Holding { .. }, EmergencyTrip) => ShuttingDown(RampDown),

            // Shutdown phases advance in order, then Stopped
            (ShuttingDown(RampDown), PhaseComplete) => ShuttingDown(ReelIn),
            (ShuttingDown(ReelIn), PhaseComplete) => ShuttingDown(FinalStop),
            (ShuttingDown(FinalStop), PhaseComplete) => Stopped,

            // Idle/Holding → Stopped
            (Idle | Holding { .. }, Stop) => Stopped,

            (state, event) => {
                return TransitionResult::Rejected(invalid_transition_reason(state, event));
            }
        };

        self.state = next;
        TransitionResult::Ok(next)
    }

    /// Whether a shutdown sequence is executing.
    #[inline]
    pub const fn is_shutting_down(&self) -> bool {
        matches!(self.state, ControllerState::ShuttingDown(_))
    }
}

fn invalid_transition_reason(state: ControllerState, event: ControllerEvent) -> &'static str {
    use ControllerEvent::*;
    use ControllerState::*;

    match (state, event) {
        (ShuttingDown(_), Arm(_)) => "cannot arm during shutdown",
        (ShuttingDown(_), Stop) => "shutdown already in progress",
        (ShuttingDown(_), EmergencyTrip) => "shutdown already in progress",
        (Stopped, Stop) => "already stopped",
        (_, EmergencyTrip) => "emergency trip only while holding",
        (_, PhaseComplete) => "no shutdown in progress",
        _ => "invalid transition",
    }
}
