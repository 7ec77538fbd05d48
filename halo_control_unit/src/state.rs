//! Controller state transitions.
//!
//! - [`machine`] - `ControllerState` transition table

pub mod machine;

pub use machine::{ControllerEvent, ControllerStateMachine, TransitionResult};
