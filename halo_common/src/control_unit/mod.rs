//! Control unit shared types.
//!
//! Types shared between the resistance control loop, the drivers and any
//! supervising UI live here, organized by domain: configuration, safety
//! parameters, state enums and the error taxonomy.

pub mod config;
pub mod error;
pub mod safety;
pub mod state;
