//! Common types shared across the PPS syntonization workspace.
//!
//! Configuration, error types, the calibration state machine, and drift
//! statistics. Everything here is hardware-free and policy-free; the
//! discipline logic lives in `pps-core`.

pub mod config;
pub mod error;
pub mod state;
pub mod stats;

pub use config::*;
pub use error::*;
pub use state::*;
pub use stats::*;
