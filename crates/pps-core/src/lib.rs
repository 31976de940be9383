//! Core syntonization logic: calibration, rate estimation, interval
//! planning, and drift reporting.
//!
//! Everything in this crate is hardware-free. The [`discipline`] engine
//! consumes the capability traits from `pps-hal` and the shared types
//! from `pps-common`; it never sleeps, blocks, or spawns.

pub mod discipline;
pub mod drift;
pub mod generator;
pub mod rate;

pub use discipline::{compute_calibration_ratio, Discipline, PassReport};
pub use drift::{fold_offset, DriftReport};
pub use generator::IntervalPlanner;
pub use rate::RateEstimator;
