//! Hardware abstraction layer for the PPS syntonization runtime.
//!
//! This crate provides:
//! - Narrow capability traits for the four pieces of hardware the core
//!   consumes: [`CycleClock`], [`PulseCounter`], [`FrequencySampler`],
//!   and [`IntervalTimer`]
//! - [`capture`] module with the interrupt-safe [`EdgeCapture`] latch
//! - [`sim`] module with a deterministic simulated bench for testing
//!
//! The core never touches peripheral registers; everything board-specific
//! lives behind these traits.

pub mod capture;
pub mod sim;

pub use capture::*;
pub use sim::*;

use pps_common::DisciplineResult;

/// Free-running monotonic cycle counter.
///
/// Non-wrapping within a session; the common time base for all interval
/// measurements. Read-only to this system.
pub trait CycleClock: Send {
    /// Current cycle-counter value.
    fn now_cycles(&self) -> u64;
}

/// Live running count of secondary-oscillator pulses.
///
/// Snapshotted by the reference-edge handler; the core only consumes the
/// count, never how it is obtained.
pub trait PulseCounter: Send {
    /// Current pulse-counter value. 32-bit with hardware wrap.
    fn count(&self) -> u32;
}

/// Gated one-second pulse counter for the secondary oscillator.
///
/// The gate is timed by the CPU clock. Armed exactly once, on the first
/// reference edge, so the first gate aligns with a reference period
/// boundary rather than an arbitrary instant.
pub trait FrequencySampler: Send {
    /// Start gate-counting. Called once, on the first reference edge.
    fn arm(&mut self) -> DisciplineResult<()>;

    /// Whether the sampler has been armed.
    fn is_armed(&self) -> bool;

    /// Take the latest completed one-second sample, if one is ready.
    /// Each sample is yielded at most once.
    fn poll_sample(&mut self) -> Option<u32>;
}

/// Repeating hardware interval timer driving the synthesized heartbeat.
///
/// The period is rewritten at every firing from the frozen calibration
/// ratio and the latest rate estimate.
pub trait IntervalTimer: Send {
    /// Arm the timer with its initial period, in microseconds of CPU time.
    fn start(&mut self, period_micros: f64) -> DisciplineResult<()>;

    /// Reprogram the period for subsequent firings.
    fn update(&mut self, period_micros: f64) -> DisciplineResult<()>;

    /// Whether the timer has been started.
    fn is_running(&self) -> bool;
}
