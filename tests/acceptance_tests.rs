//! Acceptance tests for the PPS syntonization runtime.
//!
//! These tests drive the full discipline engine against the simulated
//! bench and verify end-to-end behavior:
//! - Warm-up, one-shot calibration, and heartbeat generation
//! - Compensation of secondary-oscillator drift and CPU clock error
//! - Guard-band holds when the bench misbehaves

mod acceptance;
