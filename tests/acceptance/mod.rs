//! Integration tests for syntonization acceptance testing.
//!
//! Each scenario builds a simulated bench with chosen oscillator
//! imperfections, runs the discipline engine against it, and checks the
//! calibration result and the drift of the synthesized heartbeat.

mod common;
mod holdover_test;
mod syntonization_test;
