//! End-to-end syntonization scenarios.
//!
//! Each test runs warm-up, calibration, and a stretch of tracking on a
//! simulated bench and checks the frozen ratio, the programmed period,
//! and the drift of the synthesized heartbeat.

use pps_common::DisciplineState;

use super::common::{worst_offset_micros, Scenario};

#[test]
fn test_warmup_produces_no_heartbeats() {
    let mut scenario = Scenario::ideal();

    // Well past ten reference edges, but one short of calibration
    for _ in 0..19 {
        let report = scenario.step();
        assert!(report.heartbeat.is_none());
        assert!(!report.calibrated);
    }

    assert_eq!(scenario.bench.fires(), 0);
    assert!(scenario.discipline.calibration_ratio().is_none());
}

#[test]
fn test_ideal_bench_calibrates_to_unity() {
    let mut scenario = Scenario::ideal();

    assert!(scenario.run_until_calibrated(100));
    assert_eq!(scenario.state(), DisciplineState::Track);

    let ratio = scenario.discipline.calibration_ratio().unwrap();
    assert!((ratio - 1.0).abs() < 1e-9, "ratio = {ratio}");

    let interval = scenario.discipline.current_interval_micros().unwrap();
    assert!((interval - 1_000_000.0).abs() < 1e-6, "interval = {interval}");
}

#[test]
fn test_ideal_bench_heartbeat_stays_on_the_edge() {
    let mut scenario = Scenario::ideal();
    assert!(scenario.run_until_calibrated(100));

    let reports = scenario.collect_heartbeats(30, 300);
    assert_eq!(reports.len(), 30);
    assert_eq!(scenario.bench.fires(), 30);

    // Perfect oscillators: every firing lands on a reference edge
    let worst = worst_offset_micros(&reports);
    assert!(worst < 0.5, "worst offset = {worst} us");
}

#[test]
fn test_secondary_drift_is_compensated() {
    // TCXO runs 2.5 PPM slow; the rate estimate absorbs it and the
    // synthesized period comes out at one reference period regardless
    let mut scenario = Scenario::with_errors(-2.5, 0.0);
    assert!(scenario.run_until_calibrated(100));

    let ratio = scenario.discipline.calibration_ratio().unwrap();
    assert!(ratio < 1.0, "slow TCXO inflates the rate, ratio = {ratio}");

    let interval = scenario.discipline.current_interval_micros().unwrap();
    assert!((interval - 1_000_000.0).abs() < 0.5, "interval = {interval}");

    let reports = scenario.collect_heartbeats(30, 300);
    let worst = worst_offset_micros(&reports);
    assert!(worst < 1.0, "worst offset = {worst} us");
}

#[test]
fn test_cpu_clock_error_is_calibrated_out() {
    // CPU runs 100 PPM fast: its microseconds are short, so the period
    // programmed in CPU time must be proportionally longer
    let mut scenario = Scenario::with_errors(0.0, 100.0);
    assert!(scenario.run_until_calibrated(100));

    let interval = scenario.discipline.current_interval_micros().unwrap();
    assert!(
        (interval - 1_000_100.0).abs() < 0.5,
        "interval = {interval} cpu-us"
    );

    let reports = scenario.collect_heartbeats(30, 300);
    let worst = worst_offset_micros(&reports);
    assert!(worst < 1.0, "worst offset = {worst} us");
}

#[test]
fn test_calibration_happens_exactly_once() {
    let mut scenario = Scenario::ideal();
    assert!(scenario.run_until_calibrated(100));
    let ratio = scenario.discipline.calibration_ratio().unwrap();

    // A long stretch of tracking must never recompute the ratio
    for _ in 0..200 {
        let report = scenario.step();
        assert!(!report.calibrated);
    }
    assert_eq!(scenario.discipline.calibration_ratio(), Some(ratio));
    assert_eq!(scenario.state(), DisciplineState::Track);
}
