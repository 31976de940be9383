//! Guard-band and holdover scenarios.
//!
//! When the bench produces implausible samples, the discipline must hold
//! rather than propagate garbage into the synthesized heartbeat.

use pps_common::{DisciplineConfig, DisciplineState};

use super::common::Scenario;

#[test]
fn test_implausible_samples_block_calibration() {
    // TCXO 2.5% off nominal: every gated sample lands outside the
    // 10_000 PPM plausibility band, so no rate estimate is ever accepted
    // and the generator must never start
    let mut scenario = Scenario::with_errors(25_000.0, 0.0);

    for _ in 0..100 {
        let report = scenario.step();
        assert!(report.heartbeat.is_none());
        assert!(!report.calibrated);
    }

    assert_eq!(scenario.state(), DisciplineState::Calibrate);
    assert_eq!(scenario.bench.fires(), 0);
    assert!(scenario.discipline.calibration_ratio().is_none());
    assert!(scenario.discipline.rejected_samples() > 5);
    assert!(scenario.discipline.rate_estimate_micros().is_none());
}

#[test]
fn test_widened_sample_guard_admits_the_same_bench() {
    // Same 2.5%-off TCXO, but with the plausibility band opened up the
    // discipline calibrates and still synthesizes one reference period
    let mut config = DisciplineConfig::default();
    config.simulation.secondary_drift_ppm = 25_000.0;
    config.sample_guard_ppm = 50_000.0;
    let mut scenario = Scenario::new(config);

    assert!(scenario.run_until_calibrated(100));
    assert_eq!(scenario.state(), DisciplineState::Track);

    // 2.5% fast TCXO: the rate estimate shrinks, the ratio grows, and
    // the product still comes out at the reference period
    let ratio = scenario.discipline.calibration_ratio().unwrap();
    assert!(ratio > 1.02, "ratio = {ratio}");

    let interval = scenario.discipline.current_interval_micros().unwrap();
    assert!((interval - 1_000_000.0).abs() < 0.5, "interval = {interval}");
}

#[test]
fn test_rejections_do_not_disturb_tracking() {
    // A healthy bench with statistics on: rejected-sample and held-
    // reprogram counters stay at zero through a long run
    let mut scenario = Scenario::ideal();
    assert!(scenario.run_until_calibrated(100));

    let reports = scenario.collect_heartbeats(60, 600);
    assert_eq!(reports.len(), 60);
    assert_eq!(scenario.discipline.rejected_samples(), 0);
    assert_eq!(scenario.discipline.held_reprograms(), 0);

    let stats = scenario.discipline.stats();
    assert_eq!(stats.firings, 60);
    assert_eq!(stats.alerts, 0);
}
