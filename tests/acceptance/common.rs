//! Common utilities for acceptance scenarios.
//!
//! Provides a scenario runner that interleaves simulated hardware events
//! with control-loop passes, the way the daemon's main loop does, and
//! collects the resulting drift reports.

#![allow(dead_code)]

use pps_common::{DisciplineConfig, DisciplineState};
use pps_core::{Discipline, DriftReport, PassReport};
use pps_hal::{BenchParams, SimulatedBench};

/// A bench plus the discipline engine wired to it.
pub struct Scenario {
    pub bench: SimulatedBench,
    pub discipline: Discipline<SimulatedBench, SimulatedBench>,
}

impl Scenario {
    /// Build a scenario from a runtime configuration.
    pub fn new(config: DisciplineConfig) -> Self {
        let bench = SimulatedBench::new(BenchParams::from_config(&config));
        let discipline = Discipline::new(config, bench.capture(), bench.clone(), bench.clone());
        Self { bench, discipline }
    }

    /// An ideal bench with default configuration: perfect oscillators.
    pub fn ideal() -> Self {
        Self::new(DisciplineConfig::default())
    }

    /// A bench whose oscillators are off nominal by the given PPM errors.
    pub fn with_errors(secondary_drift_ppm: f64, cpu_clock_error_ppm: f64) -> Self {
        let mut config = DisciplineConfig::default();
        config.simulation.secondary_drift_ppm = secondary_drift_ppm;
        config.simulation.cpu_clock_error_ppm = cpu_clock_error_ppm;
        Self::new(config)
    }

    /// One hardware event followed by one control-loop pass.
    pub fn step(&mut self) -> PassReport {
        self.bench.step();
        self.discipline
            .poll()
            .expect("control-loop pass should not fail")
    }

    /// Run until the calibration ratio is computed, bounded by
    /// `max_steps`. Returns whether calibration happened.
    pub fn run_until_calibrated(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.step().calibrated {
                return true;
            }
        }
        false
    }

    /// Collect the next `count` drift reports, bounded by `max_steps`.
    pub fn collect_heartbeats(&mut self, count: usize, max_steps: usize) -> Vec<DriftReport> {
        let mut reports = Vec::with_capacity(count);
        for _ in 0..max_steps {
            if let Some(drift) = self.step().heartbeat {
                reports.push(drift);
                if reports.len() == count {
                    break;
                }
            }
        }
        reports
    }

    /// Current discipline lifecycle state.
    pub fn state(&self) -> DisciplineState {
        self.discipline.state()
    }
}

/// Largest absolute offset in a set of drift reports.
pub fn worst_offset_micros(reports: &[DriftReport]) -> f64 {
    reports
        .iter()
        .map(|r| r.offset_micros.abs())
        .fold(0.0, f64::max)
}
