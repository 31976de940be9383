//! Period planning for the syntonized interval generator.
//!
//! Every firing recomputes the next period from the frozen calibration
//! ratio and the latest rate estimate. A guard band around the nominal
//! period keeps a bad estimate or misconfiguration from arming a wildly
//! wrong timer: out-of-band periods are rejected and the caller holds the
//! last-known-good value.

use pps_common::{DisciplineConfig, DisciplineError, DisciplineResult};

/// Computes and bounds-checks generator periods.
#[derive(Debug, Clone, Copy)]
pub struct IntervalPlanner {
    nominal_micros: f64,
    guard_ppm: f64,
    bias_micros: f64,
}

impl IntervalPlanner {
    /// Create a planner from the runtime configuration.
    #[must_use]
    pub fn new(config: &DisciplineConfig) -> Self {
        Self {
            nominal_micros: config.nominal_interval_micros,
            guard_ppm: config.interval_guard_ppm,
            bias_micros: config.empirical_bias_micros,
        }
    }

    /// The initial period, computed once at calibration.
    ///
    /// No bias correction: the bias compensates the reprogram path, which
    /// has not run yet.
    pub fn initial(&self, ratio: f64, rate_estimate_micros: f64) -> DisciplineResult<f64> {
        self.check(ratio * rate_estimate_micros)
    }

    /// The period for the next firing, recomputed at every firing.
    pub fn next(&self, ratio: f64, rate_estimate_micros: f64) -> DisciplineResult<f64> {
        self.check(ratio * rate_estimate_micros - self.bias_micros)
    }

    fn check(&self, proposed_micros: f64) -> DisciplineResult<f64> {
        let deviation_ppm =
            ((proposed_micros - self.nominal_micros) / self.nominal_micros).abs() * 1e6;
        if !proposed_micros.is_finite() || deviation_ppm > self.guard_ppm {
            return Err(DisciplineError::IntervalOutOfBounds {
                proposed_micros,
                nominal_micros: self.nominal_micros,
                deviation_ppm,
                guard_ppm: self.guard_ppm,
            });
        }
        Ok(proposed_micros)
    }
}
