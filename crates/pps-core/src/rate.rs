//! Secondary-oscillator rate estimation from gated samples.
//!
//! Each one-second gate yields a raw pulse count. The estimate derived
//! from it is the number of microseconds the secondary oscillator actually
//! took to produce its nominal one-second count, measured against the CPU
//! clock:
//!
//! `rate_micros = nominal_hz / count * 1e6`
//!
//! Multiplying by the calibration ratio turns this into true microseconds;
//! the ratio absorbs whatever systematic bias the CPU clock puts into the
//! gate timing.

use pps_common::{DisciplineConfig, DisciplineError, DisciplineResult};

/// Converts gated pulse counts into rate estimates, holding the previous
/// estimate across rejected samples.
#[derive(Debug)]
pub struct RateEstimator {
    nominal_hz: f64,
    nominal_count: u64,
    guard_ppm: f64,
    current_micros: Option<f64>,
    accepted: u64,
    rejected: u64,
}

impl RateEstimator {
    /// Create an estimator from the runtime configuration.
    #[must_use]
    pub fn new(config: &DisciplineConfig) -> Self {
        Self {
            nominal_hz: config.nominal_secondary_hz,
            nominal_count: config.nominal_sample_count(),
            guard_ppm: config.sample_guard_ppm,
            current_micros: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Ingest one gated sample.
    ///
    /// Zero or out-of-band counts are rejected: a zero count would divide
    /// by zero, and a wildly off count means a wiring or configuration
    /// fault, not oscillator drift. The previous estimate is held either
    /// way (open-loop hold).
    pub fn ingest(&mut self, count: u32) -> DisciplineResult<f64> {
        if count == 0 || self.deviation_ppm(count) > self.guard_ppm {
            self.rejected += 1;
            return Err(DisciplineError::ImplausibleSample {
                count,
                expected: self.nominal_count,
                guard_ppm: self.guard_ppm,
            });
        }

        let rate = self.nominal_hz / f64::from(count) * 1e6;
        self.current_micros = Some(rate);
        self.accepted += 1;
        Ok(rate)
    }

    fn deviation_ppm(&self, count: u32) -> f64 {
        let nominal = self.nominal_count as f64;
        ((f64::from(count) - nominal) / nominal).abs() * 1e6
    }

    /// The most recent accepted estimate, if any sample has arrived yet.
    #[must_use]
    pub fn current(&self) -> Option<f64> {
        self.current_micros
    }

    /// Number of accepted samples.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of rejected samples.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
