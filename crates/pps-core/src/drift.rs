//! Drift reporting between the synthesized heartbeat and the reference.
//!
//! The raw offset is the cycle-clock distance from the most recent
//! reference edge to the generator firing, scaled to microseconds. With
//! no absolute-seconds tracking, the raw value is ambiguous modulo one
//! period and must be folded before reporting.

use serde::Serialize;

/// Fold a raw offset into a signed report value.
///
/// - In `(period/2, period)`: the heartbeat is just *behind* the upcoming
///   reference edge; report the negative distance `-(period - raw)`.
/// - Above `period`: no reference edge has been captured for the current
///   second; the reading is stale and reports `0`.
/// - Otherwise the raw value is reported unchanged.
#[must_use]
pub fn fold_offset(raw_micros: f64, period_micros: f64) -> f64 {
    let half = period_micros / 2.0;
    if raw_micros > half && raw_micros < period_micros {
        -(period_micros - raw_micros)
    } else if raw_micros > period_micros {
        0.0
    } else {
        raw_micros
    }
}

/// One drift observation, emitted per generator firing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DriftReport {
    /// Generator firing sequence number since calibration.
    pub firing: u64,
    /// Signed offset from the reference in microseconds (folded).
    pub offset_micros: f64,
    /// Period currently programmed into the generator.
    pub interval_micros: f64,
    /// Rate estimate used for the last recompute.
    pub rate_estimate_micros: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: f64 = 1_000_000.0;

    #[test]
    fn test_small_offset_passes_through() {
        assert_eq!(fold_offset(300_000.0, PERIOD), 300_000.0);
        assert_eq!(fold_offset(0.0, PERIOD), 0.0);
        assert_eq!(fold_offset(12.5, PERIOD), 12.5);
    }

    #[test]
    fn test_upper_half_folds_negative() {
        assert_eq!(fold_offset(600_000.0, PERIOD), -400_000.0);
        assert_eq!(fold_offset(999_999.0, PERIOD), -1.0);
    }

    #[test]
    fn test_stale_reading_reports_zero() {
        assert_eq!(fold_offset(1_200_000.0, PERIOD), 0.0);
        assert_eq!(fold_offset(5_000_000.0, PERIOD), 0.0);
    }

    #[test]
    fn test_fold_respects_period() {
        // Same rule for a non-1s nominal period
        assert_eq!(fold_offset(600.0, 1_000.0), -400.0);
        assert_eq!(fold_offset(1_200.0, 1_000.0), 0.0);
        assert_eq!(fold_offset(300.0, 1_000.0), 300.0);
    }
}
