//! Drift statistics for the synthesized heartbeat.
//!
//! Accumulates the signed offsets reported per generator firing into
//! min/max/mean/jitter figures for the telemetry stream. Purely
//! observational; nothing feeds back into the discipline.

use serde::Serialize;

/// Accumulated drift statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftStats {
    /// Number of offsets recorded.
    pub firings: u64,
    /// Minimum observed offset in microseconds.
    pub min_offset_micros: f64,
    /// Maximum observed offset in microseconds.
    pub max_offset_micros: f64,
    /// Sum of offsets for mean calculation.
    pub sum_offset_micros: f64,
    /// Offsets whose magnitude exceeded the alert threshold.
    pub alerts: u64,
    /// Alert threshold in microseconds.
    pub alert_threshold_micros: f64,
}

impl DriftStats {
    /// Create new stats with the given alert threshold.
    #[must_use]
    pub fn new(alert_threshold_micros: f64) -> Self {
        Self {
            min_offset_micros: f64::INFINITY,
            max_offset_micros: f64::NEG_INFINITY,
            alert_threshold_micros,
            ..Default::default()
        }
    }

    /// Record one signed offset measurement.
    pub fn record(&mut self, offset_micros: f64) {
        self.firings += 1;
        self.min_offset_micros = self.min_offset_micros.min(offset_micros);
        self.max_offset_micros = self.max_offset_micros.max(offset_micros);
        self.sum_offset_micros += offset_micros;

        if offset_micros.abs() > self.alert_threshold_micros {
            self.alerts += 1;
        }
    }

    /// Get the mean offset.
    #[must_use]
    pub fn mean_offset_micros(&self) -> Option<f64> {
        if self.firings > 0 {
            Some(self.sum_offset_micros / self.firings as f64)
        } else {
            None
        }
    }

    /// Get the peak-to-peak jitter.
    #[must_use]
    pub fn jitter_micros(&self) -> Option<f64> {
        if self.firings > 0 {
            Some(self.max_offset_micros - self.min_offset_micros)
        } else {
            None
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        let threshold = self.alert_threshold_micros;
        *self = Self::new(threshold);
    }
}
