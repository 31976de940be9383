//! Telemetry for the syntonization daemon.
//!
//! Tracks per-firing drift observations, formats the CSV stream consumed
//! by offline analysis, and renders a text snapshot for log summaries.

use pps_common::{DisciplineState, DriftStats};
use pps_core::DriftReport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Header for the per-firing CSV stream.
pub const CSV_HEADER: &str = "firing,offset_micros,interval_micros,rate_micros";

/// Format one drift report as a CSV line (no trailing newline).
pub fn format_csv_line(report: &DriftReport) -> String {
    format!(
        "{},{:.3},{:.3},{:.3}",
        report.firing, report.offset_micros, report.interval_micros, report.rate_estimate_micros
    )
}

/// Shared telemetry state updated by the control loop.
#[derive(Debug)]
pub struct TelemetryState {
    /// Generator firings observed.
    firing_count: AtomicU64,
    /// Reprograms rejected by the guard band.
    held_reprograms: AtomicU64,
    /// Gated samples rejected as implausible.
    rejected_samples: AtomicU64,
    /// Last observed drift offset, stored as f64 bits.
    last_offset_bits: AtomicU64,
    /// Daemon start time.
    start_time: Instant,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryState {
    /// Create new telemetry state.
    pub fn new() -> Self {
        Self {
            firing_count: AtomicU64::new(0),
            held_reprograms: AtomicU64::new(0),
            rejected_samples: AtomicU64::new(0),
            last_offset_bits: AtomicU64::new(0f64.to_bits()),
            start_time: Instant::now(),
        }
    }

    /// Record a generator firing and its folded drift offset.
    pub fn record_firing(&self, offset_micros: f64) {
        self.firing_count.fetch_add(1, Ordering::Relaxed);
        self.last_offset_bits
            .store(offset_micros.to_bits(), Ordering::Relaxed);
    }

    /// Record a guard-band hold of the generator period.
    pub fn record_held_reprogram(&self) {
        self.held_reprograms.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected gated sample.
    pub fn record_rejected_sample(&self) {
        self.rejected_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Total generator firings.
    pub fn firing_count(&self) -> u64 {
        self.firing_count.load(Ordering::Relaxed)
    }

    /// Total guard-band holds.
    pub fn held_reprograms(&self) -> u64 {
        self.held_reprograms.load(Ordering::Relaxed)
    }

    /// Total rejected samples.
    pub fn rejected_samples(&self) -> u64 {
        self.rejected_samples.load(Ordering::Relaxed)
    }

    /// Last observed drift offset in microseconds.
    pub fn last_offset_micros(&self) -> f64 {
        f64::from_bits(self.last_offset_bits.load(Ordering::Relaxed))
    }

    /// Uptime since daemon start.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Snapshot of telemetry at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TelemetrySnapshot {
    /// Discipline lifecycle state.
    pub state: String,
    /// Frozen calibration ratio, once computed.
    pub calibration_ratio: Option<f64>,
    /// Generator period currently programmed.
    pub interval_micros: Option<f64>,
    /// Latest accepted rate estimate.
    pub rate_micros: Option<f64>,
    /// Total generator firings.
    pub firing_count: u64,
    /// Reprograms rejected by the guard band.
    pub held_reprograms: u64,
    /// Gated samples rejected as implausible.
    pub rejected_samples: u64,
    /// Last observed drift offset.
    pub last_offset_micros: f64,
    /// Mean drift offset since start.
    pub mean_offset_micros: Option<f64>,
    /// Peak-to-peak drift spread since start.
    pub jitter_micros: Option<f64>,
    /// Offsets beyond the alert threshold.
    pub drift_alerts: u64,
    /// Uptime in seconds.
    pub uptime_secs: f64,
}

/// Telemetry collector that aggregates runtime information.
pub struct TelemetryCollector {
    state: Arc<TelemetryState>,
}

impl TelemetryCollector {
    /// Create a new telemetry collector.
    pub fn new(state: Arc<TelemetryState>) -> Self {
        Self { state }
    }

    /// Create a snapshot of current telemetry.
    pub fn snapshot(
        &self,
        discipline_state: DisciplineState,
        calibration_ratio: Option<f64>,
        interval_micros: Option<f64>,
        rate_micros: Option<f64>,
        stats: &DriftStats,
    ) -> TelemetrySnapshot {
        TelemetrySnapshot {
            state: discipline_state.to_string(),
            calibration_ratio,
            interval_micros,
            rate_micros,
            firing_count: self.state.firing_count(),
            held_reprograms: self.state.held_reprograms(),
            rejected_samples: self.state.rejected_samples(),
            last_offset_micros: self.state.last_offset_micros(),
            mean_offset_micros: stats.mean_offset_micros(),
            jitter_micros: stats.jitter_micros(),
            drift_alerts: stats.alerts,
            uptime_secs: self.state.uptime().as_secs_f64(),
        }
    }

    /// The underlying state for updates.
    pub fn state(&self) -> &Arc<TelemetryState> {
        &self.state
    }
}

/// Format a snapshot in Prometheus text exposition format.
pub fn format_text_metrics(snapshot: &TelemetrySnapshot) -> String {
    let mut output = String::new();

    output.push_str("# HELP pps_firings_total Total heartbeat generator firings\n");
    output.push_str("# TYPE pps_firings_total counter\n");
    output.push_str(&format!("pps_firings_total {}\n", snapshot.firing_count));

    output.push_str("# HELP pps_held_reprograms_total Period reprograms rejected by the guard band\n");
    output.push_str("# TYPE pps_held_reprograms_total counter\n");
    output.push_str(&format!(
        "pps_held_reprograms_total {}\n",
        snapshot.held_reprograms
    ));

    output.push_str("# HELP pps_rejected_samples_total Gated samples rejected as implausible\n");
    output.push_str("# TYPE pps_rejected_samples_total counter\n");
    output.push_str(&format!(
        "pps_rejected_samples_total {}\n",
        snapshot.rejected_samples
    ));

    output.push_str("# HELP pps_drift_alerts_total Drift offsets beyond the alert threshold\n");
    output.push_str("# TYPE pps_drift_alerts_total counter\n");
    output.push_str(&format!("pps_drift_alerts_total {}\n", snapshot.drift_alerts));

    output.push_str("# HELP pps_offset_micros Last observed drift offset\n");
    output.push_str("# TYPE pps_offset_micros gauge\n");
    output.push_str(&format!(
        "pps_offset_micros {:.3}\n",
        snapshot.last_offset_micros
    ));

    if let Some(ratio) = snapshot.calibration_ratio {
        output.push_str("# HELP pps_calibration_ratio Frozen calibration ratio\n");
        output.push_str("# TYPE pps_calibration_ratio gauge\n");
        output.push_str(&format!("pps_calibration_ratio {ratio:.9}\n"));
    }

    if let Some(interval) = snapshot.interval_micros {
        output.push_str("# HELP pps_interval_micros Programmed generator period\n");
        output.push_str("# TYPE pps_interval_micros gauge\n");
        output.push_str(&format!("pps_interval_micros {interval:.3}\n"));
    }

    output.push_str("# HELP pps_uptime_seconds Daemon uptime in seconds\n");
    output.push_str("# TYPE pps_uptime_seconds gauge\n");
    output.push_str(&format!("pps_uptime_seconds {:.3}\n", snapshot.uptime_secs));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_state_new() {
        let state = TelemetryState::new();
        assert_eq!(state.firing_count(), 0);
        assert_eq!(state.held_reprograms(), 0);
        assert_eq!(state.rejected_samples(), 0);
        assert_eq!(state.last_offset_micros(), 0.0);
    }

    #[test]
    fn test_record_firing() {
        let state = TelemetryState::new();
        state.record_firing(12.5);
        assert_eq!(state.firing_count(), 1);
        assert_eq!(state.last_offset_micros(), 12.5);

        state.record_firing(-3.25);
        assert_eq!(state.firing_count(), 2);
        assert_eq!(state.last_offset_micros(), -3.25);
    }

    #[test]
    fn test_csv_line_format() {
        let report = DriftReport {
            firing: 42,
            offset_micros: -12.345,
            interval_micros: 1_000_000.5,
            rate_estimate_micros: 999_999.875,
        };
        assert_eq!(
            format_csv_line(&report),
            "42,-12.345,1000000.500,999999.875"
        );
    }

    #[test]
    fn test_text_metrics_format() {
        let state = Arc::new(TelemetryState::new());
        state.record_firing(5.0);
        state.record_held_reprogram();
        let collector = TelemetryCollector::new(Arc::clone(&state));

        let mut stats = DriftStats::new(100.0);
        stats.record(5.0);

        let snapshot = collector.snapshot(
            DisciplineState::Track,
            Some(1.000001),
            Some(1_000_000.0),
            Some(999_998.0),
            &stats,
        );
        let output = format_text_metrics(&snapshot);

        assert!(output.contains("pps_firings_total 1"));
        assert!(output.contains("pps_held_reprograms_total 1"));
        assert!(output.contains("pps_calibration_ratio 1.000001"));
        assert!(output.contains("pps_offset_micros 5.000"));
    }
}
