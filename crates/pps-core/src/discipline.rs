//! The calibration-and-syntonization control loop.
//!
//! One cooperative, non-blocking loop owns all computation. Interrupt
//! contexts only latch timestamps into the [`EdgeCapture`]; each call to
//! [`Discipline::poll`] performs one pass:
//!
//! 1. Check for a new generator firing: recompute and reprogram the
//!    period, then fold and report the drift offset.
//! 2. Check for a new gated frequency sample: refresh the rate estimate.
//! 3. Check for a new reference edge: drive the WARM_UP → CALIBRATE →
//!    TRACK state machine.
//!
//! New values are detected by comparison against the previously seen
//! value, never by queueing: at most one pending value per source,
//! newest wins. Two edges inside one pass lose the earlier one — an
//! accepted limitation at 1 Hz against a fast loop.

use crate::drift::{fold_offset, DriftReport};
use crate::generator::IntervalPlanner;
use crate::rate::RateEstimator;
use pps_common::{
    DisciplineConfig, DisciplineError, DisciplineResult, DisciplineState, DriftStats,
    StateMachine,
};
use pps_hal::{EdgeCapture, FrequencySampler, IntervalTimer};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Compute the one-shot calibration ratio.
///
/// `delta_cycles` is the cycle-clock distance between two consecutive
/// reference edges; dividing by the nominal cycles-per-microsecond gives
/// the reference period as the CPU clock saw it. The ratio of that to the
/// rate estimate cancels the CPU clock's absolute error out of every
/// later period computation.
#[must_use]
pub fn compute_calibration_ratio(
    delta_cycles: u64,
    cycles_per_microsecond: f64,
    rate_estimate_micros: f64,
) -> f64 {
    let reference_period_micros = delta_cycles as f64 / cycles_per_microsecond;
    reference_period_micros / rate_estimate_micros
}

/// What one control-loop pass observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassReport {
    /// A generator firing was observed; drift report for it.
    pub heartbeat: Option<DriftReport>,
    /// A warm-up reference edge was observed; raw pulse-count delta
    /// between it and the previous edge (diagnostic only).
    pub warmup_pulse_delta: Option<u32>,
    /// The calibration ratio was computed on this pass.
    pub calibrated: bool,
    /// A gated sample was accepted; the refreshed rate estimate.
    pub new_rate_micros: Option<f64>,
    /// A recomputed period failed the guard band; previous period held.
    pub interval_held: bool,
    /// A gated sample was rejected as implausible.
    pub sample_rejected: bool,
}

impl PassReport {
    /// True when the pass observed nothing new.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heartbeat.is_none()
            && self.warmup_pulse_delta.is_none()
            && !self.calibrated
            && self.new_rate_micros.is_none()
            && !self.interval_held
            && !self.sample_rejected
    }
}

/// The discipline engine: owns the state machine, the frozen ratio, and
/// the generator period.
pub struct Discipline<S: FrequencySampler, T: IntervalTimer> {
    config: DisciplineConfig,
    capture: Arc<EdgeCapture>,
    sampler: S,
    timer: T,
    state: StateMachine,
    planner: IntervalPlanner,
    rate: RateEstimator,
    /// Change detection against the capture latch.
    last_reference_cycles: u64,
    last_fire_cycles: u64,
    last_pulse_count: u32,
    /// Reference edges observed during warm-up.
    edges_seen: u32,
    /// Write-once for the session.
    calibration_ratio: Option<f64>,
    current_interval_micros: Option<f64>,
    firing_count: u64,
    held_reprograms: u64,
    stats: DriftStats,
}

impl<S: FrequencySampler, T: IntervalTimer> Discipline<S, T> {
    /// Create a discipline engine over the given capture latch and
    /// hardware capabilities.
    pub fn new(
        config: DisciplineConfig,
        capture: Arc<EdgeCapture>,
        sampler: S,
        timer: T,
    ) -> Self {
        let planner = IntervalPlanner::new(&config);
        let rate = RateEstimator::new(&config);
        let stats = DriftStats::new(config.telemetry.drift_alert_micros);
        Self {
            config,
            capture,
            sampler,
            timer,
            state: StateMachine::new(),
            planner,
            rate,
            last_reference_cycles: 0,
            last_fire_cycles: 0,
            last_pulse_count: 0,
            edges_seen: 0,
            calibration_ratio: None,
            current_interval_micros: None,
            firing_count: 0,
            held_reprograms: 0,
            stats,
        }
    }

    /// Run one control-loop pass. Never blocks.
    pub fn poll(&mut self) -> DisciplineResult<PassReport> {
        let mut report = PassReport::default();

        self.poll_heartbeat(&mut report)?;
        self.poll_sample(&mut report);
        self.poll_reference_edge(&mut report)?;

        Ok(report)
    }

    /// Step 1: new generator firing → reprogram period, report drift.
    fn poll_heartbeat(&mut self, report: &mut PassReport) -> DisciplineResult<()> {
        let fire_cycles = self.capture.interval_fire_cycles();
        if fire_cycles == self.last_fire_cycles {
            return Ok(());
        }
        self.last_fire_cycles = fire_cycles;
        self.firing_count += 1;

        // Rewrite the period before the next one begins. The rate estimate
        // may be stale (open-loop hold); the ratio is frozen.
        let rate = match (self.calibration_ratio, self.rate.current()) {
            (Some(ratio), Some(rate)) => {
                match self.planner.next(ratio, rate) {
                    Ok(period) => {
                        self.timer.update(period)?;
                        self.current_interval_micros = Some(period);
                    }
                    Err(e) => {
                        warn!(error = %e, "holding previous generator period");
                        self.held_reprograms += 1;
                        report.interval_held = true;
                    }
                }
                rate
            }
            // Firing without calibration cannot happen (the timer is
            // started by calibration), but keep the report well-formed.
            _ => 0.0,
        };

        let reference = self.capture.reference();
        let raw_micros = fire_cycles.wrapping_sub(reference.cycles) as f64
            / self.config.cycles_per_microsecond;
        let offset_micros = fold_offset(raw_micros, self.config.nominal_interval_micros);
        self.stats.record(offset_micros);

        let drift = DriftReport {
            firing: self.firing_count,
            offset_micros,
            interval_micros: self.current_interval_micros.unwrap_or(0.0),
            rate_estimate_micros: rate,
        };
        trace!(
            firing = drift.firing,
            offset_micros = drift.offset_micros,
            interval_micros = drift.interval_micros,
            "heartbeat observed"
        );
        report.heartbeat = Some(drift);
        Ok(())
    }

    /// Step 2: new gated sample → refresh the rate estimate.
    fn poll_sample(&mut self, report: &mut PassReport) {
        if let Some(count) = self.sampler.poll_sample() {
            match self.rate.ingest(count) {
                Ok(rate) => {
                    trace!(count, rate_micros = rate, "rate estimate refreshed");
                    report.new_rate_micros = Some(rate);
                }
                Err(e) => {
                    warn!(error = %e, "rejecting gated sample, holding previous estimate");
                    report.sample_rejected = true;
                }
            }
        }
    }

    /// Step 3: new reference edge → drive the calibration state machine.
    fn poll_reference_edge(&mut self, report: &mut PassReport) -> DisciplineResult<()> {
        let reference = self.capture.reference();
        if reference.cycles == self.last_reference_cycles {
            return Ok(());
        }
        let delta_cycles = reference.cycles.wrapping_sub(self.last_reference_cycles);

        match self.state.state() {
            DisciplineState::WarmUp => {
                self.edges_seen += 1;
                if self.edges_seen == 1 {
                    // Arm on the first edge so the first gate aligns with
                    // a reference period boundary.
                    self.sampler.arm()?;
                    info!("first reference edge; frequency sampler armed");
                } else {
                    let pulse_delta =
                        reference.pulse_count.wrapping_sub(self.last_pulse_count);
                    debug!(
                        edge = self.edges_seen,
                        pulse_delta, "warm-up reference edge"
                    );
                    report.warmup_pulse_delta = Some(pulse_delta);
                }
                if self.edges_seen >= self.config.warmup_edge_count {
                    self.state.transition(DisciplineState::Calibrate)?;
                    info!(
                        edges = self.edges_seen,
                        "warm-up complete; calibrating on next edge"
                    );
                }
            }
            DisciplineState::Calibrate => {
                self.calibrate(delta_cycles, report)?;
            }
            DisciplineState::Track => {
                // Edges in TRACK only refresh the snapshot the drift
                // reporter compares against.
            }
        }

        self.last_pulse_count = reference.pulse_count;
        self.last_reference_cycles = reference.cycles;
        Ok(())
    }

    /// One-shot calibration: ratio, initial period, generator start.
    fn calibrate(&mut self, delta_cycles: u64, report: &mut PassReport) -> DisciplineResult<()> {
        let Some(rate) = self.rate.current() else {
            warn!("no rate estimate yet; staying in CALIBRATE for the next edge");
            return Ok(());
        };

        let ratio = compute_calibration_ratio(
            delta_cycles,
            self.config.cycles_per_microsecond,
            rate,
        );

        match self.planner.initial(ratio, rate) {
            Ok(interval) => {
                self.set_calibration_ratio(ratio)?;
                self.timer.start(interval)?;
                self.current_interval_micros = Some(interval);
                self.state.transition(DisciplineState::Track)?;
                report.calibrated = true;
                info!(
                    ratio,
                    interval_micros = interval,
                    "calibration ratio computed; heartbeat generator started"
                );
            }
            Err(e) => {
                // Bad calibration must not arm the timer. The ratio stays
                // unwritten so the next edge retries with a fresh period.
                warn!(error = %e, "initial interval out of bounds; retrying on next edge");
            }
        }
        Ok(())
    }

    /// Record the ratio, enforcing write-once for the session.
    fn set_calibration_ratio(&mut self, ratio: f64) -> DisciplineResult<()> {
        if let Some(existing) = self.calibration_ratio {
            return Err(DisciplineError::RatioAlreadyComputed { existing });
        }
        self.calibration_ratio = Some(ratio);
        Ok(())
    }

    /// Current state of the calibration lifecycle.
    #[must_use]
    pub fn state(&self) -> DisciplineState {
        self.state.state()
    }

    /// The frozen calibration ratio, once computed.
    #[must_use]
    pub fn calibration_ratio(&self) -> Option<f64> {
        self.calibration_ratio
    }

    /// The period currently programmed into the generator.
    #[must_use]
    pub fn current_interval_micros(&self) -> Option<f64> {
        self.current_interval_micros
    }

    /// The latest accepted rate estimate.
    #[must_use]
    pub fn rate_estimate_micros(&self) -> Option<f64> {
        self.rate.current()
    }

    /// Reference edges observed during warm-up.
    #[must_use]
    pub fn edges_seen(&self) -> u32 {
        self.edges_seen
    }

    /// Generator firings observed.
    #[must_use]
    pub fn firing_count(&self) -> u64 {
        self.firing_count
    }

    /// Reprograms rejected by the guard band.
    #[must_use]
    pub fn held_reprograms(&self) -> u64 {
        self.held_reprograms
    }

    /// Gated samples rejected as implausible.
    #[must_use]
    pub fn rejected_samples(&self) -> u64 {
        self.rate.rejected()
    }

    /// Accumulated drift statistics.
    #[must_use]
    pub fn stats(&self) -> &DriftStats {
        &self.stats
    }
}
