//! Deterministic simulated bench.
//!
//! Models the hardware the discipline runs against:
//! - a CPU cycle clock with a configurable frequency error (PPM)
//! - a secondary oscillator with a configurable drift (PPM)
//! - a one-pulse-per-second reference signal on true time
//! - a gated pulse counter timed by the CPU clock
//! - a repeating interval timer programmed in CPU microseconds
//!
//! Time only advances through [`SimulatedBench::step`], which jumps to the
//! next scheduled hardware event and latches it into the [`EdgeCapture`],
//! exactly as the corresponding interrupt handler would. The control loop
//! is polled between steps, so event delivery is deterministic and
//! repeatable in tests.

use crate::capture::EdgeCapture;
use crate::{CycleClock, FrequencySampler, IntervalTimer, PulseCounter};
use pps_common::{DisciplineConfig, DisciplineError, DisciplineResult};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Physical parameters of the simulated bench.
#[derive(Debug, Clone, Copy)]
pub struct BenchParams {
    /// Nominal cycle-clock rate in cycles per microsecond.
    pub cycles_per_microsecond: f64,
    /// Nominal secondary-oscillator rate in Hz.
    pub nominal_secondary_hz: f64,
    /// True reference period in microseconds (1 s for a PPS source).
    pub reference_period_micros: f64,
    /// Secondary-oscillator frequency error in PPM of nominal.
    pub secondary_drift_ppm: f64,
    /// CPU cycle-clock frequency error in PPM of nominal.
    pub cpu_clock_error_ppm: f64,
}

impl BenchParams {
    /// Derive bench parameters from a runtime configuration.
    #[must_use]
    pub fn from_config(config: &DisciplineConfig) -> Self {
        Self {
            cycles_per_microsecond: config.cycles_per_microsecond,
            nominal_secondary_hz: config.nominal_secondary_hz,
            reference_period_micros: config.nominal_interval_micros,
            secondary_drift_ppm: config.simulation.secondary_drift_ppm,
            cpu_clock_error_ppm: config.simulation.cpu_clock_error_ppm,
        }
    }

    /// An ideal bench: perfect oscillators, 1 s reference period.
    #[must_use]
    pub fn ideal(cycles_per_microsecond: f64, nominal_secondary_hz: f64) -> Self {
        Self {
            cycles_per_microsecond,
            nominal_secondary_hz,
            reference_period_micros: 1_000_000.0,
            secondary_drift_ppm: 0.0,
            cpu_clock_error_ppm: 0.0,
        }
    }

    /// CPU microseconds elapsed per true microsecond.
    fn cpu_factor(&self) -> f64 {
        1.0 + self.cpu_clock_error_ppm / 1e6
    }

    /// Actual secondary-oscillator rate in Hz.
    fn actual_secondary_hz(&self) -> f64 {
        self.nominal_secondary_hz * (1.0 + self.secondary_drift_ppm / 1e6)
    }
}

/// One hardware event produced by [`SimulatedBench::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchEvent {
    /// A reference edge fired (sequence number since start).
    ReferenceEdge(u64),
    /// A gated one-second sample completed (raw pulse count).
    SampleReady(u32),
    /// The interval generator fired (sequence number since start).
    Heartbeat(u64),
}

#[derive(Debug)]
struct BenchInner {
    params: BenchParams,
    /// True elapsed time in microseconds.
    now_micros: f64,
    next_reference_micros: f64,
    reference_edges: u64,
    /// Gate state for the frequency sampler.
    armed: bool,
    gate_start_micros: f64,
    next_sample_micros: Option<f64>,
    pending_sample: Option<u32>,
    /// Interval timer state. Period is in CPU microseconds.
    period_micros: Option<f64>,
    last_fire_micros: Option<f64>,
    fires: u64,
}

impl BenchInner {
    fn new(params: BenchParams) -> Self {
        Self {
            params,
            now_micros: 0.0,
            next_reference_micros: params.reference_period_micros,
            reference_edges: 0,
            armed: false,
            gate_start_micros: 0.0,
            next_sample_micros: None,
            pending_sample: None,
            period_micros: None,
            last_fire_micros: None,
            fires: 0,
        }
    }

    /// Cycle-counter reading at a true time.
    fn cycles_at(&self, true_micros: f64) -> u64 {
        (true_micros * self.params.cycles_per_microsecond * self.params.cpu_factor()).round()
            as u64
    }

    /// Pulse-counter reading at a true time (32-bit hardware wrap).
    fn pulses_at(&self, true_micros: f64) -> u32 {
        let pulses = (true_micros / 1e6 * self.params.actual_secondary_hz()).floor() as u64;
        pulses as u32
    }

    /// True duration of one nominal-one-second gate.
    fn gate_true_micros(&self) -> f64 {
        1e6 / self.params.cpu_factor()
    }

    /// True time of the next generator firing, if the timer is running.
    fn next_fire_micros(&self) -> Option<f64> {
        match (self.last_fire_micros, self.period_micros) {
            (Some(last), Some(period)) => Some(last + period / self.params.cpu_factor()),
            _ => None,
        }
    }
}

/// Shareable handle to the simulated bench.
///
/// Clones share one bench; the control loop owns clones as its sampler and
/// timer while the test harness drives [`step`](Self::step) on another.
#[derive(Debug, Clone)]
pub struct SimulatedBench {
    inner: Arc<Mutex<BenchInner>>,
    capture: Arc<EdgeCapture>,
}

impl SimulatedBench {
    /// Create a bench with the given physical parameters.
    #[must_use]
    pub fn new(params: BenchParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BenchInner::new(params))),
            capture: Arc::new(EdgeCapture::new()),
        }
    }

    /// The capture latch both simulated "interrupt handlers" write into.
    #[must_use]
    pub fn capture(&self) -> Arc<EdgeCapture> {
        Arc::clone(&self.capture)
    }

    /// Current true time in microseconds.
    #[must_use]
    pub fn now_micros(&self) -> f64 {
        self.lock().now_micros
    }

    /// Number of generator firings so far.
    #[must_use]
    pub fn fires(&self) -> u64 {
        self.lock().fires
    }

    /// Advance to the next scheduled hardware event and apply it.
    ///
    /// Something is always scheduled (the reference keeps pulsing), so this
    /// always makes progress. Simultaneous events resolve in the order
    /// reference edge, sample, heartbeat, one per step.
    pub fn step(&self) -> BenchEvent {
        let mut inner = self.lock();

        let next_ref = inner.next_reference_micros;
        let next_sample = inner.next_sample_micros;
        let next_fire = inner.next_fire_micros();

        let mut at = next_ref;
        if let Some(t) = next_sample {
            at = at.min(t);
        }
        if let Some(t) = next_fire {
            at = at.min(t);
        }
        inner.now_micros = at;

        // Reference edge wins ties, then sample, then heartbeat
        if at == next_ref {
            inner.reference_edges += 1;
            let cycles = inner.cycles_at(at);
            let pulses = inner.pulses_at(at);
            self.capture.record_reference_edge(cycles, pulses);
            inner.next_reference_micros += inner.params.reference_period_micros;
            trace!(edge = inner.reference_edges, cycles, pulses, "reference edge");
            return BenchEvent::ReferenceEdge(inner.reference_edges);
        }

        if Some(at) == next_sample {
            let gate_secs = (at - inner.gate_start_micros) / 1e6;
            let count = (inner.params.actual_secondary_hz() * gate_secs).round() as u32;
            inner.pending_sample = Some(count);
            inner.gate_start_micros = at;
            inner.next_sample_micros = Some(at + inner.gate_true_micros());
            trace!(count, "gated sample ready");
            return BenchEvent::SampleReady(count);
        }

        // Generator firing
        inner.fires += 1;
        let cycles = inner.cycles_at(at);
        self.capture.record_interval_fire(cycles);
        inner.last_fire_micros = Some(at);
        trace!(fire = inner.fires, cycles, "heartbeat fired");
        BenchEvent::Heartbeat(inner.fires)
    }

    fn lock(&self) -> MutexGuard<'_, BenchInner> {
        // Poison-tolerant: the bench state stays usable even if a test
        // thread panicked while holding the lock.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CycleClock for SimulatedBench {
    fn now_cycles(&self) -> u64 {
        let inner = self.lock();
        inner.cycles_at(inner.now_micros)
    }
}

impl PulseCounter for SimulatedBench {
    fn count(&self) -> u32 {
        let inner = self.lock();
        inner.pulses_at(inner.now_micros)
    }
}

impl FrequencySampler for SimulatedBench {
    fn arm(&mut self) -> DisciplineResult<()> {
        let mut inner = self.lock();
        if inner.armed {
            return Err(DisciplineError::Hardware(
                "frequency sampler already armed".into(),
            ));
        }
        inner.armed = true;
        inner.gate_start_micros = inner.now_micros;
        inner.next_sample_micros = Some(inner.now_micros + inner.gate_true_micros());
        debug!(at_micros = inner.now_micros, "frequency sampler armed");
        Ok(())
    }

    fn is_armed(&self) -> bool {
        self.lock().armed
    }

    fn poll_sample(&mut self) -> Option<u32> {
        self.lock().pending_sample.take()
    }
}

impl IntervalTimer for SimulatedBench {
    fn start(&mut self, period_micros: f64) -> DisciplineResult<()> {
        let mut inner = self.lock();
        if inner.period_micros.is_some() {
            return Err(DisciplineError::Hardware(
                "interval timer already started".into(),
            ));
        }
        inner.period_micros = Some(period_micros);
        inner.last_fire_micros = Some(inner.now_micros);
        debug!(period_micros, at_micros = inner.now_micros, "interval timer started");
        Ok(())
    }

    fn update(&mut self, period_micros: f64) -> DisciplineResult<()> {
        let mut inner = self.lock();
        if inner.period_micros.is_none() {
            return Err(DisciplineError::Hardware(
                "interval timer update before start".into(),
            ));
        }
        inner.period_micros = Some(period_micros);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lock().period_micros.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ideal_bench() -> SimulatedBench {
        SimulatedBench::new(BenchParams::ideal(600.0, 10_000_000.0))
    }

    #[test]
    fn test_reference_edges_cadence() {
        let bench = ideal_bench();
        let capture = bench.capture();

        assert_eq!(bench.step(), BenchEvent::ReferenceEdge(1));
        let first = capture.reference();
        assert_eq!(first.cycles, 600_000_000);
        assert_eq!(first.pulse_count, 10_000_000);

        assert_eq!(bench.step(), BenchEvent::ReferenceEdge(2));
        let second = capture.reference();
        assert_eq!(second.cycles, 1_200_000_000);
        assert_eq!(second.pulse_count, 20_000_000);
    }

    #[test]
    fn test_gated_sample_ideal() {
        let mut bench = ideal_bench();

        bench.step(); // first edge at t = 1 s
        bench.arm().unwrap();
        assert!(bench.is_armed());
        assert!(bench.poll_sample().is_none());

        // Next event is the gate completion (at 2 s, tied with edge 2:
        // the edge wins the tie, then the sample).
        let mut sample = None;
        for _ in 0..2 {
            if let BenchEvent::SampleReady(count) = bench.step() {
                sample = Some(count);
            }
        }
        assert_eq!(sample, Some(10_000_000));
        assert_eq!(bench.poll_sample(), Some(10_000_000));
        // Consumed at most once
        assert_eq!(bench.poll_sample(), None);
    }

    #[test]
    fn test_sample_tracks_cpu_clock_error() {
        // CPU runs +100 PPM fast: its "one second" gate is short in true
        // time, so the gate counts fewer secondary pulses.
        let mut bench = SimulatedBench::new(BenchParams {
            cpu_clock_error_ppm: 100.0,
            ..BenchParams::ideal(600.0, 10_000_000.0)
        });

        bench.step();
        bench.arm().unwrap();
        let count = loop {
            if let BenchEvent::SampleReady(count) = bench.step() {
                break count;
            }
        };

        let expected = (10_000_000.0_f64 / (1.0 + 100.0 / 1e6)).round() as u32;
        assert_eq!(count, expected);
        assert!(count < 10_000_000);
    }

    #[test]
    fn test_timer_fires_at_programmed_period() {
        let mut bench = ideal_bench();
        let capture = bench.capture();

        bench.step(); // t = 1 s
        bench.start(500_000.0).unwrap();
        assert!(bench.is_running());

        // Next fire at 1.5 s, before the 2 s reference edge.
        assert_eq!(bench.step(), BenchEvent::Heartbeat(1));
        assert_eq!(capture.interval_fire_cycles(), 900_000_000);

        bench.update(250_000.0).unwrap();
        assert_eq!(bench.step(), BenchEvent::Heartbeat(2));
        assert_eq!(capture.interval_fire_cycles(), 1_050_000_000);
    }

    #[test]
    fn test_live_counter_reads() {
        let bench = ideal_bench();
        assert_eq!(bench.now_cycles(), 0);
        assert_eq!(bench.count(), 0);

        bench.step(); // t = 1 s
        assert_eq!(bench.now_cycles(), 600_000_000);
        assert_eq!(bench.count(), 10_000_000);
    }

    #[test]
    fn test_double_start_rejected() {
        let mut bench = ideal_bench();
        bench.start(1_000_000.0).unwrap();
        assert!(bench.start(1_000_000.0).is_err());
    }

    #[test]
    fn test_update_before_start_rejected() {
        let mut bench = ideal_bench();
        assert!(bench.update(1_000_000.0).is_err());
    }
}
