//! Interrupt-safe capture latch for edge timestamps.
//!
//! Two interrupt sources write here, the control loop reads:
//!
//! - The reference-edge handler publishes a combined cycle-counter and
//!   pulse-counter snapshot. That pair is wider than one atomic word and
//!   must never be observed torn, so it sits behind a seqlock-protected
//!   double buffer (the hosted equivalent of masking the interrupt for
//!   the duration of the read).
//! - The generator-firing handler publishes a single cycle-counter value,
//!   which fits in one `AtomicU64`.
//!
//! Writers never block and never wait on the reader; the reader retries
//! until it observes a quiescent sequence number. Both values are
//! newest-wins: a second edge before the control loop's next pass
//! silently replaces the first.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot taken by the reference-edge handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefEdgeSnapshot {
    /// Cycle-clock value at the reference edge.
    pub cycles: u64,
    /// Secondary-oscillator pulse counter at the reference edge.
    /// Hardware counters are 32-bit; deltas use wrapping arithmetic.
    pub pulse_count: u32,
}

/// A seqlock-protected double buffer for one small Copy value.
///
/// The edge handler writes to the back buffer, then commits to swap it.
/// The control loop reads from the front buffer with seqlock protection.
struct SeqlockCell {
    /// Sequence number (odd = write in progress).
    sequence: CachePadded<AtomicU64>,
    /// Buffer 0.
    buf0: CachePadded<UnsafeCell<RefEdgeSnapshot>>,
    /// Buffer 1.
    buf1: CachePadded<UnsafeCell<RefEdgeSnapshot>>,
    /// Which buffer is currently the "published" front (0 or 1).
    front_idx: CachePadded<AtomicU64>,
}

impl SeqlockCell {
    fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            buf0: CachePadded::new(UnsafeCell::new(RefEdgeSnapshot::default())),
            buf1: CachePadded::new(UnsafeCell::new(RefEdgeSnapshot::default())),
            front_idx: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Read the published value with seqlock protection.
    /// Spins if a write is in progress, ensuring an untorn snapshot.
    fn read(&self) -> RefEdgeSnapshot {
        loop {
            let seq1 = self.sequence.load(Ordering::Acquire);

            if seq1 & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }

            let front = self.front_idx.load(Ordering::Acquire);
            // SAFETY: We check the sequence before and after the read.
            // The writer only touches the back buffer, never the front.
            let value = if front == 0 {
                unsafe { *self.buf0.get() }
            } else {
                unsafe { *self.buf1.get() }
            };

            let seq2 = self.sequence.load(Ordering::Acquire);
            if seq1 == seq2 {
                return value;
            }

            std::hint::spin_loop();
        }
    }

    /// Publish a new value. Single writer assumed (one interrupt source).
    fn write(&self, value: RefEdgeSnapshot) {
        // Odd sequence marks the write window
        self.sequence.fetch_add(1, Ordering::Release);

        let front = self.front_idx.load(Ordering::Acquire);
        // SAFETY: Single writer, and readers never dereference the back buffer.
        if front == 0 {
            unsafe { *self.buf1.get() = value };
        } else {
            unsafe { *self.buf0.get() = value };
        }

        self.front_idx.store(1 - front, Ordering::Release);
        self.sequence.fetch_add(1, Ordering::Release);
    }
}

/// Capture latch shared between the interrupt contexts and the control loop.
pub struct EdgeCapture {
    /// Combined reference-edge snapshot (seqlock protected).
    reference: SeqlockCell,
    /// Cycle-clock value at the last generator firing.
    interval_fire_cycles: AtomicU64,
}

impl std::fmt::Debug for EdgeCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeCapture")
            .field(
                "reference_seq",
                &self.reference.sequence.load(Ordering::Relaxed),
            )
            .field(
                "interval_fire_cycles",
                &self.interval_fire_cycles.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl Default for EdgeCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeCapture {
    /// Create an empty capture latch. Both values start at zero, which the
    /// control loop treats as "no edge seen yet".
    #[must_use]
    pub fn new() -> Self {
        Self {
            reference: SeqlockCell::new(),
            interval_fire_cycles: AtomicU64::new(0),
        }
    }

    /// Record a reference edge.
    ///
    /// **Called by: reference-edge interrupt context.**
    /// No computation, no blocking, no allocation.
    #[inline]
    pub fn record_reference_edge(&self, cycles: u64, pulse_count: u32) {
        self.reference.write(RefEdgeSnapshot {
            cycles,
            pulse_count,
        });
    }

    /// Record a generator firing.
    ///
    /// **Called by: generator interrupt context.**
    #[inline]
    pub fn record_interval_fire(&self, cycles: u64) {
        self.interval_fire_cycles.store(cycles, Ordering::Release);
    }

    /// Get an untorn snapshot of the last reference edge.
    ///
    /// **Called by: control loop.**
    #[inline]
    #[must_use]
    pub fn reference(&self) -> RefEdgeSnapshot {
        self.reference.read()
    }

    /// Get the cycle-clock value of the last generator firing.
    ///
    /// **Called by: control loop.**
    #[inline]
    #[must_use]
    pub fn interval_fire_cycles(&self) -> u64 {
        self.interval_fire_cycles.load(Ordering::Acquire)
    }
}

// SAFETY: EdgeCapture is safe to share between threads. The seqlock protocol
// guarantees readers only return values observed under a stable sequence
// number, and each value has a single designated writer (one interrupt
// source), which is enforced by the deployment model.
unsafe impl Send for EdgeCapture {}
unsafe impl Sync for EdgeCapture {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_capture() {
        let capture = EdgeCapture::new();
        assert_eq!(capture.reference(), RefEdgeSnapshot::default());
        assert_eq!(capture.interval_fire_cycles(), 0);
    }

    #[test]
    fn test_reference_snapshot_roundtrip() {
        let capture = EdgeCapture::new();

        capture.record_reference_edge(600_000_000, 10_000_000);
        let snap = capture.reference();
        assert_eq!(snap.cycles, 600_000_000);
        assert_eq!(snap.pulse_count, 10_000_000);

        // Newest wins
        capture.record_reference_edge(1_200_000_000, 20_000_000);
        let snap = capture.reference();
        assert_eq!(snap.cycles, 1_200_000_000);
        assert_eq!(snap.pulse_count, 20_000_000);
    }

    #[test]
    fn test_interval_fire_roundtrip() {
        let capture = EdgeCapture::new();
        capture.record_interval_fire(42);
        assert_eq!(capture.interval_fire_cycles(), 42);
    }

    #[test]
    fn test_concurrent_untorn_reads() {
        use std::sync::Arc;
        use std::thread;

        let capture = Arc::new(EdgeCapture::new());
        let writer_capture = Arc::clone(&capture);
        let reader_capture = Arc::clone(&capture);

        // Writer publishes pairs where pulse_count == cycles / 60,
        // so a torn read is detectable.
        let writer = thread::spawn(move || {
            for i in 1..=10_000u64 {
                writer_capture.record_reference_edge(i * 60, i as u32);
            }
        });

        let reader = thread::spawn(move || {
            for _ in 0..10_000 {
                let snap = reader_capture.reference();
                assert_eq!(
                    snap.cycles,
                    u64::from(snap.pulse_count) * 60,
                    "torn snapshot observed"
                );
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
