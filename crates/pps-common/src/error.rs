use thiserror::Error;

/// Discipline error types covering configuration, capture faults, and guard-band rejections.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DisciplineError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic runtime fault.
    #[error("runtime fault: {0}")]
    Fault(String),

    /// The one-shot calibration ratio was written a second time.
    #[error("calibration ratio already computed ({existing}); refusing to overwrite")]
    RatioAlreadyComputed {
        /// The ratio computed earlier in the session.
        existing: f64,
    },

    /// A gated frequency sample was zero or outside the plausibility band.
    #[error("implausible frequency sample: {count} pulses (expected {expected} ±{guard_ppm} PPM)")]
    ImplausibleSample {
        /// Raw gated pulse count.
        count: u32,
        /// Nominal pulse count for one gate interval.
        expected: u64,
        /// Configured plausibility band.
        guard_ppm: f64,
    },

    /// A computed generator period fell outside the guard band around nominal.
    #[error(
        "interval out of bounds: {proposed_micros:.2}us deviates {deviation_ppm:.1} PPM from \
         nominal {nominal_micros:.2}us (guard: {guard_ppm:.1} PPM)"
    )]
    IntervalOutOfBounds {
        /// The rejected period in microseconds.
        proposed_micros: f64,
        /// Configured nominal period in microseconds.
        nominal_micros: f64,
        /// Measured deviation from nominal.
        deviation_ppm: f64,
        /// Configured guard band.
        guard_ppm: f64,
    },

    /// Hardware timer or sampler operation failed.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for discipline operations.
pub type DisciplineResult<T> = Result<T, DisciplineError>;
