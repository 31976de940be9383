//! Calibration state machine for the discipline lifecycle.
//!
//! State progression is strictly forward:
//! WARM_UP → CALIBRATE → TRACK
//!
//! TRACK is terminal for calibration purposes; there is no re-calibration
//! path within a session.

use crate::error::{DisciplineError, DisciplineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the calibration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisciplineState {
    /// Observing reference edges; the first edge arms the frequency sampler.
    #[default]
    WarmUp,
    /// Warm-up complete; the next reference edge computes the calibration ratio.
    Calibrate,
    /// Ratio frozen; the generator free-runs off the secondary oscillator.
    Track,
}

impl fmt::Display for DisciplineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WarmUp => write!(f, "WARM_UP"),
            Self::Calibrate => write!(f, "CALIBRATE"),
            Self::Track => write!(f, "TRACK"),
        }
    }
}

impl DisciplineState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: DisciplineState) -> bool {
        use DisciplineState::{Calibrate, Track, WarmUp};

        matches!((self, target), (WarmUp, Calibrate) | (Calibrate, Track))
    }

    /// Returns true once the generator is (or may be) running.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Track)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: DisciplineState,
    previous: Option<DisciplineState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in WARM_UP.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: DisciplineState::WarmUp,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> DisciplineState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<DisciplineState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: DisciplineState) -> DisciplineResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(DisciplineError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
