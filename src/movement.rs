use serde::{Deserialize, Serialize};

use crate::config::NavConfig;

/// Coarse speed classification. Parameterizes every downstream filter
/// through `NavConfig::profile`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementState {
    #[default]
    Stationary,
    Walking,
    Running,
}

impl MovementState {
    fn from_speed(speed_mps: f64, config: &NavConfig) -> Self {
        if speed_mps < config.stationary_speed_mps {
            MovementState::Stationary
        } else if speed_mps < config.walking_speed_mps {
            MovementState::Walking
        } else {
            MovementState::Running
        }
    }
}

/// Threshold classifier with a one-sample debounce: a new raw state must
/// hold for two consecutive speed updates before the public state
/// switches, so speeds hovering at a boundary do not flap.
#[derive(Debug, Default)]
pub struct MovementClassifier {
    state: MovementState,
    pending: Option<MovementState>,
}

impl MovementClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    /// Returns `Some((from, to))` when the debounced state changes.
    pub fn update(
        &mut self,
        speed_mps: f64,
        config: &NavConfig,
    ) -> Option<(MovementState, MovementState)> {
        let raw = MovementState::from_speed(speed_mps, config);
        if raw == self.state {
            self.pending = None;
            return None;
        }
        if self.pending == Some(raw) {
            let from = self.state;
            self.state = raw;
            self.pending = None;
            return Some((from, raw));
        }
        self.pending = Some(raw);
        None
    }

    pub fn reset(&mut self) {
        self.state = MovementState::default();
        self.pending = None;
    }
}
