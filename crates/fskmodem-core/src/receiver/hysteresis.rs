//! Schmitt-trigger gate over signal strength

use crate::config::Thresholds;

/// Dual-threshold presence gate
///
/// Strength above `high` latches the state on, below `low` latches it off;
/// anything in between keeps the previous state.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    thresholds: Thresholds,
    state: bool,
}

impl HysteresisGate {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: false,
        }
    }

    /// Feed one strength reading and return the updated state
    pub fn update(&mut self, strength: u8) -> bool {
        if strength > self.thresholds.high {
            self.state = true;
        } else if strength < self.thresholds.low {
            self.state = false;
        }
        self.state
    }

    /// Update with `strength`, then report whether a bit at that strength
    /// passes both the presence state and the detection floor
    pub fn admit(&mut self, strength: u8) -> bool {
        let state = self.update(strength);
        state && strength > self.thresholds.min_detect
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn reset(&mut self) {
        self.state = false;
    }
}
