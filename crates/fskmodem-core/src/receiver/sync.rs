//! Preamble matching over the admitted bit stream

use crate::protocol::framing::{Bit, PREAMBLE};
use std::collections::VecDeque;

/// Rolling window of the last [`PREAMBLE`]-length admitted bits
#[derive(Debug, Clone, Default)]
pub struct SyncDetector {
    window: VecDeque<Bit>,
}

impl SyncDetector {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(PREAMBLE.len()),
        }
    }

    /// Push a bit; true when the window now equals the preamble exactly
    pub fn push(&mut self, bit: Bit) -> bool {
        if self.window.len() == PREAMBLE.len() {
            self.window.pop_front();
        }
        self.window.push_back(bit);
        self.window.len() == PREAMBLE.len() && self.window.iter().eq(PREAMBLE.iter())
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut SyncDetector, pattern: &str) -> Vec<bool> {
        pattern
            .chars()
            .map(|c| detector.push(if c == '1' { Bit::One } else { Bit::Zero }))
            .collect()
    }

    #[test]
    fn test_exact_preamble_matches_once() {
        let mut detector = SyncDetector::new();
        let hits = feed(&mut detector, "10101010");
        assert_eq!(hits.iter().filter(|&&h| h).count(), 1);
        assert!(hits[7]);
    }

    #[test]
    fn test_match_after_noise() {
        let mut detector = SyncDetector::new();
        let hits = feed(&mut detector, "1110010101010");
        assert_eq!(hits.iter().position(|&h| h), Some(12));
    }

    #[test]
    fn test_single_bit_error_defeats_sync() {
        let mut detector = SyncDetector::new();
        let hits = feed(&mut detector, "10111010");
        assert!(hits.iter().all(|&h| !h));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut detector = SyncDetector::new();
        feed(&mut detector, "000000000000");
        assert_eq!(detector.len(), 8);
        detector.reset();
        assert!(detector.is_empty());
    }
}
