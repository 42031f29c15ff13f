//! Time-series telemetry for the receiver
//!
//! Holds a bounded strength history for plotting, the most recent decoded
//! messages and running counters. Only the receive tick mutates it; readers
//! take cloned snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Strength points kept (one minute at the default 40 ms tick)
const MAX_HISTORY_SIZE: usize = 1500;

/// Decoded messages kept
const MAX_MESSAGES: usize = 100;

/// A single measurement point
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    /// Timestamp of the measurement
    pub timestamp: DateTime<Utc>,
    /// Value of the measurement
    pub value: f64,
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Payload was not valid UTF-8
    pub lossy: bool,
}

/// Running counters
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunningStats {
    /// Analysis ticks processed
    pub ticks: u64,
    /// Ticks where neither carrier cleared the detection floor
    pub weak_samples: u64,
    /// Bits admitted by the hysteresis gate
    pub bits_admitted: u64,
    /// Preamble matches
    pub syncs: u64,
    /// Frames decoded
    pub frames_decoded: u64,
    /// Frames whose payload needed lossy UTF-8 decoding
    pub lossy_frames: u64,
    /// Frames dropped by the receive timeout
    pub frames_abandoned: u64,
    /// Strength of the latest tick (percent)
    pub current_strength: f32,
    /// Highest strength seen (percent)
    pub peak_strength: f32,
    /// Mean strength over the retained history (percent)
    pub avg_strength: f32,
    /// Last calibrated noise floor (0..=255 scale)
    pub noise_floor: Option<f32>,
    /// Text of the last decoded frame
    pub last_text: Option<String>,
    /// When the last frame was decoded
    pub last_decoded_at: Option<DateTime<Utc>>,
}

/// Statistics store for the receiver
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    strength_history: VecDeque<Measurement>,
    messages: VecDeque<DecodedMessage>,
    max_size: usize,
    stats: RunningStats,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    /// Store keeping at most `max_size` strength points
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            strength_history: VecDeque::with_capacity(max_size),
            messages: VecDeque::new(),
            max_size: max_size.max(1),
            stats: RunningStats::default(),
        }
    }

    /// Record one tick's strength (percent)
    pub fn record_strength(&mut self, percent: f32, timestamp: DateTime<Utc>) {
        if self.strength_history.len() >= self.max_size {
            self.strength_history.pop_front();
        }
        self.strength_history.push_back(Measurement {
            timestamp,
            value: percent as f64,
        });

        self.stats.ticks += 1;
        self.stats.current_strength = percent;
        self.stats.peak_strength = self.stats.peak_strength.max(percent);

        let sum: f64 = self.strength_history.iter().map(|m| m.value).sum();
        self.stats.avg_strength = (sum / self.strength_history.len() as f64) as f32;
    }

    pub fn record_weak(&mut self) {
        self.stats.weak_samples += 1;
    }

    pub fn record_bit(&mut self) {
        self.stats.bits_admitted += 1;
    }

    pub fn record_sync(&mut self) {
        self.stats.syncs += 1;
    }

    pub fn record_frame(&mut self, text: &str, lossy: bool, timestamp: DateTime<Utc>) {
        if self.messages.len() >= MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(DecodedMessage {
            timestamp,
            text: text.to_string(),
            lossy,
        });

        self.stats.frames_decoded += 1;
        if lossy {
            self.stats.lossy_frames += 1;
        }
        self.stats.last_text = Some(text.to_string());
        self.stats.last_decoded_at = Some(timestamp);
    }

    pub fn record_abandoned(&mut self) {
        self.stats.frames_abandoned += 1;
    }

    pub fn set_noise_floor(&mut self, floor: f32) {
        self.stats.noise_floor = Some(floor);
    }

    pub fn strength_history(&self) -> &VecDeque<Measurement> {
        &self.strength_history
    }

    pub fn messages(&self) -> &VecDeque<DecodedMessage> {
        &self.messages
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Strength values for plotting (last N points)
    ///
    /// # Returns
    /// Vector of (time_offset_seconds, strength_percent) pairs, newest first
    pub fn strength_plot_data(&self, count: usize) -> Vec<(f64, f64)> {
        let now = Utc::now();
        self.strength_history
            .iter()
            .rev()
            .take(count)
            .map(|m| {
                let time_offset = (now - m.timestamp).num_milliseconds() as f64 / 1000.0;
                (-time_offset, m.value)
            })
            .collect()
    }

    /// Reset counters, keeping history and the calibrated floor
    pub fn reset_counters(&mut self) {
        let noise_floor = self.stats.noise_floor;
        self.stats = RunningStats {
            noise_floor,
            ..Default::default()
        };
    }

    /// Clear all history and statistics
    pub fn clear(&mut self) {
        self.strength_history.clear();
        self.messages.clear();
        self.stats = RunningStats::default();
    }
}

impl Default for ReceiverStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_store_creation() {
        let store = ReceiverStats::new();
        assert!(store.strength_history().is_empty());
        assert_eq!(store.stats().ticks, 0);
        assert!(store.stats().noise_floor.is_none());
    }

    #[test]
    fn test_record_strength() {
        let mut store = ReceiverStats::new();
        let now = Utc::now();
        store.record_strength(20.0, now);
        store.record_strength(60.0, now);

        assert_eq!(store.stats().ticks, 2);
        assert_eq!(store.stats().current_strength, 60.0);
        assert_eq!(store.stats().peak_strength, 60.0);
        assert_eq!(store.stats().avg_strength, 40.0);
    }

    #[test]
    fn test_history_limit() {
        let mut store = ReceiverStats::with_capacity(10);
        let now = Utc::now();
        for i in 0..25 {
            store.record_strength(i as f32, now);
        }
        assert_eq!(store.strength_history().len(), 10);
        assert_eq!(store.stats().ticks, 25);
        assert_eq!(store.strength_history()[0].value, 15.0);
    }

    #[test]
    fn test_record_frame() {
        let mut store = ReceiverStats::new();
        let now = Utc::now();
        store.record_frame("Hello", false, now);
        store.record_frame("\u{FFFD}", true, now);

        assert_eq!(store.stats().frames_decoded, 2);
        assert_eq!(store.stats().lossy_frames, 1);
        assert_eq!(store.stats().last_text.as_deref(), Some("\u{FFFD}"));
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[0].text, "Hello");
    }

    #[test]
    fn test_snapshot_serializes_timestamps() {
        let mut store = ReceiverStats::new();
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.record_frame("Hi there", false, at);

        let json = serde_json::to_value(store.stats()).unwrap();
        assert_eq!(json["frames_decoded"], 1);
        assert_eq!(json["last_text"], "Hi there");
        assert_eq!(json["last_decoded_at"], "2024-05-01T12:00:00Z");

        let message = serde_json::to_value(&store.messages()[0]).unwrap();
        assert_eq!(message["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(message["lossy"], false);
    }

    #[test]
    fn test_plot_data_newest_first() {
        let mut store = ReceiverStats::new();
        let now = Utc::now();
        store.record_strength(10.0, now - Duration::seconds(2));
        store.record_strength(30.0, now);

        let data = store.strength_plot_data(10);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].1, 30.0);
        assert!(data[1].0 <= -2.0);
    }

    #[test]
    fn test_reset_counters_keeps_floor_and_history() {
        let mut store = ReceiverStats::new();
        store.record_strength(50.0, Utc::now());
        store.record_sync();
        store.set_noise_floor(42.0);
        store.reset_counters();

        assert_eq!(store.stats().syncs, 0);
        assert_eq!(store.stats().noise_floor, Some(42.0));
        assert_eq!(store.strength_history().len(), 1);

        store.clear();
        assert!(store.strength_history().is_empty());
        assert!(store.stats().noise_floor.is_none());
    }
}
