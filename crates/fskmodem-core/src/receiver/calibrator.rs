//! Ambient noise measurement

use std::time::Duration;

/// Averages signal strength over a fixed window of stream time
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    duration: Option<Duration>,
    started_at: Option<Duration>,
    sum: f64,
    count: u64,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a measurement lasting `duration`; restarts any measurement in progress
    pub fn start(&mut self, duration: Duration) {
        self.duration = Some(duration);
        self.started_at = None;
        self.sum = 0.0;
        self.count = 0;
    }

    pub fn is_active(&self) -> bool {
        self.duration.is_some()
    }

    /// Record a strength sample taken at stream time `at`
    ///
    /// Returns the mean strength (the noise floor) once `duration` has
    /// elapsed since the first sample, and goes inactive.
    pub fn record(&mut self, strength: u8, at: Duration) -> Option<f32> {
        let duration = self.duration?;
        let started_at = *self.started_at.get_or_insert(at);

        self.sum += strength as f64;
        self.count += 1;

        if at.saturating_sub(started_at) >= duration {
            let floor = (self.sum / self.count as f64) as f32;
            self.cancel();
            return Some(floor);
        }
        None
    }

    pub fn cancel(&mut self) {
        self.duration = None;
        self.started_at = None;
        self.sum = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_records_nothing() {
        let mut calibrator = Calibrator::new();
        assert_eq!(calibrator.record(100, Duration::ZERO), None);
        assert!(!calibrator.is_active());
    }

    #[test]
    fn test_mean_after_duration() {
        let mut calibrator = Calibrator::new();
        calibrator.start(Duration::from_millis(100));

        let mut result = None;
        for (i, strength) in [10u8, 20, 30, 40].into_iter().enumerate() {
            result = calibrator.record(strength, Duration::from_millis(40 * i as u64 + 1000));
        }
        // Samples at 1000, 1040, 1080 ms do not reach 100 ms; 1120 does
        approx::assert_relative_eq!(result.unwrap(), 25.0);
        assert!(!calibrator.is_active());
    }

    #[test]
    fn test_restart_discards_samples() {
        let mut calibrator = Calibrator::new();
        calibrator.start(Duration::from_millis(40));
        calibrator.record(200, Duration::ZERO);
        calibrator.start(Duration::from_millis(40));
        calibrator.record(10, Duration::from_millis(100));
        let floor = calibrator.record(30, Duration::from_millis(140)).unwrap();
        approx::assert_relative_eq!(floor, 20.0);
    }
}
