//! Modem configuration
//!
//! Protocol constants, receiver thresholds and transmit timing, persisted as
//! JSON. Every field has a default so partial files stay valid.

use crate::error::{ModemError, Result};
use crate::protocol::tone::CarrierPlan;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_sample_rate() -> u32 {
    crate::DEFAULT_SAMPLE_RATE
}

fn default_freq_zero() -> f32 {
    crate::FREQ_ZERO_HZ
}

fn default_freq_one() -> f32 {
    crate::FREQ_ONE_HZ
}

fn default_tolerance() -> f32 {
    crate::TOLERANCE_HZ
}

fn default_bit_duration_ms() -> u64 {
    40
}

fn default_tick_interval_ms() -> u64 {
    crate::TICK_INTERVAL_MS
}

fn default_fft_size() -> usize {
    1024
}

fn default_min_decibels() -> f32 {
    -100.0
}

fn default_max_decibels() -> f32 {
    -30.0
}

fn default_amplitude() -> f32 {
    0.5
}

fn default_lookahead_ms() -> u64 {
    120
}

/// Hysteresis and detection thresholds on the 0..=255 strength scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Strength above which the gate switches on
    pub high: u8,
    /// Strength below which the gate switches off
    pub low: u8,
    /// Strength that must be exceeded for any bit to be reported
    pub min_detect: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 140,
            low: 80,
            min_detect: 90,
        }
    }
}

/// What to do with a measured noise floor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum CalibrationPolicy {
    /// Report the floor only; thresholds are left alone
    #[default]
    Diagnostic,
    /// Move the hysteresis thresholds relative to the measured floor
    Retune {
        /// `low = floor + low_margin`
        low_margin: u8,
        /// `high = floor + high_margin`
        high_margin: u8,
    },
}

impl CalibrationPolicy {
    /// Thresholds to use after measuring `noise_floor`, `None` when unchanged
    ///
    /// `min_detect` is never touched; `high` is kept strictly above `low`.
    pub fn retune(&self, noise_floor: f32, current: Thresholds) -> Option<Thresholds> {
        match *self {
            CalibrationPolicy::Diagnostic => None,
            CalibrationPolicy::Retune {
                low_margin,
                high_margin,
            } => {
                let shift = |margin: u8| (noise_floor + margin as f32).round().clamp(0.0, 255.0) as u8;
                let low = shift(low_margin).min(254);
                let high = shift(high_margin).max(low + 1);
                Some(Thresholds {
                    high,
                    low,
                    min_detect: current.min_detect,
                })
            }
        }
    }
}

/// Complete modem configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Preferred sample rate for devices and offline rendering (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Carrier for a 0 bit (Hz)
    #[serde(default = "default_freq_zero")]
    pub freq_zero_hz: f32,
    /// Carrier for a 1 bit (Hz)
    #[serde(default = "default_freq_one")]
    pub freq_one_hz: f32,
    /// Detection window half-width around each carrier (Hz)
    #[serde(default = "default_tolerance")]
    pub tolerance_hz: f32,
    /// Tone burst length per bit (ms)
    #[serde(default = "default_bit_duration_ms")]
    pub bit_duration_ms: u64,
    /// Receiver analysis cadence (ms)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Analyser window length, power of two
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Analyser temporal smoothing, 0 disables
    #[serde(default)]
    pub smoothing: f32,
    /// Magnitude mapped to byte 0 (dBFS)
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    /// Magnitude mapped to byte 255 (dBFS)
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
    /// Transmit amplitude (0..=1)
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub calibration_policy: CalibrationPolicy,
    /// Abandon a frame after this long without an admitted bit (disabled when absent)
    #[serde(default)]
    pub frame_timeout_ms: Option<u64>,
    /// How far ahead of the output clock tone bursts are scheduled (ms)
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            freq_zero_hz: default_freq_zero(),
            freq_one_hz: default_freq_one(),
            tolerance_hz: default_tolerance(),
            bit_duration_ms: default_bit_duration_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            fft_size: default_fft_size(),
            smoothing: 0.0,
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            amplitude: default_amplitude(),
            thresholds: Thresholds::default(),
            calibration_policy: CalibrationPolicy::default(),
            frame_timeout_ms: None,
            lookahead_ms: default_lookahead_ms(),
        }
    }
}

impl ModemConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config from disk");
                config
            }
            Err(ModemError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate config, reporting every failure
    pub fn load_strict(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ModemError::InvalidConfig(msg));

        if !(8000..=384000).contains(&self.sample_rate) {
            return invalid(format!("sample rate {} Hz out of range", self.sample_rate));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        for freq in [self.freq_zero_hz, self.freq_one_hz] {
            if !(freq > 0.0 && freq < nyquist) {
                return invalid(format!("carrier {freq} Hz must lie in (0, {nyquist}) Hz"));
            }
        }
        if self.tolerance_hz <= 0.0 {
            return invalid("tolerance must be positive".to_string());
        }
        if (self.freq_one_hz - self.freq_zero_hz).abs() <= 2.0 * self.tolerance_hz {
            return invalid(format!(
                "carriers {} Hz and {} Hz overlap within ±{} Hz",
                self.freq_zero_hz, self.freq_one_hz, self.tolerance_hz
            ));
        }
        if self.bit_duration_ms == 0 || self.tick_interval_ms == 0 {
            return invalid("bit duration and tick interval must be non-zero".to_string());
        }
        // The receiver takes exactly one spectrum per bit
        if self.bit_duration_ms != self.tick_interval_ms {
            return invalid(format!(
                "tick interval {} ms must equal bit duration {} ms",
                self.tick_interval_ms, self.bit_duration_ms
            ));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return invalid(format!(
                "fft size {} must be a power of two in 32..=32768",
                self.fft_size
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return invalid(format!("smoothing {} must be in [0, 1)", self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return invalid("min_decibels must be below max_decibels".to_string());
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return invalid(format!("amplitude {} must be in (0, 1]", self.amplitude));
        }
        if self.thresholds.low >= self.thresholds.high {
            return invalid(format!(
                "low threshold {} must be below high threshold {}",
                self.thresholds.low, self.thresholds.high
            ));
        }
        Ok(())
    }

    pub fn carrier_plan(&self) -> CarrierPlan {
        CarrierPlan {
            zero_hz: self.freq_zero_hz,
            one_hz: self.freq_one_hz,
            tolerance_hz: self.tolerance_hz,
        }
    }

    pub fn bit_duration(&self) -> Duration {
        Duration::from_millis(self.bit_duration_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame_timeout(&self) -> Option<Duration> {
        self.frame_timeout_ms.map(Duration::from_millis)
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }

    /// Samples per bit at the given rate
    pub fn bit_frames(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.bit_duration_ms / 1000) as usize
    }

    /// Samples per analysis tick at the given rate
    pub fn tick_frames(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.tick_interval_ms / 1000) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_policy_keeps_thresholds() {
        assert_eq!(
            CalibrationPolicy::Diagnostic.retune(40.0, Thresholds::default()),
            None
        );
    }

    #[test]
    fn test_retune_policy() {
        let policy = CalibrationPolicy::Retune {
            low_margin: 20,
            high_margin: 60,
        };
        let tuned = policy.retune(40.4, Thresholds::default()).unwrap();
        assert_eq!(tuned.low, 60);
        assert_eq!(tuned.high, 100);
        assert_eq!(tuned.min_detect, 90);

        // Saturates at the top of the scale with high above low
        let tuned = policy.retune(250.0, Thresholds::default()).unwrap();
        assert_eq!(tuned.low, 254);
        assert_eq!(tuned.high, 255);
    }

    #[test]
    fn test_default_config() {
        let config = ModemConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.freq_zero_hz, 1200.0);
        assert_eq!(config.freq_one_hz, 2200.0);
        assert_eq!(config.thresholds, Thresholds { high: 140, low: 80, min_detect: 90 });
        assert_eq!(config.calibration_policy, CalibrationPolicy::Diagnostic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let config = ModemConfig {
            bit_duration_ms: 50,
            calibration_policy: CalibrationPolicy::Retune {
                low_margin: 10,
                high_margin: 40,
            },
            frame_timeout_ms: Some(2000),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: ModemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"bit_duration_ms": 80, "thresholds": {"high": 200, "low": 100, "min_detect": 120}}"#;
        let config: ModemConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bit_duration_ms, 80);
        assert_eq!(config.thresholds.high, 200);
        assert_eq!(config.tick_interval_ms, 40);
        assert_eq!(config.fft_size, 1024);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ModemConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ModemConfig::default());
    }

    #[test]
    fn test_policy_json_shape() {
        let json = r#"{"calibration_policy": {"mode": "retune", "low_margin": 5, "high_margin": 30}}"#;
        let config: ModemConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.calibration_policy,
            CalibrationPolicy::Retune { low_margin: 5, high_margin: 30 }
        );
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = ModemConfig {
            thresholds: Thresholds { high: 80, low: 140, min_detect: 90 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_tick_not_matching_bit() {
        let config = ModemConfig {
            bit_duration_ms: 60,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));

        let matched = ModemConfig {
            bit_duration_ms: 60,
            tick_interval_ms: 60,
            ..Default::default()
        };
        assert!(matched.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlapping_carriers() {
        let config = ModemConfig {
            freq_one_hz: 1500.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fft_size() {
        let config = ModemConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_carrier_above_nyquist() {
        let config = ModemConfig {
            sample_rate: 8000,
            freq_one_hz: 4400.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_counts() {
        let config = ModemConfig::default();
        assert_eq!(config.bit_frames(48000), 1920);
        assert_eq!(config.tick_frames(44100), 1764);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("modem.json");

        let config = ModemConfig {
            amplitude: 0.8,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = ModemConfig::load_strict(&path).unwrap();
        assert_eq!(loaded.amplitude, 0.8);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModemConfig::load(&dir.path().join("absent.json"));
        assert_eq!(config, ModemConfig::default());
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"fft_size": 1000}"#).unwrap();
        assert!(ModemConfig::load_strict(&path).is_err());
        assert_eq!(ModemConfig::load(&path), ModemConfig::default());
    }
}
