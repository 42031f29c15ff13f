//! Energy-comparison bit detector
//!
//! Reduces one byte spectrum to a bit decision by comparing the strongest bin
//! inside the tolerance window around each carrier.

use crate::protocol::framing::Bit;
use crate::protocol::tone::CarrierPlan;

/// Result of analysing one spectrum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    /// Detected bit, `None` when neither carrier clears `min_detect`
    pub bit: Option<Bit>,
    /// Strongest magnitude across both windows (0..=255)
    pub strength: u8,
    /// Carrier of the detected bit
    pub peak_freq: Option<f32>,
    pub mag_zero: u8,
    pub mag_one: u8,
}

impl Analysis {
    /// Strength rescaled to 0..=100
    pub fn strength_percent(&self) -> f32 {
        self.strength as f32 * 100.0 / 255.0
    }
}

/// Two-carrier frequency analyzer
#[derive(Debug, Clone, Copy)]
pub struct FrequencyAnalyzer {
    plan: CarrierPlan,
}

impl FrequencyAnalyzer {
    pub fn new(plan: CarrierPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &CarrierPlan {
        &self.plan
    }

    /// Analyse a byte spectrum of `fft_size / 2` bins
    ///
    /// Ties go to 0: bit 1 requires `mag_one > mag_zero`.
    pub fn analyze(
        &self,
        spectrum: &[u8],
        sample_rate: u32,
        fft_size: usize,
        min_detect: u8,
    ) -> Analysis {
        let bin_size = sample_rate as f32 / fft_size as f32;
        let radius = (self.plan.tolerance_hz / bin_size).round() as usize;

        let mag_zero = window_peak(spectrum, bin_index(self.plan.zero_hz, bin_size), radius);
        let mag_one = window_peak(spectrum, bin_index(self.plan.one_hz, bin_size), radius);
        let strength = mag_zero.max(mag_one);

        let bit = if strength <= min_detect {
            None
        } else if mag_one > mag_zero {
            Some(Bit::One)
        } else {
            Some(Bit::Zero)
        };

        Analysis {
            bit,
            strength,
            peak_freq: bit.map(|b| self.plan.frequency_for_bit(b)),
            mag_zero,
            mag_one,
        }
    }
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new(CarrierPlan::default())
    }
}

fn bin_index(freq: f32, bin_size: f32) -> usize {
    (freq / bin_size).round().max(0.0) as usize
}

/// Max over `[center - radius, center + radius]`, clamped to the spectrum
///
/// A window lying entirely past the last bin reads as silence.
fn window_peak(spectrum: &[u8], center: usize, radius: usize) -> u8 {
    let lo = center.saturating_sub(radius);
    if lo >= spectrum.len() {
        return 0;
    }
    let hi = (center + radius).min(spectrum.len() - 1);
    spectrum[lo..=hi].iter().copied().max().unwrap_or(0)
}
