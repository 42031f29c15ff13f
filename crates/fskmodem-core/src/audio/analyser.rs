//! FFT magnitude analyser
//!
//! Produces the per-bin byte spectrum the receiver works on: a Blackman
//! window over the newest `fft_size` samples, magnitude normalized by the
//! window length, optional temporal smoothing, then dBFS mapped linearly onto
//! 0..=255 between `min_decibels` and `max_decibels`.

use crate::config::ModemConfig;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Spectrum analyser with a fixed window length
pub struct Analyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed Blackman window
    window: Vec<f32>,
    /// Working buffer for the transform
    buffer: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes from the previous frame
    previous: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl Analyser {
    /// Create an analyser
    ///
    /// # Arguments
    /// * `fft_size` - Window length, must be a power of two
    /// * `smoothing` - Weight of the previous frame (0 disables)
    /// * `min_decibels` / `max_decibels` - dBFS range mapped onto 0..=255
    pub fn new(fft_size: usize, smoothing: f32, min_decibels: f32, max_decibels: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            previous: vec![0.0; fft_size / 2],
            smoothing: smoothing.clamp(0.0, 0.99),
            min_decibels,
            max_decibels,
        }
    }

    pub fn from_config(config: &ModemConfig) -> Self {
        Self::new(
            config.fft_size,
            config.smoothing,
            config.min_decibels,
            config.max_decibels,
        )
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced (`fft_size / 2`)
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Compute the byte spectrum of `samples`
    ///
    /// Uses the newest `fft_size` samples; shorter input is zero-padded at the front.
    pub fn frequency_data(&mut self, samples: &[f32], out: &mut Vec<u8>) {
        let n = self.fft_size;
        let start = samples.len().saturating_sub(n);
        let recent = &samples[start..];
        let pad = n - recent.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / n as f32;
        let range = self.max_decibels - self.min_decibels;
        out.clear();
        out.reserve(self.bin_count());

        for (bin, previous) in self.previous.iter_mut().enumerate() {
            let magnitude = self.buffer[bin].norm() * scale;
            let smoothed = self.smoothing * *previous + (1.0 - self.smoothing) * magnitude;
            *previous = smoothed;

            let byte = if smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - self.min_decibels) / range).clamp(0.0, 255.0) as u8
            } else {
                0
            };
            out.push(byte);
        }
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// Classic Blackman window (alpha = 0.16)
fn blackman_window(len: usize) -> Vec<f32> {
    let n = len as f32;
    (0..len)
        .map(|i| {
            let x = i as f32 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_bin_count() {
        let analyser = Analyser::new(1024, 0.0, -100.0, -30.0);
        assert_eq!(analyser.bin_count(), 512);
    }

    #[test]
    fn test_silence_is_zero() {
        let mut analyser = Analyser::new(512, 0.0, -100.0, -30.0);
        let mut out = Vec::new();
        analyser.frequency_data(&[0.0; 512], &mut out);
        assert_eq!(out.len(), 256);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let mut analyser = Analyser::new(1024, 0.0, -100.0, -30.0);
        let samples = tone(2200.0, 0.5, 48000.0, 1024);
        let mut out = Vec::new();
        analyser.frequency_data(&samples, &mut out);

        // 2200 Hz / (48000 / 1024) = 46.9
        assert_eq!(out[47], 255);
        // Far away from the tone the Blackman sidelobes stay well below
        assert!(out[26] < 140, "leakage at 1200 Hz bin: {}", out[26]);
    }

    #[test]
    fn test_short_input_zero_padded() {
        let mut analyser = Analyser::new(1024, 0.0, -100.0, -30.0);
        let samples = tone(1200.0, 0.5, 48000.0, 700);
        let mut out = Vec::new();
        analyser.frequency_data(&samples, &mut out);
        assert!(out[26] > 200);
    }

    #[test]
    fn test_smoothing_blends_frames() {
        let mut smooth = Analyser::new(1024, 0.8, -100.0, -30.0);
        let mut raw = Analyser::new(1024, 0.0, -100.0, -30.0);
        let quiet = tone(1200.0, 0.001, 48000.0, 1024);
        let mut a = Vec::new();
        let mut b = Vec::new();

        smooth.frequency_data(&quiet, &mut a);
        raw.frequency_data(&quiet, &mut b);

        // First frame with smoothing only carries 20% of the magnitude
        assert!(a[26] < b[26]);

        smooth.reset();
        smooth.frequency_data(&[0.0; 1024], &mut a);
        assert_eq!(a[26], 0);
    }

    #[test]
    fn test_window_shape() {
        let w = blackman_window(64);
        assert!(w[0].abs() < 1e-6);
        approx::assert_relative_eq!(w[32], 1.0, epsilon = 1e-4);
    }
}
