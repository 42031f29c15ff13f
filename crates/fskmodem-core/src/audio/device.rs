//! Audio device seams
//!
//! The modem core never talks to hardware directly. The receiver pulls byte
//! spectra through [`AudioInput`], the transmitter schedules tones against the
//! output's sample clock through [`AudioOutput`]. Live implementations sit on
//! cpal (feature `live-audio`); offline ones replay or render sample buffers.

use crate::error::{ModemError, Result};
use serde::Serialize;
use std::time::Duration;

/// Source of magnitude spectra for the receiver
///
/// Implementations must never block: when no new audio arrived since the
/// previous call, `frequency_data` returns `false` and the tick is skipped.
pub trait AudioInput: Send {
    fn sample_rate(&self) -> u32;

    /// Analysis window length (power of two)
    fn fft_size(&self) -> usize;

    /// Fill `out` with `fft_size / 2` bin magnitudes on a 0..=255 scale
    fn frequency_data(&mut self, out: &mut Vec<u8>) -> bool;

    /// Fill `out` with the most recent `fft_size` time-domain samples
    fn time_data(&mut self, out: &mut Vec<f32>) -> bool;

    /// Audio time consumed so far
    fn stream_position(&self) -> Duration;
}

/// Sink for scheduled tone bursts
///
/// Times are seconds on the output's own sample clock, so bursts scheduled
/// back to back stay contiguous regardless of how late the caller runs.
pub trait AudioOutput: Send {
    fn sample_rate(&self) -> u32;

    /// Current position of the output clock in seconds
    fn current_time(&self) -> f64;

    /// Play a sine at `frequency` from `start_time` for `duration` seconds
    fn schedule_tone(&mut self, frequency: f32, start_time: f64, duration: f64);

    /// Drop every burst that has not started by `time`
    fn cancel_after(&mut self, time: f64);
}

/// Audio device information
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Whether this is the default input or output device
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
    /// Number of input channels
    pub input_channels: u16,
    /// Number of output channels
    pub output_channels: u16,
}

impl DeviceInfo {
    pub fn is_input(&self) -> bool {
        self.input_channels > 0
    }

    pub fn is_output(&self) -> bool {
        self.output_channels > 0
    }
}

/// Seconds to whole frames at `sample_rate`
pub(crate) fn secs_to_frames(secs: f64, sample_rate: u32) -> u64 {
    (secs.max(0.0) * sample_rate as f64).round() as u64
}

/// Pick the sample rate a stream will run at
///
/// Tries the configured rate first, then the device default. `try_rate`
/// builds a throwaway stream at the given rate; the last failure is returned
/// when no candidate works.
pub(crate) fn negotiate_rate(
    configured: u32,
    device_default: u32,
    mut try_rate: impl FnMut(u32) -> Result<()>,
) -> Result<u32> {
    let mut rates = vec![configured];
    if device_default != 0 && device_default != configured {
        rates.push(device_default);
    }

    let mut last_err = None;
    for rate in rates {
        match try_rate(rate) {
            Ok(()) => {
                if rate != configured {
                    tracing::warn!(
                        "Configured rate {} Hz failed, using device default {} Hz",
                        configured,
                        rate
                    );
                }
                return Ok(rate);
            }
            Err(e) => {
                tracing::warn!("Sample rate {} Hz failed: {}", rate, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| ModemError::StreamError("no sample rate to try".to_string())))
}

#[cfg(feature = "live-audio")]
mod live {
    use super::DeviceInfo;
    use crate::error::{ModemError, Result};
    use cpal::traits::{DeviceTrait, HostTrait};
    use cpal::{BuildStreamError, Device, PlayStreamError};

    const COMMON_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

    /// List the devices of the default host
    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let devices = host
            .devices()
            .map_err(|e| ModemError::DeviceUnavailable(e.to_string()))?;

        let mut infos = Vec::new();
        for device in devices {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let is_default = default_input.as_deref() == Some(name.as_str())
                || default_output.as_deref() == Some(name.as_str());

            let input_channels = device
                .default_input_config()
                .map(|c| c.channels())
                .unwrap_or(0);
            let output_channels = device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(0);

            let mut sample_rates = Vec::new();
            let ranges = device
                .supported_input_configs()
                .into_iter()
                .flatten()
                .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
                .chain(
                    device
                        .supported_output_configs()
                        .into_iter()
                        .flatten()
                        .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0)),
                );
            for (min, max) in ranges {
                for rate in COMMON_RATES {
                    if (min..=max).contains(&rate) && !sample_rates.contains(&rate) {
                        sample_rates.push(rate);
                    }
                }
            }
            sample_rates.sort_unstable();

            infos.push(DeviceInfo {
                name,
                is_default,
                sample_rates,
                input_channels,
                output_channels,
            });
        }

        Ok(infos)
    }

    /// Classify a stream build failure
    ///
    /// A vanished device or a backend refusal (permission denied, device
    /// busy) means the device is unavailable; a rejected configuration is a
    /// stream error.
    pub(crate) fn build_error(err: BuildStreamError) -> ModemError {
        match err {
            BuildStreamError::DeviceNotAvailable | BuildStreamError::BackendSpecific { .. } => {
                ModemError::DeviceUnavailable(err.to_string())
            }
            _ => ModemError::StreamError(err.to_string()),
        }
    }

    /// Classify a failure to start a built stream
    pub(crate) fn play_error(err: PlayStreamError) -> ModemError {
        ModemError::DeviceUnavailable(err.to_string())
    }

    /// Resolve an input device by name, or the host default
    pub fn input_device(name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();
        match name {
            Some(name) => host
                .input_devices()
                .map_err(|e| ModemError::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| ModemError::DeviceUnavailable(format!("input device '{name}' not found"))),
            None => host
                .default_input_device()
                .ok_or_else(|| ModemError::DeviceUnavailable("no default input device".to_string())),
        }
    }

    /// Resolve an output device by name, or the host default
    pub fn output_device(name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();
        match name {
            Some(name) => host
                .output_devices()
                .map_err(|e| ModemError::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| ModemError::DeviceUnavailable(format!("output device '{name}' not found"))),
            None => host
                .default_output_device()
                .ok_or_else(|| ModemError::DeviceUnavailable("no default output device".to_string())),
        }
    }
}

#[cfg(feature = "live-audio")]
pub use live::{input_device, list_devices, output_device};
#[cfg(feature = "live-audio")]
pub(crate) use live::{build_error, play_error};
