//! Spectrum sources for the receiver
//!
//! Both sources keep a sliding window of the newest `fft_size` samples and run
//! it through the [`Analyser`] on demand. The live source drains a lock-free
//! ring buffer filled by the cpal input callback; the offline source steps
//! through a recorded buffer by a fixed hop per call.

use crate::audio::analyser::Analyser;
use crate::audio::device::AudioInput;
use crate::config::ModemConfig;
use std::time::Duration;

/// Replays recorded samples, advancing `hop` frames per analysis
pub struct OfflineInput {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    hop: usize,
    analyser: Analyser,
}

impl OfflineInput {
    /// Source hopping one analysis tick of audio per call
    pub fn from_config(samples: Vec<f32>, sample_rate: u32, config: &ModemConfig) -> Self {
        Self {
            samples,
            sample_rate,
            position: 0,
            hop: config.tick_frames(sample_rate).max(1),
            analyser: Analyser::from_config(config),
        }
    }

    /// Override the hop size in frames
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop.max(1);
        self
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// No full hop of audio is left
    pub fn is_exhausted(&self) -> bool {
        self.position + self.hop > self.samples.len()
    }

    fn window(&self) -> &[f32] {
        let start = self.position.saturating_sub(self.analyser.fft_size());
        &self.samples[start..self.position]
    }
}

impl AudioInput for OfflineInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn frequency_data(&mut self, out: &mut Vec<u8>) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.position += self.hop;
        let start = self.position.saturating_sub(self.analyser.fft_size());
        self.analyser
            .frequency_data(&self.samples[start..self.position], out);
        true
    }

    fn time_data(&mut self, out: &mut Vec<f32>) -> bool {
        if self.position == 0 {
            return false;
        }
        let n = self.analyser.fft_size();
        let window = self.window();
        out.clear();
        out.resize(n - window.len(), 0.0);
        out.extend_from_slice(window);
        true
    }

    fn stream_position(&self) -> Duration {
        Duration::from_secs_f64(self.position as f64 / self.sample_rate as f64)
    }
}

#[cfg(feature = "live-audio")]
mod live {
    use crate::audio::analyser::Analyser;
    use crate::audio::device::{
        build_error, input_device, negotiate_rate, play_error, AudioInput,
    };
    use crate::config::ModemConfig;
    use crate::error::{ModemError, Result};
    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::{SampleRate, Stream, StreamConfig};
    use ringbuf::traits::{Consumer, Observer, Producer, Split};
    use ringbuf::{HeapCons, HeapRb};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Ring buffer size in samples (enough for ~0.5 second at 96kHz)
    const RING_BUFFER_SIZE: usize = 65536;

    /// Open microphone stream
    ///
    /// Owns the cpal stream (not `Send`); keep it alive on the opening thread
    /// while the paired [`CpalSource`] feeds a receiver.
    pub struct CpalInput {
        _stream: Stream,
        device_name: String,
        overruns: Arc<AtomicU64>,
    }

    /// `Send` spectrum source reading from a [`CpalInput`]
    pub struct CpalSource {
        consumer: HeapCons<f32>,
        window: VecDeque<f32>,
        scratch: Vec<f32>,
        analyser: Analyser,
        sample_rate: u32,
        frames_read: u64,
    }

    impl CpalInput {
        /// Open the named (or default) input device and start capturing
        pub fn open(device_name: Option<&str>, config: &ModemConfig) -> Result<(Self, CpalSource)> {
            let device = input_device(device_name)?;
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            let default_config = device
                .default_input_config()
                .map_err(|e| ModemError::DeviceUnavailable(e.to_string()))?;
            let channels = default_config.channels();
            let stream_config = |rate: u32| StreamConfig {
                channels,
                sample_rate: SampleRate(rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let sample_rate =
                negotiate_rate(config.sample_rate, default_config.sample_rate().0, |rate| {
                    device
                        .build_input_stream(
                            &stream_config(rate),
                            |_: &[f32], _: &cpal::InputCallbackInfo| {},
                            |_| {},
                            None,
                        )
                        .map(drop)
                        .map_err(build_error)
                })?;

            let ring = HeapRb::<f32>::new(RING_BUFFER_SIZE);
            let (mut producer, consumer) = ring.split();
            let overruns = Arc::new(AtomicU64::new(0));
            let callback_overruns = Arc::clone(&overruns);
            let num_channels = channels as usize;

            let stream = device
                .build_input_stream(
                    &stream_config(sample_rate),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        // Channel 0 only; the receiver works on mono audio
                        for frame in data.chunks(num_channels) {
                            if let Some(&sample) = frame.first() {
                                if producer.try_push(sample).is_err() {
                                    callback_overruns.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                    },
                    |err| {
                        tracing::error!("Input stream error: {}", err);
                    },
                    None,
                )
                .map_err(build_error)?;

            stream.play().map_err(play_error)?;

            tracing::info!(
                "Input opened: {} @ {}Hz, {} channels",
                name,
                sample_rate,
                channels
            );

            let fft_size = config.fft_size;
            Ok((
                Self {
                    _stream: stream,
                    device_name: name,
                    overruns,
                },
                CpalSource {
                    consumer,
                    window: VecDeque::from(vec![0.0; fft_size]),
                    scratch: vec![0.0; 4096],
                    analyser: Analyser::from_config(config),
                    sample_rate,
                    frames_read: 0,
                },
            ))
        }

        pub fn device_name(&self) -> &str {
            &self.device_name
        }

        /// Samples dropped because the receiver fell behind
        pub fn overruns(&self) -> u64 {
            self.overruns.load(Ordering::Relaxed)
        }
    }

    impl Drop for CpalInput {
        fn drop(&mut self) {
            let overruns = self.overruns();
            if overruns > 0 {
                tracing::warn!("Input closed with {} dropped samples", overruns);
            }
            tracing::info!("Input closed: {}", self.device_name);
        }
    }

    impl CpalSource {
        /// Move everything captured so far into the sliding window
        fn drain(&mut self) -> usize {
            let fft_size = self.analyser.fft_size();
            let mut total = 0;
            while self.consumer.occupied_len() > 0 {
                let read = self.consumer.pop_slice(&mut self.scratch);
                if read == 0 {
                    break;
                }
                self.window.extend(&self.scratch[..read]);
                total += read;
            }
            let excess = self.window.len().saturating_sub(fft_size);
            self.window.drain(..excess);
            self.frames_read += total as u64;
            total
        }
    }

    impl AudioInput for CpalSource {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn fft_size(&self) -> usize {
            self.analyser.fft_size()
        }

        fn frequency_data(&mut self, out: &mut Vec<u8>) -> bool {
            if self.drain() == 0 {
                return false;
            }
            let window = self.window.make_contiguous();
            self.analyser.frequency_data(window, out);
            true
        }

        fn time_data(&mut self, out: &mut Vec<f32>) -> bool {
            self.drain();
            out.clear();
            out.extend(self.window.iter().copied());
            self.frames_read > 0
        }

        fn stream_position(&self) -> Duration {
            Duration::from_secs_f64(self.frames_read as f64 / self.sample_rate as f64)
        }
    }
}

#[cfg(feature = "live-audio")]
pub use live::{CpalInput, CpalSource};
