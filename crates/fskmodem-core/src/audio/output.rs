//! Tone playback on a sample clock
//!
//! [`ToneMixer`] holds scheduled bursts keyed by start frame and renders them
//! sample-accurately, so consecutive bursts abut without gaps or overlap. The
//! live sink feeds it from the cpal output callback through a lock-free
//! command channel; the offline sink renders it on demand.

use crate::audio::device::{secs_to_frames, AudioOutput};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

/// Edge ramp applied to every burst (ms), keeps bursts click-free
const RAMP_MS: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct ScheduledTone {
    frequency: f32,
    start_frame: u64,
    end_frame: u64,
}

/// Sample-clock tone scheduler and synthesizer
#[derive(Debug)]
pub struct ToneMixer {
    sample_rate: u32,
    amplitude: f32,
    ramp_frames: u64,
    tones: Vec<ScheduledTone>,
}

impl ToneMixer {
    pub fn new(sample_rate: u32, amplitude: f32) -> Self {
        Self {
            sample_rate,
            amplitude,
            ramp_frames: (sample_rate as f32 * RAMP_MS / 1000.0) as u64,
            tones: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Schedule a burst of `frames` samples starting at `start_frame`
    pub fn schedule(&mut self, frequency: f32, start_frame: u64, frames: u64) {
        if frames == 0 {
            return;
        }
        self.tones.push(ScheduledTone {
            frequency,
            start_frame,
            end_frame: start_frame + frames,
        });
    }

    /// Remove bursts that start at or after `frame`; bursts already playing finish
    pub fn cancel_after(&mut self, frame: u64) {
        self.tones.retain(|t| t.start_frame < frame);
    }

    /// Bursts not yet finished
    pub fn pending(&self) -> usize {
        self.tones.len()
    }

    /// Render frames `[start_frame, start_frame + out.len() / channels)` into
    /// interleaved `out`, writing the same sample to every channel
    pub fn render_into(&mut self, start_frame: u64, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let sample = self.sample_at(start_frame + i as u64);
            frame.iter_mut().for_each(|s| *s = sample);
        }

        let end = start_frame + (out.len() / channels) as u64;
        self.tones.retain(|t| t.end_frame > end);
    }

    fn sample_at(&self, frame: u64) -> f32 {
        let sr = self.sample_rate as f32;
        self.tones
            .iter()
            .filter(|t| (t.start_frame..t.end_frame).contains(&frame))
            .map(|t| {
                let offset = frame - t.start_frame;
                let phase = 2.0 * PI * t.frequency * offset as f32 / sr;
                self.amplitude * self.envelope(t, frame) * phase.sin()
            })
            .sum()
    }

    /// Raised-cosine fade at both edges of a burst
    fn envelope(&self, tone: &ScheduledTone, frame: u64) -> f32 {
        if self.ramp_frames == 0 {
            return 1.0;
        }
        let from_start = frame - tone.start_frame;
        let to_end = tone.end_frame - frame - 1;
        let edge = from_start.min(to_end);
        if edge >= self.ramp_frames {
            1.0
        } else {
            0.5 * (1.0 - (PI * edge as f32 / self.ramp_frames as f32).cos())
        }
    }
}

struct OfflineState {
    mixer: ToneMixer,
    clock: u64,
}

/// In-memory output whose clock only advances when audio is rendered
///
/// Clones share the same mixer and clock, so one clone can be handed to a
/// [`Modulator`](crate::audio::modulator::Modulator) while another renders.
#[derive(Clone)]
pub struct OfflineOutput {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32, amplitude: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(OfflineState {
                mixer: ToneMixer::new(sample_rate, amplitude),
                clock: 0,
            })),
        }
    }

    /// Render the next `frames` mono samples and advance the clock
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = vec![0.0; frames];
        let start = state.clock;
        state.mixer.render_into(start, &mut out, 1);
        state.clock += frames as u64;
        out
    }

    pub fn clock_frames(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clock
    }

    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mixer
            .pending()
    }
}

impl AudioOutput for OfflineOutput {
    fn sample_rate(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mixer
            .sample_rate()
    }

    fn current_time(&self) -> f64 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.clock as f64 / state.mixer.sample_rate() as f64
    }

    fn schedule_tone(&mut self, frequency: f32, start_time: f64, duration: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let sr = state.mixer.sample_rate();
        state.mixer.schedule(
            frequency,
            secs_to_frames(start_time, sr),
            secs_to_frames(duration, sr),
        );
    }

    fn cancel_after(&mut self, time: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let sr = state.mixer.sample_rate();
        state.mixer.cancel_after(secs_to_frames(time, sr));
    }
}

#[cfg(feature = "live-audio")]
mod live {
    use super::ToneMixer;
    use crate::audio::device::{
        build_error, negotiate_rate, output_device, play_error, secs_to_frames, AudioOutput,
    };
    use crate::config::ModemConfig;
    use crate::error::{ModemError, Result};
    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::{SampleRate, Stream, StreamConfig};
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Commands sent from the scheduling thread to the audio callback
    #[derive(Debug, Clone, Copy)]
    enum OutputCommand {
        Schedule {
            frequency: f32,
            start_frame: u64,
            frames: u64,
        },
        CancelAfter(u64),
    }

    const COMMAND_CAPACITY: usize = 1024;

    /// Open speaker stream
    ///
    /// Owns the cpal stream (not `Send`); keep it alive on the opening thread
    /// for as long as the paired [`CpalSink`] is in use.
    pub struct CpalOutput {
        _stream: Stream,
        device_name: String,
    }

    /// `Send` handle scheduling tones on a [`CpalOutput`]
    pub struct CpalSink {
        commands: Sender<OutputCommand>,
        clock: Arc<AtomicU64>,
        sample_rate: u32,
    }

    impl CpalOutput {
        /// Open the named (or default) output device and start playback
        pub fn open(device_name: Option<&str>, config: &ModemConfig) -> Result<(Self, CpalSink)> {
            let device = output_device(device_name)?;
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            let default_config = device
                .default_output_config()
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
                        .build_output_stream(
                            &stream_config(rate),
                            |_: &mut [f32], _: &cpal::OutputCallbackInfo| {},
                            |_| {},
                            None,
                        )
                        .map(drop)
                        .map_err(build_error)
                })?;

            let (tx, rx): (Sender<OutputCommand>, Receiver<OutputCommand>) =
                crossbeam_channel::bounded(COMMAND_CAPACITY);
            let clock = Arc::new(AtomicU64::new(0));
            let callback_clock = Arc::clone(&clock);
            let mut mixer = ToneMixer::new(sample_rate, config.amplitude);
            let num_channels = channels as usize;

            let stream = device
                .build_output_stream(
                    &stream_config(sample_rate),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        while let Ok(command) = rx.try_recv() {
                            match command {
                                OutputCommand::Schedule {
                                    frequency,
                                    start_frame,
                                    frames,
                                } => mixer.schedule(frequency, start_frame, frames),
                                OutputCommand::CancelAfter(frame) => mixer.cancel_after(frame),
                            }
                        }
                        let start = callback_clock.load(Ordering::Acquire);
                        mixer.render_into(start, data, num_channels);
                        callback_clock
                            .fetch_add((data.len() / num_channels) as u64, Ordering::Release);
                    },
                    |err| {
                        tracing::error!("Output stream error: {}", err);
                    },
                    None,
                )
                .map_err(build_error)?;

            stream.play().map_err(play_error)?;

            tracing::info!(
                "Output opened: {} @ {}Hz, {} channels",
                name,
                sample_rate,
                channels
            );

            Ok((
                Self {
                    _stream: stream,
                    device_name: name,
                },
                CpalSink {
                    commands: tx,
                    clock,
                    sample_rate,
                },
            ))
        }

        pub fn device_name(&self) -> &str {
            &self.device_name
        }
    }

    impl Drop for CpalOutput {
        fn drop(&mut self) {
            tracing::info!("Output closed: {}", self.device_name);
        }
    }

    impl CpalSink {
        fn send(&self, command: OutputCommand) {
            if self.commands.try_send(command).is_err() {
                tracing::warn!("Output command queue full or closed, dropping {:?}", command);
            }
        }
    }

    impl AudioOutput for CpalSink {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn current_time(&self) -> f64 {
            self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
        }

        fn schedule_tone(&mut self, frequency: f32, start_time: f64, duration: f64) {
            self.send(OutputCommand::Schedule {
                frequency,
                start_frame: secs_to_frames(start_time, self.sample_rate),
                frames: secs_to_frames(duration, self.sample_rate),
            });
        }

        fn cancel_after(&mut self, time: f64) {
            self.send(OutputCommand::CancelAfter(secs_to_frames(
                time,
                self.sample_rate,
            )));
        }
    }
}

#[cfg(feature = "live-audio")]
pub use live::{CpalOutput, CpalSink};
