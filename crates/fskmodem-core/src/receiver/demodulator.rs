//! Owned receiver handle
//!
//! Couples an [`AudioInput`] to a [`ReceiverPipeline`] through a
//! [`SpectralSampler`] thread. Spectra are pulled outside the lock; pipeline
//! mutation and event publication happen under it, behind a `running` check,
//! so once [`Demodulator::stop`] returns no tick can publish again.

use crate::audio::device::AudioInput;
use crate::config::{ModemConfig, Thresholds};
use crate::error::{ModemError, Result};
use crate::events::{EventBus, ModemEvent};
use crate::receiver::pipeline::{DetectorState, ReceiverPipeline, SpectrumSample};
use crate::receiver::sampler::{SamplerHandle, SpectralSampler};
use crate::stats::store::ReceiverStats;
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct RxShared {
    pipeline: ReceiverPipeline,
    bus: EventBus<ModemEvent>,
    running: bool,
}

impl RxShared {
    fn publish_all(&mut self, events: Vec<ModemEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }
}

/// Binary FSK receiver
pub struct Demodulator {
    config: ModemConfig,
    shared: Arc<Mutex<RxShared>>,
    sampler: Option<SamplerHandle>,
}

impl Demodulator {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            config: config.clone(),
            shared: Arc::new(Mutex::new(RxShared {
                pipeline: ReceiverPipeline::new(config),
                bus: EventBus::new(),
                running: false,
            })),
            sampler: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RxShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a consumer of [`ModemEvent`]s
    pub fn subscribe(&self) -> Receiver<ModemEvent> {
        self.lock().bus.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn state(&self) -> DetectorState {
        self.lock().pipeline.state()
    }

    /// Snapshot of the receiver telemetry
    pub fn stats(&self) -> ReceiverStats {
        self.lock().pipeline.stats().clone()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.lock().pipeline.thresholds()
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.lock().pipeline.set_thresholds(thresholds);
    }

    /// Start listening on `input`: IDLE → SYNCING and begin ticking
    pub fn start(&mut self, input: impl AudioInput + 'static) -> Result<()> {
        {
            let mut shared = self.lock();
            if shared.running {
                return Err(ModemError::Busy("receiver"));
            }
            shared.running = true;
            let events = shared.pipeline.start();
            shared.publish_all(events);
        }
        // A sampler left over from a tick-requested exit
        if let Some(mut old) = self.sampler.take() {
            old.stop();
        }

        tracing::info!(
            sample_rate = input.sample_rate(),
            fft_size = input.fft_size(),
            tick_ms = self.config.tick_interval_ms,
            "Receiver started"
        );

        let shared = Arc::clone(&self.shared);
        let mut input = input;
        let mut bins = Vec::with_capacity(input.fft_size() / 2);

        let spawned = SpectralSampler::new(self.config.tick_interval()).spawn(move || {
            if !input.frequency_data(&mut bins) {
                // Nothing new captured; skip this tick
                return true;
            }
            let sample = SpectrumSample::new(bins.clone(), input.stream_position());

            let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if !shared.running {
                return false;
            }
            let events = shared
                .pipeline
                .process(&sample, input.sample_rate(), input.fft_size());
            shared.publish_all(events);
            true
        });

        match spawned {
            Ok(handle) => {
                self.sampler = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut shared = self.lock();
                shared.running = false;
                shared.pipeline.stop();
                Err(e)
            }
        }
    }

    /// Stop listening: any state → IDLE
    ///
    /// Discards a partial frame without decoding it. No event is published
    /// after this returns. Calling it while idle is a no-op.
    pub fn stop(&mut self) {
        {
            let mut shared = self.lock();
            if shared.running {
                shared.running = false;
                shared.pipeline.stop();
                tracing::info!("Receiver stopped");
            }
        }
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
        }
    }

    /// Measure the noise floor over the next `duration` of captured audio
    ///
    /// The result arrives as [`ModemEvent::CalibrationComplete`].
    pub fn start_calibration(&self, duration: Duration) {
        self.lock().pipeline.start_calibration(duration);
    }
}

impl Drop for Demodulator {
    fn drop(&mut self) {
        self.stop();
    }
}
