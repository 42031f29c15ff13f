//! Receiver state machine
//!
//! One [`SpectrumSample`] per tick flows through
//! analyzer → strength telemetry → calibrator → hysteresis gate, and an
//! admitted bit drives `SYNCING → RECEIVING → SYNCING`. All receiver state
//! lives here and is only touched by whoever owns the pipeline, so a single
//! tick thread gives serial mutation without further locking.

use crate::config::{ModemConfig, Thresholds};
use crate::events::{BitEvent, ModemEvent};
use crate::protocol::framing::{Bit, BitFramer};
use crate::receiver::analyzer::{Analysis, FrequencyAnalyzer};
use crate::receiver::calibrator::Calibrator;
use crate::receiver::frame::FrameDecoder;
use crate::receiver::hysteresis::HysteresisGate;
use crate::receiver::sync::SyncDetector;
use crate::stats::store::ReceiverStats;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Receiver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not listening
    Idle,
    /// Listening for the preamble
    Syncing,
    /// Accumulating payload bits after a preamble match
    Receiving,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetectorState::Idle => "IDLE",
            DetectorState::Syncing => "SYNCING",
            DetectorState::Receiving => "RECEIVING",
        };
        f.write_str(name)
    }
}

/// One analysis tick's spectrum
#[derive(Debug, Clone)]
pub struct SpectrumSample {
    /// Bin magnitudes on the 0..=255 scale
    pub bins: Vec<u8>,
    /// Wall-clock time the spectrum was taken
    pub timestamp: DateTime<Utc>,
    /// Audio time consumed by the input when the spectrum was taken
    pub stream_time: Duration,
}

impl SpectrumSample {
    pub fn new(bins: Vec<u8>, stream_time: Duration) -> Self {
        Self {
            bins,
            timestamp: Utc::now(),
            stream_time,
        }
    }
}

/// Single-threaded receive pipeline
pub struct ReceiverPipeline {
    config: ModemConfig,
    analyzer: FrequencyAnalyzer,
    gate: HysteresisGate,
    sync: SyncDetector,
    frame: FrameDecoder,
    calibrator: Calibrator,
    stats: ReceiverStats,
    state: DetectorState,
    /// Stream time of the last admitted bit while receiving
    last_bit_at: Option<Duration>,
    /// Stream time of the latest tick
    now: Duration,
}

impl ReceiverPipeline {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            config: config.clone(),
            analyzer: FrequencyAnalyzer::new(config.carrier_plan()),
            gate: HysteresisGate::new(config.thresholds),
            sync: SyncDetector::new(),
            frame: FrameDecoder::new(),
            calibrator: Calibrator::new(),
            stats: ReceiverStats::new(),
            state: DetectorState::Idle,
            last_bit_at: None,
            now: Duration::ZERO,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn thresholds(&self) -> Thresholds {
        self.gate.thresholds()
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.gate.set_thresholds(thresholds);
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Bits accumulated in the current frame
    pub fn payload_len(&self) -> usize {
        self.frame.len()
    }

    /// IDLE → SYNCING; no-op when already listening
    pub fn start(&mut self) -> Vec<ModemEvent> {
        if self.state != DetectorState::Idle {
            return Vec::new();
        }
        self.gate.reset();
        let mut events = Vec::new();
        self.enter_syncing(&mut events);
        tracing::debug!("Receiver listening");
        events
    }

    /// Any state → IDLE, discarding a partial frame and any calibration
    pub fn stop(&mut self) {
        if self.state == DetectorState::Idle {
            return;
        }
        if !self.frame.is_empty() {
            tracing::debug!(bits = self.frame.len(), "Discarding partial frame");
        }
        self.frame.clear();
        self.sync.reset();
        self.calibrator.cancel();
        self.last_bit_at = None;
        self.state = DetectorState::Idle;
    }

    /// Measure the noise floor over the next `duration` of stream time
    pub fn start_calibration(&mut self, duration: Duration) {
        tracing::info!(secs = duration.as_secs_f32(), "Calibration started");
        self.calibrator.start(duration);
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_active()
    }

    /// Run one analysis tick
    pub fn process(
        &mut self,
        sample: &SpectrumSample,
        sample_rate: u32,
        fft_size: usize,
    ) -> Vec<ModemEvent> {
        let mut events = Vec::new();
        if self.state == DetectorState::Idle {
            return events;
        }
        self.now = sample.stream_time;

        let analysis = self.analyzer.analyze(
            &sample.bins,
            sample_rate,
            fft_size,
            self.gate.thresholds().min_detect,
        );
        tracing::trace!(
            strength = analysis.strength,
            mag_zero = analysis.mag_zero,
            mag_one = analysis.mag_one,
            "Tick"
        );

        let strength_percent = analysis.strength_percent();
        self.stats.record_strength(strength_percent, sample.timestamp);
        events.push(ModemEvent::SignalStats {
            peak_freq: analysis.peak_freq,
            strength_percent,
        });

        if let Some(floor) = self.calibrator.record(analysis.strength, sample.stream_time) {
            self.finish_calibration(floor, &mut events);
        }

        match self.gated_bit(&analysis) {
            Some(bit) => self.on_bit(bit, sample.timestamp, &mut events),
            None => self.check_timeout(&mut events),
        }

        events
    }

    /// Feed a bit that already passed the gate, as if admitted on this tick
    pub fn admit_bit(&mut self, bit: Bit) -> Vec<ModemEvent> {
        let mut events = Vec::new();
        self.on_bit(bit, Utc::now(), &mut events);
        events
    }

    fn gated_bit(&mut self, analysis: &Analysis) -> Option<Bit> {
        let admitted = self.gate.admit(analysis.strength);
        if analysis.bit.is_none() {
            self.stats.record_weak();
        }
        analysis.bit.filter(|_| admitted)
    }

    fn on_bit(&mut self, bit: Bit, timestamp: DateTime<Utc>, events: &mut Vec<ModemEvent>) {
        match self.state {
            DetectorState::Idle => {}
            DetectorState::Syncing => {
                self.stats.record_bit();
                if self.sync.push(bit) {
                    self.sync.reset();
                    self.frame.clear();
                    self.state = DetectorState::Receiving;
                    self.last_bit_at = Some(self.now);
                    self.stats.record_sync();
                    events.push(ModemEvent::BitDetected(BitEvent::Sync));
                    events.push(ModemEvent::StateChanged(DetectorState::Receiving));
                    tracing::debug!("Preamble matched");
                }
            }
            DetectorState::Receiving => {
                self.stats.record_bit();
                self.last_bit_at = Some(self.now);
                events.push(ModemEvent::BitDetected(BitEvent::Bit(bit)));

                if let Some(payload) = self.frame.push(bit) {
                    let decoded = BitFramer::decode_bits(&payload);
                    self.stats.record_frame(&decoded.text, decoded.lossy, timestamp);
                    tracing::info!(
                        bits = payload.len(),
                        lossy = decoded.lossy,
                        text = %decoded.text,
                        "Frame decoded"
                    );
                    events.push(ModemEvent::DataDecoded {
                        text: decoded.text,
                        lossy: decoded.lossy,
                    });
                    self.enter_syncing(events);
                }
            }
        }
    }

    fn check_timeout(&mut self, events: &mut Vec<ModemEvent>) {
        if self.state != DetectorState::Receiving {
            return;
        }
        let (Some(timeout), Some(last)) = (self.config.frame_timeout(), self.last_bit_at) else {
            return;
        };
        if self.now.saturating_sub(last) >= timeout {
            let bits = self.frame.len();
            self.stats.record_abandoned();
            tracing::debug!(bits, "Frame abandoned after timeout");
            events.push(ModemEvent::FrameAbandoned { bits });
            self.enter_syncing(events);
        }
    }

    fn finish_calibration(&mut self, floor: f32, events: &mut Vec<ModemEvent>) {
        self.stats.set_noise_floor(floor);
        if let Some(tuned) = self
            .config
            .calibration_policy
            .retune(floor, self.gate.thresholds())
        {
            tracing::info!(
                noise_floor = floor,
                high = tuned.high,
                low = tuned.low,
                "Thresholds retuned from noise floor"
            );
            self.gate.set_thresholds(tuned);
        } else {
            tracing::info!(noise_floor = floor, "Calibration complete");
        }
        events.push(ModemEvent::CalibrationComplete { noise_floor: floor });
    }

    fn enter_syncing(&mut self, events: &mut Vec<ModemEvent>) {
        self.frame.clear();
        self.sync.reset();
        self.last_bit_at = None;
        self.state = DetectorState::Syncing;
        events.push(ModemEvent::StateChanged(DetectorState::Syncing));
    }
}
