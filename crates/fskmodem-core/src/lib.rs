//! fskmodem core - binary FSK acoustic modem
//!
//! Turns short text messages into a sequence of audio tones and recovers the
//! text from a live (or recorded) microphone stream. The transmit path frames
//! the message and schedules one tone burst per bit on the output device's
//! sample clock; the receive path samples a magnitude spectrum at a fixed
//! cadence and runs it through energy detection, a hysteresis gate, preamble
//! synchronization and terminator-delimited frame recovery.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod receiver;
pub mod stats;

pub use audio::device::{AudioInput, AudioOutput, DeviceInfo};
pub use audio::input::OfflineInput;
pub use audio::modulator::{render_bits, render_text, Modulator};
pub use audio::output::{OfflineOutput, ToneMixer};
pub use config::{CalibrationPolicy, ModemConfig, Thresholds};
pub use error::{ModemError, Result};
pub use events::{BitEvent, BusEvent, EventBus, ModemEvent, TxEvent};
pub use protocol::framing::{Bit, BitFramer, BitSequence};
pub use protocol::tone::{CarrierPlan, ToneSymbol};
pub use receiver::demodulator::Demodulator;
pub use receiver::pipeline::{DetectorState, ReceiverPipeline, SpectrumSample};
pub use receiver::{decode_offline, decoded_texts};
pub use stats::store::ReceiverStats;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for capture, playback and offline rendering
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Carrier for a 0 bit (Hz)
pub const FREQ_ZERO_HZ: f32 = 1200.0;

/// Carrier for a 1 bit (Hz)
pub const FREQ_ONE_HZ: f32 = 2200.0;

/// Half-width of the detection window around each carrier (Hz)
pub const TOLERANCE_HZ: f32 = 200.0;

/// Analysis cadence of the receiver (ms)
pub const TICK_INTERVAL_MS: u64 = 40;
