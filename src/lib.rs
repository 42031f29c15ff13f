//! fskmodem - acoustic binary FSK modem
//!
//! This library re-exports the modem core from `fskmodem-core`: text
//! framing, tone-burst transmission, the spectral receive pipeline and
//! offline WAV encode/decode. The `fskmodem` binary is a thin shell over it.

pub use fskmodem_core::{audio, config, error, events, protocol, receiver, stats};

pub use fskmodem_core::{
    decode_offline, decoded_texts, render_bits, render_text, AudioInput, AudioOutput, Bit,
    BitEvent, BitFramer, BitSequence, CalibrationPolicy, CarrierPlan, Demodulator, DetectorState,
    DeviceInfo, EventBus, ModemConfig, ModemError, ModemEvent, Modulator, OfflineInput,
    OfflineOutput, ReceiverPipeline, ReceiverStats, Result, SpectrumSample, Thresholds, ToneMixer,
    ToneSymbol, TxEvent,
};
pub use fskmodem_core::{
    DEFAULT_SAMPLE_RATE, FREQ_ONE_HZ, FREQ_ZERO_HZ, TICK_INTERVAL_MS, TOLERANCE_HZ, VERSION,
};
