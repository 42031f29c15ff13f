//! Receive path
//!
//! Spectrum in, text out:
//! - [`analyzer`]: two-carrier energy comparison per spectrum
//! - [`hysteresis`]: Schmitt-trigger gate on strength
//! - [`sync`]: preamble match over admitted bits
//! - [`frame`]: terminator-delimited payload recovery
//! - [`calibrator`]: ambient noise floor
//! - [`pipeline`]: the state machine tying these together
//! - [`sampler`] / [`demodulator`]: fixed-cadence live operation

pub mod analyzer;
pub mod calibrator;
pub mod demodulator;
pub mod frame;
pub mod hysteresis;
pub mod pipeline;
pub mod sampler;
pub mod sync;

use crate::audio::device::AudioInput;
use crate::audio::input::OfflineInput;
use crate::config::ModemConfig;
use crate::error::Result;
use crate::events::ModemEvent;
use pipeline::{ReceiverPipeline, SpectrumSample};

/// Run the receive pipeline over recorded samples as fast as possible
///
/// Hops one tick of audio per analysis step, exactly like the live receiver
/// would at its nominal cadence, and returns every event in order.
pub fn decode_offline(
    samples: Vec<f32>,
    sample_rate: u32,
    config: &ModemConfig,
) -> Result<Vec<ModemEvent>> {
    let config = ModemConfig {
        sample_rate,
        ..config.clone()
    };
    config.validate()?;

    let mut input = OfflineInput::from_config(samples, sample_rate, &config);
    let mut pipeline = ReceiverPipeline::new(&config);
    let mut events = pipeline.start();
    let mut bins = Vec::new();

    while input.frequency_data(&mut bins) {
        let sample = SpectrumSample::new(bins.clone(), input.stream_position());
        events.extend(pipeline.process(&sample, sample_rate, input.fft_size()));
    }
    pipeline.stop();

    tracing::debug!(
        ticks = pipeline.stats().stats().ticks,
        frames = pipeline.stats().stats().frames_decoded,
        "Offline decode finished"
    );
    Ok(events)
}

/// Texts of every decoded frame in `events`
pub fn decoded_texts(events: &[ModemEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ModemEvent::DataDecoded { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::modulator::render_text;
    use crate::error::ModemError;

    #[test]
    fn test_decode_offline_round_trip() {
        let config = ModemConfig::default();
        let samples = render_text("Hello, World", &config, 48000);
        let events = decode_offline(samples, 48000, &config).unwrap();
        assert_eq!(decoded_texts(&events), vec!["Hello, World".to_string()]);
    }

    #[test]
    fn test_decode_offline_silence() {
        let config = ModemConfig::default();
        let events = decode_offline(vec![0.0; 48000], 48000, &config).unwrap();
        assert!(decoded_texts(&events).is_empty());
    }

    #[test]
    fn test_decode_offline_rejects_tick_bit_mismatch() {
        let config = ModemConfig {
            bit_duration_ms: 60,
            ..Default::default()
        };
        let samples = render_text("Hello, World", &config, 48000);
        assert!(matches!(
            decode_offline(samples, 48000, &config),
            Err(ModemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_decode_offline_slower_bit_rate() {
        let config = ModemConfig {
            bit_duration_ms: 60,
            tick_interval_ms: 60,
            ..Default::default()
        };
        let samples = render_text("Hello, World", &config, 48000);
        let events = decode_offline(samples, 48000, &config).unwrap();
        assert_eq!(decoded_texts(&events), vec!["Hello, World".to_string()]);
    }

    #[test]
    fn test_decode_offline_rejects_bad_rate() {
        let config = ModemConfig::default();
        assert!(decode_offline(vec![0.0; 100], 4000, &config).is_err());
    }
}
