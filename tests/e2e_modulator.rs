//! E2E tests for the transmitter
//!
//! Drives the modulator against an offline output whose clock only advances
//! when audio is rendered, then decodes what was rendered.

use crossbeam_channel::Receiver;
use fskmodem::audio::modulator::{LEAD_IN_BITS, TAIL_BITS};
use fskmodem::{
    decode_offline, decoded_texts, BitFramer, ModemConfig, Modulator, OfflineOutput, TxEvent,
};
use std::time::Duration;

const SAMPLE_RATE: u32 = 48000;
const WAIT: Duration = Duration::from_secs(5);

/// Render one bit period at a time, never past a burst the pacer has not
/// scheduled yet, and collect every event
fn render_transmission(
    output: &OfflineOutput,
    events: &Receiver<TxEvent>,
    framed_len: usize,
    bit_frames: usize,
) -> (Vec<f32>, Vec<TxEvent>) {
    let mut audio = Vec::new();
    let mut seen = Vec::new();
    let mut sent = 0;

    for chunk in 0..LEAD_IN_BITS + framed_len + TAIL_BITS {
        // Bursts starting inside this chunk: index <= chunk - LEAD_IN_BITS
        let needed = (chunk + 1).saturating_sub(LEAD_IN_BITS).min(framed_len);
        while sent < needed {
            let event = events.recv_timeout(WAIT).expect("pacer stalled");
            if matches!(event, TxEvent::BitSent { .. }) {
                sent += 1;
            }
            seen.push(event);
        }
        audio.extend(output.render(bit_frames));
    }

    while seen.last() != Some(&TxEvent::Complete) {
        seen.push(events.recv_timeout(WAIT).expect("no completion"));
    }
    (audio, seen)
}

#[test]
fn test_transmitted_audio_decodes() {
    let config = ModemConfig::default();
    let output = OfflineOutput::new(SAMPLE_RATE, config.amplitude);
    let mut modulator = Modulator::new(output.clone(), &config);
    let events = modulator.subscribe();

    let text = "Hello, World";
    let framed_len = BitFramer::frame(&BitFramer::text_to_bits(text)).len();
    modulator.transmit_text(text).unwrap();

    let (audio, seen) =
        render_transmission(&output, &events, framed_len, config.bit_frames(SAMPLE_RATE));

    let decoded = decode_offline(audio, SAMPLE_RATE, &config).unwrap();
    assert_eq!(decoded_texts(&decoded), vec![text.to_string()]);

    let remaining: Vec<usize> = seen
        .iter()
        .filter_map(|e| match e {
            TxEvent::BitSent { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining.len(), framed_len);
    assert_eq!(remaining.first(), Some(&(framed_len - 1)));
    assert_eq!(remaining.last(), Some(&0));
    assert!(remaining.windows(2).all(|w| w[0] == w[1] + 1));
}

#[test]
fn test_events_follow_framed_bits() {
    let config = ModemConfig::default();
    let output = OfflineOutput::new(SAMPLE_RATE, config.amplitude);
    let mut modulator = Modulator::new(output.clone(), &config);
    let events = modulator.subscribe();

    let payload = BitFramer::text_to_bits("ok");
    let framed = BitFramer::frame(&payload);
    modulator.transmit(&payload).unwrap();

    let (_, seen) =
        render_transmission(&output, &events, framed.len(), config.bit_frames(SAMPLE_RATE));
    let bits: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            TxEvent::BitSent { bit, .. } => Some(*bit),
            _ => None,
        })
        .collect();
    assert_eq!(bits, framed);
    assert_eq!(seen.last(), Some(&TxEvent::Complete));
}

#[test]
fn test_multiple_subscribers_see_same_events() {
    let config = ModemConfig::default();
    let output = OfflineOutput::new(SAMPLE_RATE, config.amplitude);
    let mut modulator = Modulator::new(output.clone(), &config);
    let first = modulator.subscribe();
    let second = modulator.subscribe();

    modulator.transmit(&[]).unwrap();
    let (_, seen) = render_transmission(&output, &first, 16, config.bit_frames(SAMPLE_RATE));
    let mirrored: Vec<TxEvent> = second.try_iter().collect();
    assert_eq!(seen, mirrored);
}

#[test]
fn test_stop_mid_transmission_silences_output() {
    let config = ModemConfig::default();
    let output = OfflineOutput::new(SAMPLE_RATE, config.amplitude);
    let mut modulator = Modulator::new(output.clone(), &config);
    let events = modulator.subscribe();

    modulator.transmit_text("Hello, World").unwrap();
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        TxEvent::BitSent { .. }
    ));
    modulator.stop();
    assert!(!modulator.is_transmitting());

    // Nothing had started playing at clock 0, so every burst was dropped
    let audio = output.render(SAMPLE_RATE as usize);
    assert!(audio.iter().all(|&s| s == 0.0));
    assert_eq!(events.try_iter().last(), Some(TxEvent::Cancelled));
}
