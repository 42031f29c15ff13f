//! E2E tests for offline WAV encode and decode

use fskmodem::audio::wav::{read_wav, write_wav};
use fskmodem::{decode_offline, decoded_texts, render_text, ModemConfig};

fn round_trip(text: &str, sample_rate: u32) -> Vec<String> {
    let config = ModemConfig {
        sample_rate,
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("message.wav");

    let samples = render_text(text, &config, sample_rate);
    write_wav(&path, &samples, sample_rate).unwrap();

    let audio = read_wav(&path).unwrap();
    assert_eq!(audio.sample_rate, sample_rate);
    assert_eq!(audio.samples.len(), samples.len());

    let events = decode_offline(audio.samples, audio.sample_rate, &config).unwrap();
    decoded_texts(&events)
}

#[test]
fn test_wav_round_trip_48k() {
    assert_eq!(round_trip("Hello, World", 48000), vec!["Hello, World"]);
}

#[test]
fn test_wav_round_trip_44k() {
    assert_eq!(round_trip("Über", 44100), vec!["Über"]);
}

#[test]
fn test_wav_duration_matches_frame() {
    let config = ModemConfig::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.wav");

    // 8 preamble + 24 payload + 8 terminator, plus 2 + 2 bits of silence
    let samples = render_text("abc", &config, 48000);
    write_wav(&path, &samples, 48000).unwrap();

    let audio = read_wav(&path).unwrap();
    approx::assert_relative_eq!(audio.duration_secs(), 44.0 * 0.04, epsilon = 1e-9);
}

#[test]
fn test_decode_ignores_sample_rate_in_config() {
    // The file's own rate wins over the configured one
    let config = ModemConfig::default();
    let samples = render_text("Über", &ModemConfig::default(), 44100);
    let events = decode_offline(samples, 44100, &config).unwrap();
    assert_eq!(decoded_texts(&events), vec!["Über"]);
}
