//! Audio processing module
//!
//! This module contains the audio-side collaborators of the modem:
//! - FFT magnitude analyser producing byte spectra ([`analyser`])
//! - Input/output device traits and enumeration ([`device`])
//! - Microphone capture and offline sample sources ([`input`])
//! - Sample-clock tone scheduling and playback ([`output`])
//! - Tone-burst transmitter ([`modulator`])
//! - WAV file import/export ([`wav`])

pub mod analyser;
pub mod device;
pub mod input;
pub mod modulator;
pub mod output;
pub mod wav;
