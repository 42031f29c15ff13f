//! Tone-burst transmitter
//!
//! `transmit` frames the payload and hands it to a pacer thread that
//! schedules one burst per bit on the output's own clock, a short lookahead
//! ahead of playback. Burst start times are computed from the clock origin
//! of the transmission, never from the pacer's wake-ups, so bursts stay
//! contiguous however late the thread runs.

use crate::audio::device::AudioOutput;
use crate::audio::output::ToneMixer;
use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use crate::events::{EventBus, TxEvent};
use crate::protocol::framing::{Bit, BitFramer};
use crate::protocol::tone::CarrierPlan;
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Silence before the first burst, in bit periods
pub const LEAD_IN_BITS: usize = 2;

/// Silence after the last burst when rendering offline, in bit periods
pub const TAIL_BITS: usize = 2;

/// How often the pacer re-reads the output clock
const PACER_POLL: Duration = Duration::from_millis(2);

type SharedOutput = Arc<Mutex<Box<dyn AudioOutput>>>;

struct TxShared {
    bus: EventBus<TxEvent>,
    active: bool,
    /// Output time at which the last scheduled burst ends
    end_time: f64,
}

/// Binary FSK transmitter driving an [`AudioOutput`]
pub struct Modulator {
    config: ModemConfig,
    output: SharedOutput,
    shared: Arc<Mutex<TxShared>>,
    thread: Option<JoinHandle<()>>,
}

impl Modulator {
    pub fn new(output: impl AudioOutput + 'static, config: &ModemConfig) -> Self {
        Self {
            config: config.clone(),
            output: Arc::new(Mutex::new(Box::new(output))),
            shared: Arc::new(Mutex::new(TxShared {
                bus: EventBus::new(),
                active: false,
                end_time: 0.0,
            })),
            thread: None,
        }
    }

    /// Register a consumer of [`TxEvent`]s
    pub fn subscribe(&self) -> Receiver<TxEvent> {
        lock(&self.shared).bus.subscribe()
    }

    pub fn is_transmitting(&self) -> bool {
        lock(&self.shared).active
    }

    /// Current output clock (s)
    pub fn output_time(&self) -> f64 {
        lock(&self.output).current_time()
    }

    /// Output time at which the most recent transmission finishes playing
    pub fn end_time(&self) -> f64 {
        lock(&self.shared).end_time
    }

    /// Frame `payload` and start transmitting it
    ///
    /// Returns immediately; progress is reported as [`TxEvent`]s. The first
    /// burst starts [`LEAD_IN_BITS`] bit periods after the current output time.
    pub fn transmit(&mut self, payload: &[Bit]) -> Result<()> {
        if lock(&self.shared).active {
            return Err(ModemError::Busy("transmission"));
        }
        self.join_pacer();

        let framed = BitFramer::frame(payload);
        let bit_secs = self.config.bit_duration().as_secs_f64();
        let origin = lock(&self.output).current_time() + LEAD_IN_BITS as f64 * bit_secs;

        {
            let mut shared = lock(&self.shared);
            shared.active = true;
            shared.end_time = origin + framed.len() as f64 * bit_secs;
        }

        tracing::info!(
            payload_bits = payload.len(),
            framed_bits = framed.len(),
            origin,
            "Transmission started"
        );

        let pacer = Pacer {
            framed,
            origin,
            bit_secs,
            lookahead: self.config.lookahead().as_secs_f64(),
            plan: self.config.carrier_plan(),
            output: Arc::clone(&self.output),
            shared: Arc::clone(&self.shared),
        };

        let spawned = std::thread::Builder::new()
            .name("fsk-modulator".into())
            .spawn(move || pacer.run());

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                lock(&self.shared).active = false;
                Err(e.into())
            }
        }
    }

    /// Transmit UTF-8 text
    pub fn transmit_text(&mut self, text: &str) -> Result<()> {
        self.transmit(&BitFramer::text_to_bits(text))
    }

    /// Cancel the current transmission
    ///
    /// Bursts that have not started playing are dropped. Once this returns no
    /// further `BitSent`/`Complete` events are published; a `Cancelled` event
    /// is published if a transmission was actually interrupted. Calling it
    /// while idle is a no-op.
    pub fn stop(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.active {
                shared.active = false;
                let mut output = lock(&self.output);
                let now = output.current_time();
                output.cancel_after(now);
                shared.end_time = now;
                shared.bus.publish(TxEvent::Cancelled);
                tracing::info!("Transmission cancelled");
            }
        }
        self.join_pacer();
    }

    fn join_pacer(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("Modulator pacer thread panicked");
            }
        }
    }
}

impl Drop for Modulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the pacer thread
struct Pacer {
    framed: Vec<Bit>,
    origin: f64,
    bit_secs: f64,
    lookahead: f64,
    plan: CarrierPlan,
    output: SharedOutput,
    shared: Arc<Mutex<TxShared>>,
}

impl Pacer {
    fn run(self) {
        let total = self.framed.len();

        for (i, &bit) in self.framed.iter().enumerate() {
            let start = self.origin + i as f64 * self.bit_secs;

            // Wait until the burst enters the scheduling horizon
            loop {
                if !lock(&self.shared).active {
                    return;
                }
                let now = lock(&self.output).current_time();
                if start - now <= self.lookahead + 1e-9 {
                    break;
                }
                std::thread::sleep(PACER_POLL);
            }

            // Checked and published under the same lock `stop` takes
            let mut shared = lock(&self.shared);
            if !shared.active {
                return;
            }
            lock(&self.output).schedule_tone(self.plan.frequency_for_bit(bit), start, self.bit_secs);
            let remaining = total - i - 1;
            shared.bus.publish(TxEvent::BitSent { bit, remaining });
            tracing::trace!(%bit, remaining, start, "Burst scheduled");
        }

        let mut shared = lock(&self.shared);
        if shared.active {
            shared.active = false;
            shared.bus.publish(TxEvent::Complete);
            tracing::info!(bits = total, "Transmission scheduled");
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render already framed bits to mono samples
///
/// Output starts with [`LEAD_IN_BITS`] and ends with [`TAIL_BITS`] bit periods
/// of silence; every burst starts on a bit boundary.
pub fn render_bits(framed: &[Bit], config: &ModemConfig, sample_rate: u32) -> Vec<f32> {
    let bit_frames = config.bit_frames(sample_rate) as u64;
    let plan = config.carrier_plan();
    let mut mixer = ToneMixer::new(sample_rate, config.amplitude);

    for (i, &bit) in framed.iter().enumerate() {
        let start = (LEAD_IN_BITS as u64 + i as u64) * bit_frames;
        mixer.schedule(plan.frequency_for_bit(bit), start, bit_frames);
    }

    let total_bits = LEAD_IN_BITS + framed.len() + TAIL_BITS;
    let mut samples = vec![0.0; total_bits * bit_frames as usize];
    mixer.render_into(0, &mut samples, 1);
    samples
}

/// Frame and render UTF-8 text
pub fn render_text(text: &str, config: &ModemConfig, sample_rate: u32) -> Vec<f32> {
    let framed = BitFramer::frame(&BitFramer::text_to_bits(text));
    render_bits(&framed, config, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::OfflineOutput;

    const WAIT: Duration = Duration::from_secs(5);

    fn bits(pattern: &str) -> Vec<Bit> {
        pattern
            .chars()
            .map(|c| if c == '1' { Bit::One } else { Bit::Zero })
            .collect()
    }

    /// Render until the pacer reports completion, collecting every event
    fn drive_to_completion(output: &OfflineOutput, events: &Receiver<TxEvent>) -> Vec<TxEvent> {
        let mut seen = Vec::new();
        loop {
            while let Ok(event) = events.try_recv() {
                seen.push(event);
            }
            if seen.last() == Some(&TxEvent::Complete) {
                return seen;
            }
            output.render(480);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_transmit_reports_every_framed_bit() {
        let config = ModemConfig::default();
        let output = OfflineOutput::new(48000, 0.5);
        let mut modulator = Modulator::new(output.clone(), &config);
        let events = modulator.subscribe();

        modulator.transmit(&bits("0110")).unwrap();
        let seen = drive_to_completion(&output, &events);

        let sent: Vec<(Bit, usize)> = seen
            .iter()
            .filter_map(|e| match e {
                TxEvent::BitSent { bit, remaining } => Some((*bit, *remaining)),
                _ => None,
            })
            .collect();

        let framed = BitFramer::frame(&bits("0110"));
        assert_eq!(sent.len(), framed.len());
        for (i, (bit, remaining)) in sent.iter().enumerate() {
            assert_eq!(*bit, framed[i]);
            assert_eq!(*remaining, framed.len() - i - 1);
        }
        assert!(!modulator.is_transmitting());
        approx::assert_relative_eq!(modulator.end_time(), 0.08 + 20.0 * 0.04, epsilon = 1e-9);
    }

    #[test]
    fn test_transmit_while_busy() {
        let config = ModemConfig::default();
        let output = OfflineOutput::new(48000, 0.5);
        let mut modulator = Modulator::new(output, &config);

        modulator.transmit_text("Hello").unwrap();
        assert!(modulator.is_transmitting());
        assert!(matches!(
            modulator.transmit_text("again"),
            Err(ModemError::Busy(_))
        ));
        modulator.stop();
        assert!(!modulator.is_transmitting());
    }

    #[test]
    fn test_stop_cancels_pending_bursts() {
        let config = ModemConfig::default();
        let output = OfflineOutput::new(48000, 0.5);
        let mut modulator = Modulator::new(output.clone(), &config);
        let events = modulator.subscribe();

        modulator.transmit_text("Hello, World").unwrap();
        let first = events.recv_timeout(WAIT).unwrap();
        assert!(matches!(first, TxEvent::BitSent { .. }));

        modulator.stop();
        // Bursts published before stop may still be queued, then Cancelled
        let rest: Vec<TxEvent> = events.try_iter().collect();
        assert_eq!(rest.last(), Some(&TxEvent::Cancelled));
        assert_eq!(output.pending(), 0);

        // Nothing after stop, even if playback continues
        output.render(48000);
        std::thread::sleep(Duration::from_millis(20));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let config = ModemConfig::default();
        let mut modulator = Modulator::new(OfflineOutput::new(48000, 0.5), &config);
        let events = modulator.subscribe();

        modulator.stop();
        modulator.stop();
        assert!(events.try_recv().is_err());

        modulator.transmit_text("Hi").unwrap();
        modulator.stop();
        modulator.stop();
        let cancelled = events
            .try_iter()
            .filter(|e| *e == TxEvent::Cancelled)
            .count();
        assert_eq!(cancelled, 1);
    }

    #[test]
    fn test_can_transmit_again_after_completion() {
        let config = ModemConfig::default();
        let output = OfflineOutput::new(48000, 0.5);
        let mut modulator = Modulator::new(output.clone(), &config);
        let events = modulator.subscribe();

        modulator.transmit(&[]).unwrap();
        drive_to_completion(&output, &events);
        modulator.transmit(&[]).unwrap();
        let seen = drive_to_completion(&output, &events);
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, TxEvent::BitSent { .. }))
                .count(),
            16
        );
    }

    #[test]
    fn test_render_bits_layout() {
        let config = ModemConfig::default();
        let framed = bits("10");
        let samples = render_bits(&framed, &config, 48000);

        assert_eq!(samples.len(), (LEAD_IN_BITS + 2 + TAIL_BITS) * 1920);
        assert!(samples[..2 * 1920].iter().all(|&s| s == 0.0));
        assert!(samples[4 * 1920..].iter().all(|&s| s == 0.0));
        let body = samples[2 * 1920..4 * 1920]
            .iter()
            .map(|s| s.abs())
            .fold(0.0, f32::max);
        assert!(body > 0.45);
    }

    #[test]
    fn test_render_text_frames_payload() {
        let config = ModemConfig::default();
        let samples = render_text("A", &config, 48000);
        // 8 preamble + 8 payload + 8 terminator
        assert_eq!(samples.len(), (LEAD_IN_BITS + 24 + TAIL_BITS) * 1920);
    }
}
