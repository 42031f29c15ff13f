//! Typed events and a fan-out event bus
//!
//! Any number of consumers (UI, logger, tests) can subscribe; each gets its
//! own bounded crossbeam receiver. Publishing never blocks: a subscriber whose
//! queue is full misses the event, a dropped subscriber is pruned. Missed
//! telemetry is traced; any other missed event is logged as a warning.

use crate::protocol::framing::Bit;
use crate::receiver::pipeline::DetectorState;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Queue depth per subscriber
const SUBSCRIBER_CAPACITY: usize = 1024;

/// Bit-level receive event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitEvent {
    /// A payload bit admitted while receiving
    Bit(Bit),
    /// The preamble matched; a frame starts
    Sync,
}

/// Events published by the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum ModemEvent {
    BitDetected(BitEvent),
    /// A complete frame was decoded
    DataDecoded {
        text: String,
        /// Payload bytes were not valid UTF-8
        lossy: bool,
    },
    /// Per-tick signal summary
    SignalStats {
        /// Carrier of the detected bit, `None` without a usable signal
        peak_freq: Option<f32>,
        /// Strength on a 0..=100 scale
        strength_percent: f32,
    },
    CalibrationComplete {
        noise_floor: f32,
    },
    StateChanged(DetectorState),
    /// A frame stopped receiving bits for longer than the configured timeout
    FrameAbandoned {
        bits: usize,
    },
}

/// Events published by the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    /// A tone burst was scheduled; `remaining` bursts are still to be scheduled
    BitSent { bit: Bit, remaining: usize },
    /// The last burst of the frame has been scheduled
    Complete,
    /// `stop()` cancelled the transmission before completion
    Cancelled,
}

/// Classification used when a subscriber misses an event
pub trait BusEvent: Clone + std::fmt::Debug {
    /// High-rate measurement a lagging subscriber can miss without losing state
    fn is_telemetry(&self) -> bool {
        false
    }
}

impl BusEvent for ModemEvent {
    fn is_telemetry(&self) -> bool {
        matches!(self, ModemEvent::SignalStats { .. })
    }
}

impl BusEvent for TxEvent {}

impl BusEvent for BitEvent {}

/// Fan-out publisher for cloneable events
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<Sender<E>>,
    dropped: u64,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            dropped: 0,
        }
    }

    /// Register a new consumer
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber without blocking
    pub fn publish(&mut self, event: E) {
        let mut dropped = 0;
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        if dropped > 0 {
            self.dropped += dropped;
            if event.is_telemetry() {
                tracing::trace!("Subscriber queue full, dropping {:?}", event);
            } else {
                tracing::warn!(
                    "{} subscriber(s) lagging, dropped {:?} ({} events dropped in total)",
                    dropped,
                    event,
                    self.dropped
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliveries missed because a subscriber queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
