//! Terminator-delimited payload accumulation

use crate::protocol::framing::{Bit, BitSequence, TERMINATOR};

/// Payload length (bits) that must be exceeded before a terminator is accepted
pub const MIN_FRAME_BITS: usize = 24;

/// Accumulates payload bits after sync until the terminator appears
///
/// The check runs after every bit: once the buffer holds more than
/// [`MIN_FRAME_BITS`] bits and ends in eight ones, the buffer minus those
/// eight bits is the payload. A payload containing its own run of eight ones,
/// or whose last byte ends in ones, is cut short; nothing here can tell those
/// apart from the real terminator.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    buffer: BitSequence,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bit; returns the payload when the frame completes
    pub fn push(&mut self, bit: Bit) -> Option<BitSequence> {
        self.buffer.push(bit);
        if self.buffer.len() > MIN_FRAME_BITS && self.buffer.ends_with(&TERMINATOR) {
            let mut payload = std::mem::take(&mut self.buffer);
            payload.truncate(payload.len() - TERMINATOR.len());
            return Some(payload);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bits(&self) -> &[Bit] {
        &self.buffer
    }

    /// Discard any partial payload
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
