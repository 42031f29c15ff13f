//! Text/bit conversion and frame assembly
//!
//! A frame on the wire is:
//!
//! ```text
//! 10101010 | payload (UTF-8 bytes, MSB first) | 11111111
//! preamble                                     terminator
//! ```
//!
//! There is no length prefix and no checksum; the receiver finds the end of a
//! frame solely by the terminator pattern.

use std::fmt;

/// Number of bits per byte on the wire
pub const BITS_PER_BYTE: usize = 8;

/// Synchronization pattern sent before every payload
pub const PREAMBLE: [Bit; 8] = [
    Bit::One,
    Bit::Zero,
    Bit::One,
    Bit::Zero,
    Bit::One,
    Bit::Zero,
    Bit::One,
    Bit::Zero,
];

/// End-of-payload marker
pub const TERMINATOR: [Bit; 8] = [Bit::One; 8];

/// A single transmitted bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// Numeric value (0 or 1)
    pub fn as_u8(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    /// Parse a numeric bit; anything other than 0 or 1 is rejected
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Bit::Zero),
            1 => Some(Bit::One),
            _ => None,
        }
    }

    pub fn is_one(self) -> bool {
        self == Bit::One
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Ordered bits in transmission order
pub type BitSequence = Vec<Bit>;

/// Result of decoding a bit buffer as UTF-8 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Recovered text (best effort when `lossy` is set)
    pub text: String,
    /// True when the bytes were not valid UTF-8 and replacement characters were used
    pub lossy: bool,
}

/// Converts between text and framed bit sequences
pub struct BitFramer;

impl BitFramer {
    /// UTF-8 encode `text`, 8 bits per byte, most significant bit first
    pub fn text_to_bits(text: &str) -> BitSequence {
        Self::bytes_to_bits(text.as_bytes())
    }

    pub fn bytes_to_bits(bytes: &[u8]) -> BitSequence {
        let mut bits = Vec::with_capacity(bytes.len() * BITS_PER_BYTE);
        for &byte in bytes {
            for shift in (0..BITS_PER_BYTE).rev() {
                bits.push(Bit::from((byte >> shift) & 1 == 1));
            }
        }
        bits
    }

    /// Group bits into bytes, MSB first. Trailing bits that do not fill a byte are dropped.
    pub fn bits_to_bytes(bits: &[Bit]) -> Vec<u8> {
        bits.chunks_exact(BITS_PER_BYTE)
            .map(|chunk| {
                chunk
                    .iter()
                    .fold(0u8, |acc, &bit| (acc << 1) | bit.as_u8())
            })
            .collect()
    }

    /// Decode bits as UTF-8, reporting whether the result is lossy
    pub fn decode_bits(bits: &[Bit]) -> DecodedText {
        let bytes = Self::bits_to_bytes(bits);
        match String::from_utf8(bytes) {
            Ok(text) => DecodedText { text, lossy: false },
            Err(err) => {
                tracing::warn!(
                    valid_up_to = err.utf8_error().valid_up_to(),
                    len = err.as_bytes().len(),
                    "Payload is not valid UTF-8, decoding lossily"
                );
                DecodedText {
                    text: String::from_utf8_lossy(err.as_bytes()).into_owned(),
                    lossy: true,
                }
            }
        }
    }

    /// Decode bits as UTF-8 text; malformed input yields a best-effort string
    pub fn bits_to_text(bits: &[Bit]) -> String {
        Self::decode_bits(bits).text
    }

    /// Prepend the preamble and append the terminator
    pub fn frame(payload: &[Bit]) -> BitSequence {
        let mut framed = Vec::with_capacity(PREAMBLE.len() + payload.len() + TERMINATOR.len());
        framed.extend_from_slice(&PREAMBLE);
        framed.extend_from_slice(payload);
        framed.extend_from_slice(&TERMINATOR);
        framed
    }

    /// Strip preamble and terminator from a complete frame
    ///
    /// Returns `None` if either marker is missing.
    pub fn unframe(framed: &[Bit]) -> Option<&[Bit]> {
        let body = framed.strip_prefix(&PREAMBLE[..])?;
        body.strip_suffix(&TERMINATOR[..])
    }

    /// Human readable bits, grouped per byte
    ///
    /// ```
    /// use fskmodem_core::protocol::framing::BitFramer;
    ///
    /// let bits = BitFramer::text_to_bits("A");
    /// assert_eq!(BitFramer::format_bits(&bits), "01000001");
    /// ```
    pub fn format_bits(bits: &[Bit]) -> String {
        bits.chunks(BITS_PER_BYTE)
            .map(|chunk| chunk.iter().map(|b| b.to_string()).collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
