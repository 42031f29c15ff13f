//! Carrier frequencies shared by transmitter and receiver
//!
//! Both ends must agree on these out of band; nothing is negotiated on the wire.

use super::framing::Bit;
use serde::{Deserialize, Serialize};

/// Tone transmitted for a bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneSymbol {
    Zero,
    One,
}

impl From<Bit> for ToneSymbol {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => ToneSymbol::Zero,
            Bit::One => ToneSymbol::One,
        }
    }
}

impl From<ToneSymbol> for Bit {
    fn from(symbol: ToneSymbol) -> Self {
        match symbol {
            ToneSymbol::Zero => Bit::Zero,
            ToneSymbol::One => Bit::One,
        }
    }
}

/// Binary FSK carrier plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierPlan {
    /// Carrier for a 0 bit (Hz)
    pub zero_hz: f32,
    /// Carrier for a 1 bit (Hz)
    pub one_hz: f32,
    /// Detection window half-width (Hz)
    pub tolerance_hz: f32,
}

impl CarrierPlan {
    pub fn frequency(&self, symbol: ToneSymbol) -> f32 {
        match symbol {
            ToneSymbol::Zero => self.zero_hz,
            ToneSymbol::One => self.one_hz,
        }
    }

    pub fn frequency_for_bit(&self, bit: Bit) -> f32 {
        self.frequency(ToneSymbol::from(bit))
    }

    /// Distance between the two carriers (Hz)
    pub fn separation(&self) -> f32 {
        (self.one_hz - self.zero_hz).abs()
    }
}

impl Default for CarrierPlan {
    fn default() -> Self {
        Self {
            zero_hz: crate::FREQ_ZERO_HZ,
            one_hz: crate::FREQ_ONE_HZ,
            tolerance_hz: crate::TOLERANCE_HZ,
        }
    }
}
