//! Wire protocol
//!
//! - Bit framing, preamble and terminator ([`framing`])
//! - Carrier frequencies and tone symbols ([`tone`])

pub mod framing;
pub mod tone;
