mod bidirectional;
mod unidirectional;

pub use bidirectional::BidirDshot;
pub use unidirectional::Dshot;

/// Bits in a command frame.
pub const FRAME_BITS: usize = 16;
