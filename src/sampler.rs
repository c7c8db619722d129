//! State shared between the receive loop and the compare-match handler.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::gcr::RESPONSE_BITS;

/// Preloaded so it carries out of the top byte on the last expected shift.
pub const FINISHED_MARKER: u32 = 1 << (24 - RESPONSE_BITS);

/// A 24-bit shift register filled from the low end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitAccumulator {
    bytes: [u8; 3],
}

impl BitAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self::from_bytes([FINISHED_MARKER as u8, (FINISHED_MARKER >> 8) as u8, (FINISHED_MARKER >> 16) as u8])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self { bytes }
    }

    /// Shift `bit` in. Returns the bit that fell out of the top, which is set
    /// exactly when the last expected bit arrived.
    pub fn push(&mut self, bit: bool) -> bool {
        let [b0, b1, b2] = self.bytes;
        self.bytes = [(b0 << 1) | u8::from(bit), (b1 << 1) | (b0 >> 7), (b2 << 1) | (b1 >> 7)];
        b2 & 0x80 != 0
    }

    /// Least significant byte first.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 3] {
        self.bytes
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], 0])
    }
}

impl Default for BitAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

const IDLE: u8 = 0;
const ARMED: u8 = 1;
const DONE: u8 = 2;

/// Accumulator plus completion flag, placed in a `static` so the interrupt
/// handler can reach it.
///
/// Only the handler writes while armed; the foreground reads only after
/// [`is_done`](Self::is_done). Plain loads and stores are enough, which keeps
/// this usable on cores without compare-and-swap.
pub struct Sampler {
    bytes: [AtomicU8; 3],
    phase: AtomicU8,
}

impl Sampler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0)],
            phase: AtomicU8::new(IDLE),
        }
    }

    /// Reset the accumulator and start accepting samples.
    pub fn arm(&self) {
        let fresh = BitAccumulator::new().bytes();
        for (slot, byte) in self.bytes.iter().zip(fresh) {
            slot.store(byte, Ordering::Relaxed);
        }
        self.phase.store(ARMED, Ordering::Release);
    }

    /// Body of the compare-match handler. A match that arrives while not armed
    /// is ignored. Returns true on the sample that completes the reply.
    pub fn on_compare_match(&self, level: bool) -> bool {
        if self.phase.load(Ordering::Acquire) != ARMED {
            return false;
        }
        let mut acc = BitAccumulator::from_bytes([
            self.bytes[0].load(Ordering::Relaxed),
            self.bytes[1].load(Ordering::Relaxed),
            self.bytes[2].load(Ordering::Relaxed),
        ]);
        let finished = acc.push(level);
        for (slot, byte) in self.bytes.iter().zip(acc.bytes()) {
            slot.store(byte, Ordering::Relaxed);
        }
        if finished {
            self.phase.store(DONE, Ordering::Release);
        }
        finished
    }

    pub fn is_armed(&self) -> bool {
        self.phase.load(Ordering::Acquire) == ARMED
    }

    pub fn is_done(&self) -> bool {
        self.phase.load(Ordering::Acquire) == DONE
    }

    /// Stop accepting samples and hand back what was collected.
    pub fn finish(&self) -> [u8; 3] {
        self.phase.store(IDLE, Ordering::Release);
        [
            self.bytes[0].load(Ordering::Relaxed),
            self.bytes[1].load(Ordering::Relaxed),
            self.bytes[2].load(Ordering::Relaxed),
        ]
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_carries_out_after_twenty_bits() {
        let mut acc = BitAccumulator::new();
        assert_eq!(acc.value(), 0x10);
        for i in 0..RESPONSE_BITS {
            let carry = acc.push(i % 3 == 0);
            assert_eq!(carry, i == RESPONSE_BITS - 1, "bit {i}");
        }
    }

    #[test]
    fn bits_land_msb_first() {
        let mut acc = BitAccumulator::new();
        let raw: u32 = 0b1011_0011_1000_1111_0101;
        for i in (0..RESPONSE_BITS).rev() {
            acc.push((raw >> i) & 1 != 0);
        }
        assert_eq!(acc.value(), raw);
    }

    #[test]
    fn sampler_completes_once() {
        let sampler = Sampler::new();
        assert!(!sampler.on_compare_match(true), "ignored while idle");

        sampler.arm();
        assert!(sampler.is_armed());
        for i in 0..RESPONSE_BITS {
            let done = sampler.on_compare_match(true);
            assert_eq!(done, i == RESPONSE_BITS - 1);
        }
        assert!(sampler.is_done());

        // A late match must not disturb the finished reply.
        assert!(!sampler.on_compare_match(false));
        assert_eq!(sampler.finish(), [0xFF, 0xFF, 0x0F]);
        assert!(!sampler.is_done());
        assert!(!sampler.is_armed());
    }

    #[test]
    fn arm_discards_a_partial_reply() {
        let sampler = Sampler::new();
        sampler.arm();
        for _ in 0..7 {
            sampler.on_compare_match(true);
        }
        sampler.arm();
        assert_eq!(sampler.finish(), BitAccumulator::new().bytes());
    }
}
