//! Decoding of the 20-bit telemetry reply.
//!
//! The ESC sends four nibbles (three data, one checksum), each GCR-mapped to a
//! 5-bit symbol, then shift-encoded so that a transition on the line marks a 1.

use crate::types::{Response, ResponseError};

/// Bits per GCR symbol.
pub const SYMBOL_BITS: u32 = 5;
/// Nibbles in a reply, checksum included.
pub const NIBBLES: u32 = 4;
/// Data bits after the start bit.
pub const RESPONSE_BITS: u32 = SYMBOL_BITS * NIBBLES;
/// What [`decode`] returns for a symbol outside the code.
pub const INVALID: u8 = 0xFF;

const SYMBOL_MASK: u32 = (1 << SYMBOL_BITS) - 1;
const RESPONSE_MASK: u32 = (1 << RESPONSE_BITS) - 1;

/// Map a 5-bit GCR symbol to its nibble, or [`INVALID`].
#[must_use]
pub const fn decode(symbol: u8) -> u8 {
    match symbol & SYMBOL_MASK as u8 {
        0b11001 => 0x0,
        0b11011 => 0x1,
        0b10010 => 0x2,
        0b10011 => 0x3,
        0b11101 => 0x4,
        0b10101 => 0x5,
        0b10110 => 0x6,
        0b10111 => 0x7,
        0b11010 => 0x8,
        0b01001 => 0x9,
        0b01010 => 0xA,
        0b01011 => 0xB,
        0b11110 => 0xC,
        0b01101 => 0xD,
        0b01110 => 0xE,
        0b01111 => 0xF,
        _ => INVALID,
    }
}

/// Undo the shift encoding: each bit becomes the XOR with its predecessor.
///
/// The bit above the first received one is taken as 0.
#[must_use]
pub const fn unshift(raw: u32) -> u32 {
    let raw = raw & RESPONSE_MASK;
    raw ^ (raw >> 1)
}

/// Split 20 GCR bits into symbols, index 3 being the first received.
#[must_use]
pub const fn symbols(gcr: u32) -> [u8; NIBBLES as usize] {
    [
        (gcr & SYMBOL_MASK) as u8,
        ((gcr >> SYMBOL_BITS) & SYMBOL_MASK) as u8,
        ((gcr >> (2 * SYMBOL_BITS)) & SYMBOL_MASK) as u8,
        ((gcr >> (3 * SYMBOL_BITS)) & SYMBOL_MASK) as u8,
    ]
}

#[must_use]
pub const fn checksum_ok(n3: u8, n2: u8, n1: u8, n0: u8) -> bool {
    (0x0F ^ n3 ^ n2 ^ n1 ^ n0) & 0x0F == 0
}

/// Decode the 20 sampled bits, first received bit in bit 19.
///
/// Symbols are checked most significant first, so a reply with several bad
/// symbols reports the earliest one.
#[must_use]
pub const fn decode_response(raw: u32) -> Response {
    let s = symbols(unshift(raw));
    let mut n = [0u8; NIBBLES as usize];
    let mut i = NIBBLES as usize;
    while i > 0 {
        i -= 1;
        n[i] = decode(s[i]);
        if n[i] == INVALID {
            return Response::from_error(ResponseError::bad_nibble(i as u8));
        }
    }
    if !checksum_ok(n[3], n[2], n[1], n[0]) {
        return Response::from_error(ResponseError::BadChecksum);
    }
    Response::from_nibbles(n[3], n[2], n[1])
}

/// Decode the sampler's accumulator bytes (least significant first).
#[must_use]
pub const fn decode_accumulator(bytes: [u8; 3]) -> Response {
    decode_response(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
}
