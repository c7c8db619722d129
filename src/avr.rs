//! ATmega32U4 backend: Timer0 as the pulse timer, cycle-counted delays, GPIO
//! through the PINx/DDRx/PORTx registers, and the compare-match handler that
//! feeds [`SAMPLER`].
//!
//! Timer0 is taken over completely, so anything else that relies on it
//! (a `millis` counter, for instance) must move to another timer.

mod delay;
mod interrupts;
mod pin;
mod timer0;

pub use delay::AsmDelay;
pub use interrupts::{Atmega32u4Interrupts, MaskedSources};
pub use pin::{AvrPin, PORT_B, PORT_C, PORT_D, PORT_E, PORT_F};
pub use timer0::Timer0;

use crate::config::Config;
use crate::sampler::Sampler;
use crate::timing::DshotSpeed;

/// The accumulator written by the Timer0 compare-match handler.
pub static SAMPLER: Sampler = Sampler::new();

/// Cycles from handler entry to the pin read: the compiled prologue saves
/// the registers `on_compare_match` clobbers before the read.
pub const COMPARE_HANDLER_TICKS: u32 = 18;

/// 16 MHz ATmega32U4 (Arduino Leonardo, Pro Micro) with the compiled handler.
///
/// At DSHOT300 the handler prologue leaves too narrow a window to sample a
/// skewed reply once per bit, so this runs DSHOT150.
pub struct Atmega32u4;

impl Config for Atmega32u4 {
    const CPU_HZ: u32 = 16_000_000;
    const SPEED: DshotSpeed = DshotSpeed::DShot150;
    const SAMPLE_HANDLER_TICKS: u32 = COMPARE_HANDLER_TICKS;
}

/// A bidirectional driver wired to Timer0 and [`SAMPLER`].
pub type Atmega32u4Bidir<const PIN: u8, const BIT: u8, C = Atmega32u4> = crate::bitbang::BidirDshot<
    'static,
    C,
    AvrPin<PIN, BIT>,
    Timer0,
    AsmDelay,
    Atmega32u4Interrupts,
>;
