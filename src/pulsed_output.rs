//! Pulse-width encoder: every bit is an on pulse whose width carries the value,
//! followed by an off period.

use core::marker::PhantomData;

use embedded_hal::digital::OutputPin;

use crate::config::{Checked, Config};
use crate::timing::PulseMath;
use crate::traits::CycleDelay;

/// Drives one pin with the timing from `C`.
///
/// `INVERTED` swaps the active level: bidirectional `DShot` idles high and
/// pulses low.
pub struct PulsedOutput<C, const INVERTED: bool> {
    _config: PhantomData<C>,
}

impl<C: Config, const INVERTED: bool> PulsedOutput<C, INVERTED> {
    const DELAY_A: u32 = PulseMath::cycles(Checked::<C>::PULSES.delay_a);
    const DELAY_B: u32 = PulseMath::cycles(Checked::<C>::PULSES.delay_b);
    const DELAY_C: u32 = PulseMath::cycles(Checked::<C>::PULSES.delay_c);
    const DELAY_D: u32 = PulseMath::cycles(Checked::<C>::PULSES.delay_d);

    #[inline(always)]
    fn on<P: OutputPin>(pin: &mut P) -> Result<(), P::Error> {
        if INVERTED {
            pin.set_low()
        } else {
            pin.set_high()
        }
    }

    /// Put the line at its idle level.
    #[inline(always)]
    pub fn off<P: OutputPin>(pin: &mut P) -> Result<(), P::Error> {
        if INVERTED {
            pin.set_high()
        } else {
            pin.set_low()
        }
    }

    /// Send the first `bits` bits of `byte`, most significant first unless
    /// `C::LITTLE_ENDIAN`.
    ///
    /// The caller keeps interrupts away for the duration.
    ///
    /// # Errors
    ///
    /// Propagates the first pin error; the line may be left mid-pulse.
    pub fn send_byte<P: OutputPin, D: CycleDelay>(
        pin: &mut P,
        delay: &mut D,
        mut byte: u8,
        bits: u8,
    ) -> Result<(), P::Error> {
        for _ in 0..bits.min(8) {
            let bit = if C::LITTLE_ENDIAN {
                let bit = byte & 0x01 != 0;
                byte >>= 1;
                bit
            } else {
                let bit = byte & 0x80 != 0;
                byte <<= 1;
                bit
            };

            Self::on(pin)?;
            delay.delay_cycles(Self::DELAY_A);
            if bit {
                delay.delay_cycles(Self::DELAY_B);
                Self::off(pin)?;
            } else {
                Self::off(pin)?;
                if C::BALANCE_RECOVERY {
                    delay.delay_cycles(Self::DELAY_D);
                }
            }
            delay.delay_cycles(Self::DELAY_C);
        }
        Ok(())
    }

    /// Send `bits` bits from `bytes`, byte by byte, and leave the line idle.
    ///
    /// # Errors
    ///
    /// Propagates the first pin error.
    pub fn send<P: OutputPin, D: CycleDelay>(
        pin: &mut P,
        delay: &mut D,
        bytes: &[u8],
        bits: usize,
    ) -> Result<(), P::Error> {
        let mut remaining = bits.min(bytes.len() * 8);
        for &byte in bytes {
            if remaining == 0 {
                break;
            }
            let chunk = remaining.min(8);
            Self::send_byte(pin, delay, byte, chunk as u8)?;
            remaining -= chunk;
        }
        Self::off(pin)
    }
}
