use avr_device::atmega32u4::TC0;

use super::{pin, SAMPLER};
use crate::traits::PulseTimer;

/// Which TIFR0 bit marks the end of the current wait.
#[derive(Clone, Copy)]
enum Flag {
    Overflow,
    CompareA,
}

/// Timer0 at prescaler 1.
///
/// Holds the PAC's `TC0`, so nothing else can touch the timer while the
/// driver owns it.
pub struct Timer0 {
    tc0: TC0,
    flag: Flag,
}

impl Timer0 {
    pub fn new(tc0: TC0) -> Self {
        Self {
            tc0,
            flag: Flag::Overflow,
        }
    }

    pub fn free(self) -> TC0 {
        self.tc0
    }
}

impl PulseTimer for Timer0 {
    fn init(&mut self, top: u8) {
        self.tc0.tccr0b.write(|w| w.cs0().no_clock());
        self.tc0.tccr0a.write(|w| w.wgm0().normal_top());
        self.tc0.ocr0a.write(|w| w.bits(top));
        self.disable_interrupt();
    }

    #[inline(always)]
    fn set_counter(&mut self, value: u8) {
        self.tc0.tcnt0.write(|w| w.bits(value));
    }

    #[inline(always)]
    fn set_max_timeout(&mut self) {
        self.tc0.tccr0a.write(|w| w.wgm0().normal_top());
        self.flag = Flag::Overflow;
    }

    #[inline(always)]
    fn set_short_timeout(&mut self) {
        self.tc0.tccr0a.write(|w| w.wgm0().ctc());
        self.flag = Flag::CompareA;
    }

    #[inline(always)]
    fn start(&mut self) {
        self.tc0.tccr0b.write(|w| w.cs0().direct());
    }

    #[inline(always)]
    fn stop(&mut self) {
        self.tc0.tccr0b.write(|w| w.cs0().no_clock());
    }

    /// Flags clear by writing a one.
    #[inline(always)]
    fn clear_flag(&mut self) {
        match self.flag {
            Flag::Overflow => self.tc0.tifr0.write(|w| w.tov0().set_bit()),
            Flag::CompareA => self.tc0.tifr0.write(|w| w.ocf0a().set_bit()),
        }
    }

    #[inline(always)]
    fn has_overflowed(&mut self) -> bool {
        let flags = self.tc0.tifr0.read();
        match self.flag {
            Flag::Overflow => flags.tov0().bit_is_set(),
            Flag::CompareA => flags.ocf0a().bit_is_set(),
        }
    }

    #[inline(always)]
    fn enable_interrupt(&mut self) {
        self.tc0.timsk0.modify(|_, w| w.ocie0a().set_bit());
    }

    #[inline(always)]
    fn disable_interrupt(&mut self) {
        self.tc0.timsk0.modify(|_, w| w.ocie0a().clear_bit());
    }
}

#[avr_device::interrupt(atmega32u4)]
fn TIMER0_COMPA() {
    SAMPLER.on_compare_match(pin::sample());
}
