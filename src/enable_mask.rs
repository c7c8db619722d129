//! Interrupt-enable registers masked around a reply, described per part so the
//! bit layout can be checked off target.

/// One interrupt-enable register: the enable bits to clear while a reply is
/// sampled, and flag bits that must be written as zero so a write-back neither
/// clears a pending flag nor arms a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnableRegister {
    pub enables: u8,
    pub flags: u8,
}

impl EnableRegister {
    #[must_use]
    pub const fn new(enables: u8, flags: u8) -> Self {
        Self { enables, flags }
    }

    /// Value to write while masked, given what was read.
    #[must_use]
    pub const fn masked(self, read: u8) -> u8 {
        read & !(self.enables | self.flags)
    }

    /// Value to write when restoring what `masked` replaced.
    #[must_use]
    pub const fn restored(self, saved: u8) -> u8 {
        saved & !self.flags
    }
}

/// ATmega32U4. Timer0 compare match A (`OCIE0A`) is the one source left on.
pub mod atmega32u4 {
    use super::EnableRegister;

    /// INT0-3, INT6.
    pub const EIMSK: EnableRegister = EnableRegister::new(0b0100_1111, 0);
    /// PCIE0.
    pub const PCICR: EnableRegister = EnableRegister::new(0b0000_0001, 0);
    /// EERIE; EEMPE, EEPE, EERE.
    pub const EECR: EnableRegister = EnableRegister::new(0b0000_1000, 0b0000_0111);
    /// SPMIE; the SPM command bits below it.
    pub const SPMCSR: EnableRegister = EnableRegister::new(0b1000_0000, 0b0011_1111);
    /// SPIE.
    pub const SPCR: EnableRegister = EnableRegister::new(0b1000_0000, 0);
    /// ACIE; ACI.
    pub const ACSR: EnableRegister = EnableRegister::new(0b0000_1000, 0b0001_0000);
    /// WDIE; WDIF.
    pub const WDTCSR: EnableRegister = EnableRegister::new(0b0100_0000, 0b1000_0000);
    /// TOIE0, OCIE0B.
    pub const TIMSK0: EnableRegister = EnableRegister::new(0b0000_0101, 0);
    pub const TIMSK1: EnableRegister = EnableRegister::new(0b0010_1111, 0);
    pub const TIMSK3: EnableRegister = EnableRegister::new(0b0010_1111, 0);
    pub const TIMSK4: EnableRegister = EnableRegister::new(0b1110_0100, 0);
    /// FPIE4; FPF4. The fault-protection setup bits are kept.
    pub const TCCR4D: EnableRegister = EnableRegister::new(0b1000_0000, 0b0000_0100);
    /// ADIE; ADIF.
    pub const ADCSRA: EnableRegister = EnableRegister::new(0b0000_1000, 0b0001_0000);
    /// TWIE; TWINT.
    pub const TWCR: EnableRegister = EnableRegister::new(0b0000_0001, 0b1000_0000);
    /// RXCIE1, TXCIE1, UDRIE1.
    pub const UCSR1B: EnableRegister = EnableRegister::new(0b1110_0000, 0);
    /// VBUSTE.
    pub const USBCON: EnableRegister = EnableRegister::new(0b0000_0001, 0);
    /// UPRSME, EORSME, WAKEUPE, EORSTE, SOFE, SUSPE.
    pub const UDIEN: EnableRegister = EnableRegister::new(0b0111_1101, 0);
    /// Per endpoint, selected through UENUM: every bit is an enable.
    pub const UEIENX: EnableRegister = EnableRegister::new(0b1101_1111, 0);
    /// Endpoints with their own UEIENX.
    pub const USB_ENDPOINTS: usize = 7;

    /// OCIE0A in TIMSK0.
    pub const RECEIVE_TIMER_ENABLE: u8 = 0b0000_0010;
}
