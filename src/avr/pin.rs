use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::traits::SignalPin;

/// Data-space address of PINx for each port. DDRx and PORTx follow it.
pub const PORT_B: u8 = 0x23;
pub const PORT_C: u8 = 0x26;
pub const PORT_D: u8 = 0x29;
pub const PORT_E: u8 = 0x2C;
pub const PORT_F: u8 = 0x2F;

static SAMPLE_PIN: AtomicU8 = AtomicU8::new(0);
static SAMPLE_MASK: AtomicU8 = AtomicU8::new(0);

/// Level of the pin selected by the receive in progress, read from the
/// compare-match handler.
#[inline(always)]
pub(super) fn sample() -> bool {
    let address = SAMPLE_PIN.load(Ordering::Relaxed);
    let mask = SAMPLE_MASK.load(Ordering::Relaxed);
    // SAFETY: only ever a PINx address from `AvrPin::select_for_sampling`;
    // reads have no side effects.
    let level = unsafe { read_volatile(usize::from(address) as *const u8) };
    level & mask != 0
}

/// One GPIO, fixed at compile time: `PIN` is one of the `PORT_*` addresses,
/// `BIT` the bit within the port.
pub struct AvrPin<const PIN: u8, const BIT: u8> {
    _private: (),
}

impl<const PIN: u8, const BIT: u8> AvrPin<PIN, BIT> {
    const MASK: u8 = 1 << BIT;
    const DDR: u8 = PIN + 1;
    const PORT: u8 = PIN + 2;

    /// Take the pin.
    ///
    /// # Safety
    ///
    /// Nothing else may drive this pin or change its direction while the
    /// returned value exists.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    #[inline(always)]
    fn modify(address: u8, set: bool) {
        let reg = usize::from(address) as *mut u8;
        // SAFETY: the pin owns `MASK` in this port register. The read-modify-write
        // runs with interrupts masked whenever timing matters.
        unsafe {
            let value = read_volatile(reg);
            write_volatile(reg, if set { value | Self::MASK } else { value & !Self::MASK });
        }
    }
}

impl<const PIN: u8, const BIT: u8> ErrorType for AvrPin<PIN, BIT> {
    type Error = Infallible;
}

impl<const PIN: u8, const BIT: u8> InputPin for AvrPin<PIN, BIT> {
    #[inline(always)]
    fn is_high(&mut self) -> Result<bool, Infallible> {
        // SAFETY: reading PINx has no side effects.
        Ok(unsafe { read_volatile(usize::from(PIN) as *const u8) } & Self::MASK != 0)
    }

    #[inline(always)]
    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

impl<const PIN: u8, const BIT: u8> OutputPin for AvrPin<PIN, BIT> {
    #[inline(always)]
    fn set_low(&mut self) -> Result<(), Infallible> {
        Self::modify(Self::PORT, false);
        Ok(())
    }

    #[inline(always)]
    fn set_high(&mut self) -> Result<(), Infallible> {
        Self::modify(Self::PORT, true);
        Ok(())
    }
}

impl<const PIN: u8, const BIT: u8> SignalPin for AvrPin<PIN, BIT> {
    /// With PORTx high this also enables the pull-up the reply line idles on.
    #[inline(always)]
    fn set_input(&mut self) {
        Self::modify(Self::DDR, false);
    }

    #[inline(always)]
    fn set_output(&mut self) {
        Self::modify(Self::DDR, true);
    }

    /// Stored before the timer starts, so the handler never sees half an update.
    fn select_for_sampling(&mut self) {
        SAMPLE_PIN.store(PIN, Ordering::Relaxed);
        SAMPLE_MASK.store(Self::MASK, Ordering::Relaxed);
    }
}
