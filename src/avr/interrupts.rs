use avr_device::atmega32u4::{
    AC, ADC, BOOT_LOAD, EEPROM, EXINT, SPI, TC0, TC1, TC3, TC4, TWI, USART1, USB_DEVICE, WDT,
};
use avr_device::interrupt;

use crate::enable_mask::atmega32u4::{self as rows, USB_ENDPOINTS};
use crate::traits::InterruptControl;

/// Builds the save/mask and restore passes over `PERIPHERAL.register: ROW`
/// entries, each row a [`crate::enable_mask::EnableRegister`].
macro_rules! interrupt_sources {
    ($($periph:ident . $reg:ident : $row:ident;)*) => {
        const SOURCE_COUNT: usize = [$(stringify!($reg)),*].len();

        #[allow(unused_unsafe)]
        fn mask_sources(saved: &mut [u8; SOURCE_COUNT]) {
            let mut slots = saved.iter_mut();
            $(
                // SAFETY: shared access to a register block; only this row's
                // enable bits change.
                let block = unsafe { &*$periph::ptr() };
                let value = block.$reg.read().bits();
                if let Some(slot) = slots.next() {
                    *slot = value;
                }
                block.$reg.write(|w| unsafe { w.bits(rows::$row.masked(value)) });
            )*
        }

        #[allow(unused_unsafe)]
        fn restore_sources(saved: &[u8; SOURCE_COUNT]) {
            let mut slots = saved.iter();
            $(
                // SAFETY: as in `mask_sources`; writes back what was read.
                let block = unsafe { &*$periph::ptr() };
                if let Some(&value) = slots.next() {
                    block.$reg.write(|w| unsafe { w.bits(rows::$row.restored(value)) });
                }
            )*
        }
    };
}

interrupt_sources! {
    EXINT.eimsk: EIMSK;
    EXINT.pcicr: PCICR;
    EEPROM.eecr: EECR;
    BOOT_LOAD.spmcsr: SPMCSR;
    SPI.spcr: SPCR;
    AC.acsr: ACSR;
    WDT.wdtcsr: WDTCSR;
    TC0.timsk0: TIMSK0;
    TC1.timsk1: TIMSK1;
    TC3.timsk3: TIMSK3;
    TC4.timsk4: TIMSK4;
    TC4.tccr4d: TCCR4D;
    ADC.adcsra: ADCSRA;
    TWI.twcr: TWCR;
    USART1.ucsr1b: UCSR1B;
    USB_DEVICE.usbcon: USBCON;
    USB_DEVICE.udien: UDIEN;
}

/// Enable registers as they were before [`Atmega32u4Interrupts::mask_others`].
#[derive(Debug, Clone, Copy)]
pub struct MaskedSources {
    sources: [u8; SOURCE_COUNT],
    endpoints: [u8; USB_ENDPOINTS],
}

fn usb() -> &'static avr_device::atmega32u4::usb_device::RegisterBlock {
    // SAFETY: only UENUM and UEIENX are touched, and UENUM is put back.
    unsafe { &*USB_DEVICE::ptr() }
}

/// Runs `f` on every endpoint with UENUM pointing at it, then reselects the
/// endpoint that was current before.
fn for_each_endpoint(mut f: impl FnMut(usize)) {
    let usb = usb();
    let current = usb.uenum.read().bits();
    for index in 0..USB_ENDPOINTS {
        usb.uenum.write(|w| w.bits(index as u8));
        f(index);
    }
    usb.uenum.write(|w| w.bits(current));
}

/// Masks every ATmega32U4 interrupt source except Timer0 compare match A.
///
/// Only enable bits are touched, through the PAC's register blocks, so the
/// peripherals stay with whichever drivers own them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Atmega32u4Interrupts;

impl InterruptControl for Atmega32u4Interrupts {
    type Saved = MaskedSources;

    fn mask_others(&mut self) -> MaskedSources {
        interrupt::free(|_| {
            let mut saved = MaskedSources {
                sources: [0; SOURCE_COUNT],
                endpoints: [0; USB_ENDPOINTS],
            };
            mask_sources(&mut saved.sources);
            for_each_endpoint(|index| {
                let value = usb().ueienx.read().bits();
                saved.endpoints[index] = value;
                // SAFETY: every UEIENX bit is an interrupt enable.
                usb().ueienx.write(|w| unsafe { w.bits(rows::UEIENX.masked(value)) });
            });
            saved
        })
    }

    fn restore_others(&mut self, saved: MaskedSources) {
        interrupt::free(|_| {
            restore_sources(&saved.sources);
            for_each_endpoint(|index| {
                // SAFETY: the value read in `mask_others` for this endpoint.
                usb().ueienx.write(|w| unsafe { w.bits(rows::UEIENX.restored(saved.endpoints[index])) });
            });
        });
    }

    fn global_enabled(&self) -> bool {
        interrupt::is_enabled()
    }

    fn set_global(&mut self, enabled: bool) {
        if enabled {
            // SAFETY: only the receive timer's compare match is left unmasked.
            unsafe { interrupt::enable() };
        } else {
            interrupt::disable();
        }
    }
}
