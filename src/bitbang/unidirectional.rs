use core::marker::PhantomData;

use embedded_hal::digital::OutputPin;

use super::FRAME_BITS;
use crate::command::Command;
use crate::config::{Checked, Config};
use crate::pulsed_output::PulsedOutput;
use crate::traits::{CycleDelay, EscDriver, InterruptControl};

/// One-way `DShot` on a single output pin.
///
/// Direction is fixed by the pin type: `P` is an embedded-hal output, so the
/// HAL has already made it one. Global interrupts are off while a frame is on
/// the wire and restored afterwards.
pub struct Dshot<C, P, D, I> {
    pin: P,
    delay: D,
    interrupts: I,
    _config: PhantomData<C>,
}

impl<C: Config, P: OutputPin, D: CycleDelay, I: InterruptControl> Dshot<C, P, D, I> {
    pub fn new(pin: P, delay: D, interrupts: I) -> Self {
        // Fails the build if `C` cannot meet the pulse timing.
        let _ = Checked::<C>::PULSES;
        Self {
            pin,
            delay,
            interrupts,
            _config: PhantomData,
        }
    }

    /// Drive the line low, its idle level. The pin is an output already, so
    /// nothing else is touched.
    ///
    /// # Errors
    ///
    /// Propagates the pin error.
    pub fn init(&mut self) -> Result<(), P::Error> {
        debug!("dshot init");
        PulsedOutput::<C, false>::off(&mut self.pin)
    }

    /// # Errors
    ///
    /// Propagates the first pin error. Interrupts are restored either way.
    pub fn send_command(&mut self, command: Command<false>) -> Result<(), P::Error> {
        let was_enabled = self.interrupts.global_enabled();
        self.interrupts.set_global(false);
        let sent = PulsedOutput::<C, false>::send(
            &mut self.pin,
            &mut self.delay,
            command.bytes(),
            FRAME_BITS,
        );
        self.interrupts.set_global(was_enabled);
        sent
    }

    pub fn release(self) -> (P, D, I) {
        (self.pin, self.delay, self.interrupts)
    }
}

impl<C: Config, P: OutputPin, D: CycleDelay, I: InterruptControl> EscDriver for Dshot<C, P, D, I> {
    type Frame = Command<false>;
    type Reply = ();
    type Error = P::Error;

    fn send_command(&mut self, frame: Command<false>) -> Result<(), P::Error> {
        Dshot::send_command(self, frame)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

    use super::*;
    use crate::command::SpecialCommand;
    use crate::config::Nominal16MHz;

    /// Reads the bits back out of the delay windows: a long bit waits B while
    /// still on, a short one waits D after going off.
    #[derive(Default)]
    struct BitRecorder(Vec<u32>);

    impl CycleDelay for BitRecorder {
        fn delay_cycles(&mut self, cycles: u32) {
            self.0.push(cycles);
        }
    }

    impl BitRecorder {
        fn frame(&self) -> u16 {
            let long = crate::timing::PulseMath::cycles(Checked::<Nominal16MHz>::PULSES.delay_b);
            self.0
                .chunks(3)
                .fold(0, |acc, bit| (acc << 1) | u16::from(bit[1] == long))
        }
    }

    #[derive(Default)]
    struct GlobalFlag {
        enabled: bool,
        history: Vec<bool>,
    }

    impl InterruptControl for GlobalFlag {
        type Saved = ();

        fn mask_others(&mut self) {}
        fn restore_others(&mut self, _saved: ()) {}
        fn global_enabled(&self) -> bool {
            self.enabled
        }
        fn set_global(&mut self, enabled: bool) {
            self.enabled = enabled;
            self.history.push(enabled);
        }
    }

    /// Pin writes for one frame, including the final idle write.
    fn frame_transactions() -> Vec<PinTransaction> {
        let mut t = Vec::new();
        for _ in 0..FRAME_BITS {
            t.push(PinTransaction::set(PinState::High));
            t.push(PinTransaction::set(PinState::Low));
        }
        t.push(PinTransaction::set(PinState::Low));
        t
    }

    #[test]
    fn init_only_drives_the_idle_level() {
        let mut pin = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut esc = Dshot::<Nominal16MHz, _, _, _>::new(
            pin.clone(),
            BitRecorder::default(),
            GlobalFlag::default(),
        );
        esc.init().unwrap();

        let (_, delay, interrupts) = esc.release();
        assert!(delay.0.is_empty());
        assert!(interrupts.history.is_empty());
        pin.done();
    }

    #[test]
    fn frame_is_sent_with_interrupts_off_and_restored() {
        let command = Command::<false>::from_throttle(998, false);
        let expected = frame_transactions();
        let mut pin = PinMock::new(&expected);
        let interrupts = GlobalFlag {
            enabled: true,
            history: Vec::new(),
        };
        let mut esc =
            Dshot::<Nominal16MHz, _, _, _>::new(pin.clone(), BitRecorder::default(), interrupts);

        esc.send_command(command).unwrap();

        let (_, delay, interrupts) = esc.release();
        assert_eq!(delay.frame(), command.frame());
        assert_eq!(interrupts.history, [false, true]);
        pin.done();
    }

    #[test]
    fn disabled_interrupts_stay_disabled() {
        let command = Command::<false>::from(SpecialCommand::Beep1);
        let expected = frame_transactions();
        let mut pin = PinMock::new(&expected);
        let mut esc = Dshot::<Nominal16MHz, _, _, _>::new(
            pin.clone(),
            BitRecorder::default(),
            GlobalFlag::default(),
        );

        EscDriver::send_special(&mut esc, SpecialCommand::Beep1).unwrap();

        let (_, delay, interrupts) = esc.release();
        assert_eq!(delay.frame(), command.frame());
        assert_eq!(interrupts.history, [false, false]);
        pin.done();
    }
}
