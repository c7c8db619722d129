use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use super::FRAME_BITS;
use crate::command::Command;
use crate::config::{Checked, Config};
use crate::pulsed_output::PulsedOutput;
use crate::receiver;
use crate::sampler::Sampler;
use crate::traits::{infallible, CycleDelay, EscDriver, InterruptControl, PulseTimer, SignalPin};
use crate::types::Response;

/// Bidirectional `DShot` on one pin: an inverted frame out, then the ESC's
/// reply read back on the same line.
///
/// The timer's compare-match handler must call
/// [`Sampler::on_compare_match`] on `sampler` with the pin level. Nothing
/// else may run while a reply is sampled; `I` masks every other source for the
/// exchange.
pub struct BidirDshot<'s, C, P, T, D, I> {
    pin: P,
    timer: T,
    delay: D,
    interrupts: I,
    sampler: &'s Sampler,
    _config: PhantomData<C>,
}

impl<'s, C, P, T, D, I> BidirDshot<'s, C, P, T, D, I>
where
    C: Config,
    P: SignalPin,
    T: PulseTimer,
    D: CycleDelay,
    I: InterruptControl,
{
    pub fn new(pin: P, timer: T, delay: D, interrupts: I, sampler: &'s Sampler) -> Self {
        // Fails the build if `C` cannot meet the pulse or receive timing.
        let _ = Checked::<C>::PULSES;
        let _ = Checked::<C>::RECEIVE;
        Self {
            pin,
            timer,
            delay,
            interrupts,
            sampler,
            _config: PhantomData,
        }
    }

    /// Program the timer and let the line idle high.
    pub fn init(&mut self) {
        debug!("bdshot init, top {}", Checked::<C>::RECEIVE.top);
        self.timer.init(Checked::<C>::RECEIVE.top);
        self.timer.disable_interrupt();
        self.timer.stop();
        infallible(self.pin.set_high());
        self.pin.set_input();
    }

    /// Hold the line low long enough for the ESC to leave its bootloader, then
    /// release it high.
    pub fn exit_bootloader(&mut self, delay: &mut impl DelayNs) {
        infallible(self.pin.set_low());
        self.pin.set_output();
        delay.delay_ms(C::EXIT_BOOTLOADER_MS);
        infallible(self.pin.set_high());
    }

    /// Send one frame and wait for the reply.
    ///
    /// Returns once the reply is decoded or the response timeout passes. The
    /// interrupt state from before the call is restored on return.
    pub fn send_command(&mut self, command: Command<true>) -> Response {
        let saved = self.interrupts.mask_others();
        self.pin.set_output();

        let was_enabled = self.interrupts.global_enabled();
        self.interrupts.set_global(false);
        infallible(PulsedOutput::<C, true>::send(
            &mut self.pin,
            &mut self.delay,
            command.bytes(),
            FRAME_BITS,
        ));
        self.pin.set_input();
        self.interrupts.set_global(true);

        let response = self.get_response();

        self.interrupts.set_global(was_enabled);
        self.interrupts.restore_others(saved);

        if response.is_error() {
            debug!("bdshot reply error {}", response.error());
        } else {
            trace!("bdshot reply {}", response);
        }
        response
    }

    /// Receive a reply on a line that is already an input, with interrupts
    /// set up by the caller.
    pub fn get_response(&mut self) -> Response {
        receiver::receive::<C, P, T>(&mut self.pin, &mut self.timer, self.sampler)
    }

    pub fn release(self) -> (P, T, D, I) {
        (self.pin, self.timer, self.delay, self.interrupts)
    }
}

impl<C, P, T, D, I> EscDriver for BidirDshot<'_, C, P, T, D, I>
where
    C: Config,
    P: SignalPin,
    T: PulseTimer,
    D: CycleDelay,
    I: InterruptControl,
{
    type Frame = Command<true>;
    type Reply = Response;
    type Error = Infallible;

    fn send_command(&mut self, frame: Command<true>) -> Result<Response, Infallible> {
        Ok(BidirDshot::send_command(self, frame))
    }
}
