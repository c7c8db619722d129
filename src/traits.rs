use core::convert::Infallible;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::command::SpecialCommand;

/// A pin that can be turned around between driving and listening.
///
/// The receive loop polls the pin as fast as it can, so reads must be infallible
/// and the implementation should compile down to a single port read.
pub trait SignalPin: InputPin<Error = Infallible> + OutputPin<Error = Infallible> {
    fn set_input(&mut self);
    fn set_output(&mut self);

    /// Point the compare-match handler at this pin.
    ///
    /// Called at the start of every receive, so drivers on different pins can
    /// share one handler by taking turns. Backends whose handler reads the
    /// pin through the driver need nothing here.
    fn select_for_sampling(&mut self) {}
}

/// The single 8-bit timer the receiver owns for the duration of a reply.
///
/// Counts CPU cycles (prescaler 1). Implementations are plain register writes.
pub trait PulseTimer {
    /// Program the compare value used by [`set_short_timeout`](Self::set_short_timeout)
    /// and leave the timer stopped with its interrupt off.
    fn init(&mut self, top: u8);
    fn set_counter(&mut self, value: u8);
    /// Free-run over the full 8-bit range; the flag marks each wrap.
    fn set_max_timeout(&mut self);
    /// Clear on reaching `top`; the flag and the interrupt mark each match.
    fn set_short_timeout(&mut self);
    fn start(&mut self);
    fn stop(&mut self);
    fn clear_flag(&mut self);
    fn has_overflowed(&mut self) -> bool;
    fn enable_interrupt(&mut self);
    fn disable_interrupt(&mut self);
}

/// Cycle-counted busy wait.
pub trait CycleDelay {
    fn delay_cycles(&mut self, cycles: u32);
}

/// Interrupt state around a bidirectional exchange.
///
/// While a reply is sampled, the global enable must be on and every source but
/// the timer's compare match must be masked.
pub trait InterruptControl {
    type Saved;

    /// Mask every source except the receive timer, returning what to restore.
    fn mask_others(&mut self) -> Self::Saved;
    fn restore_others(&mut self, saved: Self::Saved);
    fn global_enabled(&self) -> bool;
    fn set_global(&mut self, enabled: bool);
}

/// The caller has already masked every other source and enabled interrupts
/// globally, and keeps it that way.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerManaged;

impl InterruptControl for CallerManaged {
    type Saved = ();

    fn mask_others(&mut self) {}

    fn restore_others(&mut self, _saved: ()) {}

    fn global_enabled(&self) -> bool {
        true
    }

    fn set_global(&mut self, _enabled: bool) {}
}

pub trait EscDriver {
    /// Wire frame accepted by [`send_command`](Self::send_command).
    type Frame: From<u16> + From<SpecialCommand>;
    /// What one exchange yields.
    type Reply;
    type Error;

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the line could not be driven.
    fn send_command(&mut self, frame: Self::Frame) -> Result<Self::Reply, Self::Error>;

    /// Send a throttle (0-1999), clamped to `DShot` range (48-2047).
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    fn throttle(&mut self, throttle: u16) -> Result<Self::Reply, Self::Error> {
        self.send_command(Self::Frame::from(throttle))
    }

    /// Send the lowest throttle (`DShot` value 48).
    ///
    /// The motor may creep slightly on some ESCs. To fully stop the motor,
    /// use `send_special(SpecialCommand::MotorStop)` (`DShot` value 0) instead.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    fn throttle_idle(&mut self) -> Result<Self::Reply, Self::Error> {
        self.throttle(0)
    }

    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    fn send_special(&mut self, cmd: SpecialCommand) -> Result<Self::Reply, Self::Error> {
        self.send_command(Self::Frame::from(cmd))
    }

    /// Send a special command `count` times back to back (6x for settings).
    ///
    /// # Errors
    ///
    /// Stops at the first failed send.
    fn send_command_repeated(&mut self, cmd: SpecialCommand, count: u8) -> Result<(), Self::Error> {
        for _ in 0..count {
            self.send_special(cmd)?;
        }
        Ok(())
    }

    /// Set motor rotation direction (requires 6 transmissions to take effect).
    ///
    /// # Errors
    ///
    /// See [`send_command_repeated`](Self::send_command_repeated).
    fn reverse(&mut self, reverse: bool) -> Result<(), Self::Error> {
        let cmd = if reverse {
            SpecialCommand::SpinDirectionReversed
        } else {
            SpecialCommand::SpinDirectionNormal
        };
        self.send_command_repeated(cmd, cmd.repeat_count())
    }
}

/// Unwrap a result that cannot fail.
#[inline(always)]
pub(crate) fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
