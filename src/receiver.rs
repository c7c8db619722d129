//! Reception of the ESC's reply.
//!
//! After the frame the line is released and the ESC answers with a start bit
//! and 20 data bits. The foreground waits for the start bit's falling edge,
//! then spins on the pin and re-centres the timer on every edge, while the
//! timer's compare match samples one bit per period into the [`Sampler`].
//! Sampling stays in phase with the ESC's clock without any PLL.

use embedded_hal::digital::InputPin;

use crate::config::{Checked, Config};
use crate::gcr;
use crate::sampler::Sampler;
use crate::traits::{infallible, PulseTimer, SignalPin};
use crate::types::{Response, ResponseError};

#[inline(always)]
fn is_high<P: SignalPin>(pin: &mut P) -> bool {
    infallible(InputPin::is_high(pin))
}

/// Poll until the line falls, counting timer wraps against the timeout budget.
///
/// On timeout the timer is left stopped.
fn wait_for_start<C: Config, P: SignalPin, T: PulseTimer>(
    pin: &mut P,
    timer: &mut T,
) -> Result<(), ResponseError> {
    let timing = Checked::<C>::RECEIVE;

    timer.set_max_timeout();
    timer.set_counter(timing.timeout_preload);
    timer.clear_flag();
    timer.start();

    let mut overflows = timing.timeout_overflows as u8;

    while is_high(pin) {
        if !timer.has_overflowed() {
            continue;
        }
        if overflows == 0 {
            timer.stop();
            return Err(ResponseError::ResponseTimeout);
        }
        overflows -= 1;
        timer.clear_flag();
    }
    Ok(())
}

enum Level {
    High,
    Low,
}

/// Spin until the line reaches `level` or the sampler completes.
///
/// Returns false once the sampler is done.
#[inline(always)]
fn spin_until<P: SignalPin>(pin: &mut P, sampler: &Sampler, level: Level) -> bool {
    loop {
        if sampler.is_done() {
            return false;
        }
        let high = is_high(pin);
        match level {
            Level::High if high => return true,
            Level::Low if !high => return true,
            _ => {}
        }
    }
}

/// Follow edges until 20 bits are sampled.
fn sample<C: Config, P: SignalPin, T: PulseTimer>(
    pin: &mut P,
    timer: &mut T,
    sampler: &Sampler,
) -> Result<(), ResponseError> {
    let timing = Checked::<C>::RECEIVE;

    // The start bit is never sampled: the first match lands mid first data bit.
    timer.set_counter(timing.counter_initial);
    timer.set_short_timeout();
    timer.clear_flag();
    sampler.arm();
    timer.enable_interrupt();

    let mut edges: u16 = 0;
    let mut resync = |timer: &mut T| {
        timer.set_counter(timing.counter_sync);
        edges = edges.saturating_add(1);
        match C::MAX_RESYNC_EDGES {
            Some(limit) if edges > limit => Err(ResponseError::SamplingOverrun),
            _ => Ok(()),
        }
    };

    loop {
        if !spin_until(pin, sampler, Level::High) {
            return Ok(());
        }
        resync(timer)?;

        if !spin_until(pin, sampler, Level::Low) {
            return Ok(());
        }
        resync(timer)?;
    }
}

/// Receive and decode one reply. The pin must already be an input and the
/// interrupt environment set up: global enable on, every source other than the
/// timer's compare match masked.
///
/// The pin is selected for sampling first, before the timer starts.
///
/// Without `C::MAX_RESYNC_EDGES`, a line that starts a reply and never produces
/// 20 samples keeps this spinning.
pub fn receive<C: Config, P: SignalPin, T: PulseTimer>(
    pin: &mut P,
    timer: &mut T,
    sampler: &Sampler,
) -> Response {
    pin.select_for_sampling();

    if let Err(error) = wait_for_start::<C, P, T>(pin, timer) {
        return Response::from_error(error);
    }

    let sampled = sample::<C, P, T>(pin, timer, sampler);

    timer.stop();
    timer.disable_interrupt();
    let bytes = sampler.finish();

    match sampled {
        Ok(()) => gcr::decode_accumulator(bytes),
        Err(error) => Response::from_error(error),
    }
}
