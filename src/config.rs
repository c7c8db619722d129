use core::marker::PhantomData;

use crate::timing::{ticks, DshotSpeed, PulseMath, ReceiveTiming};

/// Build-time configuration of a driver.
///
/// Implement this on a marker type; the drivers are generic over it so every
/// budget is folded into constants.
pub trait Config {
    const CPU_HZ: u32;
    const SPEED: DshotSpeed;
    /// How long to wait for the start of a reply.
    const RESPONSE_TIMEOUT_US: u32 = 50;
    /// How long the line is held low to make the ESC leave its bootloader.
    /// Some ESCs need 1300.
    const EXIT_BOOTLOADER_MS: u32 = 400;
    /// Send the least significant bit of each byte first.
    const LITTLE_ENDIAN: bool = false;
    /// Pad `0` bits so every bit period is the same length.
    const BALANCE_RECOVERY: bool = true;
    /// Cycles the compare-match handler spends before it reads the pin.
    const SAMPLE_HANDLER_TICKS: u32 = ticks::IJMP;
    /// Abort a reply after this many edges if it is still incomplete.
    /// `None` keeps sampling until 20 bits arrive.
    const MAX_RESYNC_EDGES: Option<u16> = None;
}

/// Budgets for `C`, validated when first used.
pub struct Checked<C>(PhantomData<C>);

impl<C: Config> Checked<C> {
    pub const PULSES: PulseMath = PulseMath::new(C::CPU_HZ, C::SPEED).check();
    pub const RECEIVE: ReceiveTiming = ReceiveTiming::new(
        C::CPU_HZ,
        C::SPEED,
        C::RESPONSE_TIMEOUT_US,
        C::SAMPLE_HANDLER_TICKS,
    )
    .check();
}

/// 16 MHz part driving DSHOT300.
pub struct Nominal16MHz;

impl Config for Nominal16MHz {
    const CPU_HZ: u32 = 16_000_000;
    const SPEED: DshotSpeed = DshotSpeed::nominal(16_000_000);
}

/// 8 MHz part driving DSHOT150.
pub struct Nominal8MHz;

impl Config for Nominal8MHz {
    const CPU_HZ: u32 = 8_000_000;
    const SPEED: DshotSpeed = DshotSpeed::nominal(8_000_000);
}
