//! The 16-bit DShot command frame.
//!
//! On the wire a frame is 11 bits of command, one telemetry-request bit and a
//! 4-bit CRC, sent MSB first. Commands 0-47 are reserved for special commands;
//! 48-2047 are throttle 0-[`MAX`].

/// Number of command bits in a frame.
pub const BITS: u32 = 11;
/// Command bits carried in the second wire byte.
pub const BITS_LOW: u32 = BITS - 8;
/// Highest raw 11-bit command value.
pub const RAW_MAX: u16 = (1 << BITS) - 1;
/// Number of reserved special commands.
pub const SPECIAL_COMMANDS: u16 = 48;
/// Raw value of throttle zero.
pub const ZERO: u16 = SPECIAL_COMMANDS;
/// Highest throttle value.
pub const MAX: u16 = RAW_MAX - ZERO;

/// Special commands 0-47.
///
/// Commands 0-36 are only executed by the ESC while the motor is stopped. Most
/// settings commands need to be sent 6 times in a row to take effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SpecialCommand {
    MotorStop = 0,
    /// Wait at least the length of the beep (260ms) before the next command.
    Beep1 = 1,
    Beep2 = 2,
    Beep3 = 3,
    Beep4 = 4,
    Beep5 = 5,
    /// Sends an info packet over the separate telemetry wire. Wait 12ms.
    EscInfo = 6,
    SpinDirection1 = 7,
    SpinDirection2 = 8,
    ThreeDModeOff = 9,
    ThreeDModeOn = 10,
    SettingsRequest = 11,
    SettingsSave = 12,
    ExtendedTelemetryEnable = 13,
    ExtendedTelemetryDisable = 14,
    SpinDirectionNormal = 20,
    SpinDirectionReversed = 21,
    Led0On = 22,
    Led1On = 23,
    Led2On = 24,
    Led3On = 25,
    Led0Off = 26,
    Led1Off = 27,
    Led2Off = 28,
    Led3Off = 29,
    AudioStreamModeToggle = 30,
    SilentModeToggle = 31,
    SignalLineTelemetryDisable = 32,
    SignalLineTelemetryEnable = 33,
    SignalLineContinuousErpmTelemetry = 34,
    SignalLineContinuousErpmPeriodTelemetry = 35,
    SignalLineTemperatureTelemetry = 42,
    SignalLineVoltageTelemetry = 43,
    SignalLineCurrentTelemetry = 44,
    SignalLineConsumptionTelemetry = 45,
    SignalLineErpmTelemetry = 46,
    SignalLineErpmPeriodTelemetry = 47,
}

impl SpecialCommand {
    /// Map a raw command value (0-47) back to its special command.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::MotorStop),
            1 => Some(Self::Beep1),
            2 => Some(Self::Beep2),
            3 => Some(Self::Beep3),
            4 => Some(Self::Beep4),
            5 => Some(Self::Beep5),
            6 => Some(Self::EscInfo),
            7 => Some(Self::SpinDirection1),
            8 => Some(Self::SpinDirection2),
            9 => Some(Self::ThreeDModeOff),
            10 => Some(Self::ThreeDModeOn),
            11 => Some(Self::SettingsRequest),
            12 => Some(Self::SettingsSave),
            13 => Some(Self::ExtendedTelemetryEnable),
            14 => Some(Self::ExtendedTelemetryDisable),
            20 => Some(Self::SpinDirectionNormal),
            21 => Some(Self::SpinDirectionReversed),
            22 => Some(Self::Led0On),
            23 => Some(Self::Led1On),
            24 => Some(Self::Led2On),
            25 => Some(Self::Led3On),
            26 => Some(Self::Led0Off),
            27 => Some(Self::Led1Off),
            28 => Some(Self::Led2Off),
            29 => Some(Self::Led3Off),
            30 => Some(Self::AudioStreamModeToggle),
            31 => Some(Self::SilentModeToggle),
            32 => Some(Self::SignalLineTelemetryDisable),
            33 => Some(Self::SignalLineTelemetryEnable),
            34 => Some(Self::SignalLineContinuousErpmTelemetry),
            35 => Some(Self::SignalLineContinuousErpmPeriodTelemetry),
            42 => Some(Self::SignalLineTemperatureTelemetry),
            43 => Some(Self::SignalLineVoltageTelemetry),
            44 => Some(Self::SignalLineCurrentTelemetry),
            45 => Some(Self::SignalLineConsumptionTelemetry),
            46 => Some(Self::SignalLineErpmTelemetry),
            47 => Some(Self::SignalLineErpmPeriodTelemetry),
            _ => None, // 15-19, 36-41 are unassigned
        }
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// How many consecutive frames the ESC expects before acting on this command.
    #[must_use]
    pub const fn repeat_count(self) -> u8 {
        match self {
            Self::SpinDirection1
            | Self::SpinDirection2
            | Self::ThreeDModeOff
            | Self::ThreeDModeOn
            | Self::SettingsRequest
            | Self::SettingsSave
            | Self::ExtendedTelemetryEnable
            | Self::ExtendedTelemetryDisable
            | Self::SpinDirectionNormal
            | Self::SpinDirectionReversed
            | Self::SignalLineTelemetryDisable
            | Self::SignalLineTelemetryEnable
            | Self::SignalLineContinuousErpmTelemetry
            | Self::SignalLineContinuousErpmPeriodTelemetry => 6,
            _ => 1,
        }
    }
}

/// CRC of a command as it is framed on the wire.
///
/// `INVERTED` selects the bidirectional variant, where the CRC is bit-inverted.
#[must_use]
pub const fn compute_crc(raw: u16, telemetry: bool, inverted: bool) -> u8 {
    let framed = (raw << 1) | telemetry as u16;
    let crc = (framed ^ (framed >> 4) ^ (framed >> 8)) as u8;
    (if inverted { !crc } else { crc }) & 0x0F
}

fn clamp_unit(value: f32) -> f32 {
    if value > 1.0 {
        1.0
    } else if value >= 0.0 {
        value
    } else {
        // NaN ends up here too
        0.0
    }
}

/// Scale a fraction in `[0, 1]` to a throttle in `[0, MAX]`, rounding to nearest.
///
/// Values outside the range saturate; they never wrap.
#[must_use]
pub fn scale_to_command_max(value: f32) -> u16 {
    // Non-negative, so adding a half and truncating rounds to nearest.
    (clamp_unit(value) * f32::from(MAX) + 0.5) as u16
}

/// See [`scale_to_command_max`].
#[must_use]
pub fn scale_to_command_max_f64(value: f64) -> u16 {
    let clamped = if value > 1.0 {
        1.0
    } else if value >= 0.0 {
        value
    } else {
        0.0
    };
    (clamped * f64::from(MAX) + 0.5) as u16
}

/// A complete frame, in the byte order it leaves the pin.
///
/// The first byte holds the upper 8 command bits. The second byte holds, from
/// the least significant bit up, the 4-bit CRC, the telemetry flag and the low 3
/// command bits.
///
/// `INVERTED` is true for bidirectional DShot, which inverts the CRC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct Command<const INVERTED: bool> {
    bytes: [u8; 2],
}

impl<const INVERTED: bool> Command<INVERTED> {
    const fn from_raw(raw: u16, telemetry: bool) -> Self {
        let raw = raw & RAW_MAX;
        let crc = compute_crc(raw, telemetry, INVERTED);
        let high = (raw >> BITS_LOW) as u8;
        let low = ((raw as u8) << 5) | ((telemetry as u8) << 4) | crc;
        Self { bytes: [high, low] }
    }

    /// Throttle `0..=MAX`; larger values are clamped to [`MAX`].
    #[must_use]
    pub const fn from_throttle(throttle: u16, telemetry: bool) -> Self {
        let throttle = if throttle > MAX { MAX } else { throttle };
        Self::from_raw(throttle + ZERO, telemetry)
    }

    /// Signed throttle, clamped to `0..=MAX`.
    #[must_use]
    pub const fn from_signed(throttle: i32, telemetry: bool) -> Self {
        let throttle = if throttle < 0 {
            0
        } else if throttle > MAX as i32 {
            MAX
        } else {
            throttle as u16
        };
        Self::from_raw(throttle + ZERO, telemetry)
    }

    /// Throttle as a fraction of full scale, clamped to `[0, 1]`.
    #[must_use]
    pub fn from_fraction(value: f32, telemetry: bool) -> Self {
        Self::from_throttle(scale_to_command_max(value), telemetry)
    }

    #[must_use]
    pub fn from_fraction_f64(value: f64, telemetry: bool) -> Self {
        Self::from_throttle(scale_to_command_max_f64(value), telemetry)
    }

    #[must_use]
    pub const fn special(command: SpecialCommand, telemetry: bool) -> Self {
        Self::from_raw(command.raw(), telemetry)
    }

    /// Reinterpret two wire bytes. The CRC is kept as received; see
    /// [`has_valid_crc`](Self::has_valid_crc).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self { bytes }
    }

    /// The same command with the telemetry-request flag set.
    #[must_use]
    pub const fn with_telemetry(self) -> Self {
        Self::from_raw(self.raw(), true)
    }

    /// The 11-bit command as sent.
    #[must_use]
    pub const fn raw(&self) -> u16 {
        ((self.bytes[0] as u16) << BITS_LOW) | (self.bytes[1] >> 5) as u16
    }

    #[must_use]
    pub const fn telemetry(&self) -> bool {
        self.bytes[1] & 0x10 != 0
    }

    #[must_use]
    pub const fn crc(&self) -> u8 {
        self.bytes[1] & 0x0F
    }

    #[must_use]
    pub const fn has_valid_crc(&self) -> bool {
        self.crc() == compute_crc(self.raw(), self.telemetry(), INVERTED)
    }

    #[must_use]
    pub const fn is_special_command(&self) -> bool {
        self.raw() < ZERO
    }

    /// Throttle `0..=MAX`, or `None` for a special command.
    #[must_use]
    pub const fn throttle(&self) -> Option<u16> {
        if self.is_special_command() {
            None
        } else {
            Some(self.raw() - ZERO)
        }
    }

    #[must_use]
    pub const fn bytes(&self) -> &[u8; 2] {
        &self.bytes
    }

    /// The 16-bit frame word, MSB first on the wire.
    #[must_use]
    pub const fn frame(&self) -> u16 {
        u16::from_be_bytes(self.bytes)
    }
}

impl<const INVERTED: bool> From<u16> for Command<INVERTED> {
    fn from(throttle: u16) -> Self {
        Self::from_throttle(throttle, false)
    }
}

impl<const INVERTED: bool> From<i32> for Command<INVERTED> {
    fn from(throttle: i32) -> Self {
        Self::from_signed(throttle, false)
    }
}

impl<const INVERTED: bool> From<f32> for Command<INVERTED> {
    fn from(value: f32) -> Self {
        Self::from_fraction(value, false)
    }
}

impl<const INVERTED: bool> From<f64> for Command<INVERTED> {
    fn from(value: f64) -> Self {
        Self::from_fraction_f64(value, false)
    }
}

/// Converts by wire value. `dshot-frame` names 9/10 and 32/33 the other way
/// round; the number sent is what the ESC acts on.
impl From<dshot_frame::Command> for SpecialCommand {
    fn from(command: dshot_frame::Command) -> Self {
        use dshot_frame::Command as Frame;
        match command {
            Frame::MotorStop => Self::MotorStop,
            Frame::Beep1 => Self::Beep1,
            Frame::Beep2 => Self::Beep2,
            Frame::Beep3 => Self::Beep3,
            Frame::Beep4 => Self::Beep4,
            Frame::Beep5 => Self::Beep5,
            Frame::ESCInfo => Self::EscInfo,
            Frame::SpinDirection1 => Self::SpinDirection1,
            Frame::SpinDirection2 => Self::SpinDirection2,
            Frame::ThreeDModeOn => Self::ThreeDModeOff,
            Frame::ThreeDModeOff => Self::ThreeDModeOn,
            Frame::SettingsRequest => Self::SettingsRequest,
            Frame::SettingsSave => Self::SettingsSave,
            Frame::ExtendedTelemetryEnable => Self::ExtendedTelemetryEnable,
            Frame::ExtendedTelemetryDisable => Self::ExtendedTelemetryDisable,
            Frame::SpinDirectionNormal => Self::SpinDirectionNormal,
            Frame::SpinDirectionReversed => Self::SpinDirectionReversed,
            Frame::Led0On => Self::Led0On,
            Frame::Led1On => Self::Led1On,
            Frame::Led2On => Self::Led2On,
            Frame::Led3On => Self::Led3On,
            Frame::Led0Off => Self::Led0Off,
            Frame::Led1Off => Self::Led1Off,
            Frame::Led2Off => Self::Led2Off,
            Frame::Led3Off => Self::Led3Off,
            Frame::AudioStreamModeToggle => Self::AudioStreamModeToggle,
            Frame::SilentModeToggle => Self::SilentModeToggle,
            Frame::SignalLineTelemetryEnable => Self::SignalLineTelemetryDisable,
            Frame::SignalLineTelemetryDisable => Self::SignalLineTelemetryEnable,
            Frame::SignalLineContinuousERPMTelemetry => Self::SignalLineContinuousErpmTelemetry,
            Frame::SignalLineContinuousERPMPeriodTelemetry => {
                Self::SignalLineContinuousErpmPeriodTelemetry
            }
            Frame::SignalLineTemperatureTelemetry => Self::SignalLineTemperatureTelemetry,
            Frame::SignalLineVoltageTelemetry => Self::SignalLineVoltageTelemetry,
            Frame::SignalLineCurrentTelemetry => Self::SignalLineCurrentTelemetry,
            Frame::SignalLineConsumptionTelemetry => Self::SignalLineConsumptionTelemetry,
            Frame::SignalLineERPMTelemetry => Self::SignalLineErpmTelemetry,
            Frame::SignalLineERPMPeriodTelemetry => Self::SignalLineErpmPeriodTelemetry,
        }
    }
}

impl<const INVERTED: bool> From<dshot_frame::Command> for Command<INVERTED> {
    fn from(command: dshot_frame::Command) -> Self {
        Self::special(command.into(), false)
    }
}

impl<const INVERTED: bool> From<SpecialCommand> for Command<INVERTED> {
    fn from(command: SpecialCommand) -> Self {
        Self::special(command, false)
    }
}

// Frame layout checks; a mistake here fails the build.
const _: () = {
    let c = Command::<false>::from_throttle(1046 - ZERO, false);
    assert!(c.raw() == 1046);
    assert!(!c.telemetry());
    assert!(c.crc() == 0b0110);
    assert!(c.bytes[0] == (1046 >> BITS_LOW) as u8);

    let inverted = Command::<true>::from_throttle(1046 - ZERO, false);
    assert!(inverted.crc() == 0b1001);

    assert!(core::mem::size_of::<Command<false>>() == 2);
    assert!(core::mem::size_of::<Command<true>>() == 2);
    assert!(MAX == 1999);
};

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_crc(value: u16, telemetry: bool, inverted: bool) -> u8 {
        let framed = (value << 1) | u16::from(telemetry);
        let base = ((framed ^ (framed >> 4) ^ (framed >> 8)) & 0xF) as u8;
        if inverted {
            base ^ 0xF
        } else {
            base
        }
    }

    #[test]
    fn crc_matches_formula_for_every_command() {
        for raw in 0..=RAW_MAX {
            for telemetry in [false, true] {
                let normal = Command::<false>::from_raw(raw, telemetry);
                let bidir = Command::<true>::from_raw(raw, telemetry);
                assert_eq!(normal.crc(), expected_crc(raw, telemetry, false), "raw {raw}");
                assert_eq!(bidir.crc(), expected_crc(raw, telemetry, true), "raw {raw}");
                assert_eq!(normal.raw(), raw);
                assert_eq!(normal.telemetry(), telemetry);
            }
        }
    }

    #[test]
    fn known_frames() {
        // Throttle 998 without telemetry: raw 1046, CRC 0x6
        let c = Command::<false>::from_throttle(998, false);
        assert_eq!(c.frame(), (1046 << 5) | 0x6);
        let c = Command::<false>::from_throttle(998, true);
        assert_eq!(c.crc(), 0x7);
        assert!(c.telemetry());
    }

    #[test]
    fn parsing_the_wire_bytes_reproduces_the_crc() {
        for throttle in (0..=MAX).step_by(7) {
            let sent = Command::<true>::from_throttle(throttle, throttle % 2 == 0);
            let parsed = Command::<true>::from_bytes(*sent.bytes());
            assert_eq!(parsed.raw(), throttle + ZERO);
            assert!(parsed.has_valid_crc());
            assert_eq!(
                compute_crc(parsed.raw(), parsed.telemetry(), true),
                sent.crc()
            );
        }
    }

    #[test]
    fn corrupted_frame_fails_crc() {
        let sent = Command::<false>::from_throttle(500, false);
        let mut bytes = *sent.bytes();
        bytes[0] ^= 0x01;
        assert!(!Command::<false>::from_bytes(bytes).has_valid_crc());
    }

    #[test]
    fn throttle_clamps_instead_of_wrapping() {
        assert_eq!(Command::<false>::from_throttle(5000, false).raw(), RAW_MAX);
        assert_eq!(Command::<false>::from_signed(-20, false).raw(), ZERO);
        assert_eq!(Command::<false>::from_signed(70_000, false).raw(), RAW_MAX);
        assert_eq!(Command::<false>::from(0u16).throttle(), Some(0));
    }

    #[test]
    fn scaling_is_monotonic_and_saturating() {
        assert_eq!(scale_to_command_max(0.0), 0);
        assert_eq!(scale_to_command_max(1.0), MAX);
        assert_eq!(scale_to_command_max(-3.5), 0);
        assert_eq!(scale_to_command_max(42.0), MAX);
        assert_eq!(scale_to_command_max(f32::NAN), 0);
        assert_eq!(scale_to_command_max(0.5), 1000);
        assert_eq!(scale_to_command_max_f64(0.5), 1000);
        assert_eq!(scale_to_command_max_f64(-0.1), 0);
        assert_eq!(scale_to_command_max_f64(1.1), MAX);

        let mut last = 0;
        for step in 0..=1000 {
            let scaled = scale_to_command_max(step as f32 / 1000.0);
            assert!(scaled >= last);
            last = scaled;
        }
    }

    #[test]
    fn fraction_constructors_clamp() {
        assert_eq!(Command::<true>::from(1.5f32).raw(), RAW_MAX);
        assert_eq!(Command::<true>::from(-1.0f64).raw(), ZERO);
        assert_eq!(Command::<true>::from(0.5f64).throttle(), Some(1000));
    }

    #[test]
    fn special_commands_round_trip() {
        for raw in 0..SPECIAL_COMMANDS {
            match SpecialCommand::from_raw(raw) {
                Some(cmd) => {
                    let c = Command::<true>::from(cmd);
                    assert_eq!(c.raw(), raw);
                    assert!(c.is_special_command());
                    assert_eq!(c.throttle(), None);
                }
                None => assert!((15..=19).contains(&raw) || (36..=41).contains(&raw)),
            }
        }
        assert_eq!(SpecialCommand::from_raw(48), None);
    }

    #[test]
    fn settings_commands_need_repeats() {
        assert_eq!(SpecialCommand::SettingsSave.repeat_count(), 6);
        assert_eq!(SpecialCommand::ExtendedTelemetryEnable.repeat_count(), 6);
        assert_eq!(SpecialCommand::Beep1.repeat_count(), 1);
    }

    #[test]
    fn with_telemetry_recomputes_crc() {
        let c = Command::<true>::from_throttle(300, false).with_telemetry();
        assert!(c.telemetry());
        assert!(c.has_valid_crc());
        assert_eq!(c.throttle(), Some(300));
    }
}
