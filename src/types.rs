/// Why a bidirectional exchange produced no telemetry.
///
/// The discriminants are what an error [`Response`] carries in its low byte, so
/// they stay stable for anything that logs raw responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseError {
    None = 0,
    /// The ESC never pulled the line low within the response window.
    ResponseTimeout = 1,
    BadDecodeFirstNibble = 2,
    BadDecodeSecondNibble = 3,
    BadDecodeThirdNibble = 4,
    BadDecodeFourthNibble = 5,
    /// All four symbols decoded but the checksum nibble does not match.
    BadChecksum = 6,
    /// The line kept toggling past the configured edge limit before 20 bits
    /// were sampled.
    SamplingOverrun = 7,
}

impl ResponseError {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::ResponseTimeout),
            2 => Some(Self::BadDecodeFirstNibble),
            3 => Some(Self::BadDecodeSecondNibble),
            4 => Some(Self::BadDecodeThirdNibble),
            5 => Some(Self::BadDecodeFourthNibble),
            6 => Some(Self::BadChecksum),
            7 => Some(Self::SamplingOverrun),
            _ => None,
        }
    }

    /// Decode failure for the symbol at `significance` (3 is the first on the wire).
    #[must_use]
    pub(crate) const fn bad_nibble(significance: u8) -> Self {
        match significance {
            3 => Self::BadDecodeFirstNibble,
            2 => Self::BadDecodeSecondNibble,
            1 => Self::BadDecodeThirdNibble,
            _ => Self::BadDecodeFourthNibble,
        }
    }
}

/// Extended DShot Telemetry frame type, as carried in the high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TelemetryType {
    None = 0x00,
    /// Degrees Celsius.
    Temperature = 0x02,
    /// Steps of 0.25 V.
    Voltage = 0x04,
    /// Amperes.
    Current = 0x06,
    Debug1 = 0x08,
    Debug2 = 0x0A,
    Debug3 = 0x0C,
    StateEvent = 0x0E,
}

impl TelemetryType {
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x00 => Some(Self::None),
            0x02 => Some(Self::Temperature),
            0x04 => Some(Self::Voltage),
            0x06 => Some(Self::Current),
            0x08 => Some(Self::Debug1),
            0x0A => Some(Self::Debug2),
            0x0C => Some(Self::Debug3),
            0x0E => Some(Self::StateEvent),
            _ => None,
        }
    }
}

/// The ESC's reply to a bidirectional command, two packed bytes.
///
/// When the top bit of `msb` is set the response is an error and `lsb` holds a
/// [`ResponseError`]. Otherwise `msb` holds `eeex` (3 exponent bits over the
/// high base bit or EDT marker) and `lsb` the low 8 base bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    lsb: u8,
    msb: u8,
}

impl Response {
    pub const BASE_BITS: u32 = 9;
    pub const EXPONENT_BITS: u32 = 3;
    const ERROR_MASK: u8 = 1 << 7;

    /// Whether Extended DShot Telemetry frames are recognised.
    pub const SUPPORTS_EDT: bool = cfg!(feature = "edt");

    #[must_use]
    pub const fn from_error(error: ResponseError) -> Self {
        Self {
            lsb: error as u8,
            msb: Self::ERROR_MASK,
        }
    }

    /// Pack the three data nibbles, most significant first. The checksum nibble
    /// is not stored.
    #[must_use]
    pub const fn from_nibbles(n3: u8, n2: u8, n1: u8) -> Self {
        Self {
            lsb: (n2 << 4) | (n1 & 0x0F),
            msb: n3 & 0x0F,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.msb & Self::ERROR_MASK != 0
    }

    /// [`ResponseError::None`] unless this is an error response.
    #[must_use]
    pub const fn error(&self) -> ResponseError {
        if !self.is_error() {
            return ResponseError::None;
        }
        match ResponseError::from_raw(self.lsb) {
            Some(error) => error,
            None => ResponseError::None,
        }
    }

    /// # Errors
    ///
    /// Returns the carried [`ResponseError`] for error responses.
    pub const fn result(self) -> Result<Self, ResponseError> {
        if self.is_error() {
            Err(self.error())
        } else {
            Ok(self)
        }
    }

    /// True for an EDT frame. Meaningless on an error response.
    #[must_use]
    pub const fn is_extended_telemetry(&self) -> bool {
        Self::SUPPORTS_EDT && self.msb & 1 == 0
    }

    #[must_use]
    pub const fn telemetry_type(&self) -> Option<TelemetryType> {
        TelemetryType::from_nibble(self.msb)
    }

    #[must_use]
    pub const fn telemetry_value(&self) -> u8 {
        if Self::SUPPORTS_EDT {
            self.lsb
        } else {
            u8::MAX
        }
    }

    /// 9-bit period mantissa. With EDT support the leading bit is implied.
    #[must_use]
    pub const fn base(&self) -> u16 {
        (((Self::SUPPORTS_EDT as u16) | (self.msb & 1) as u16) << 8) | self.lsb as u16
    }

    #[must_use]
    pub const fn exponent(&self) -> u16 {
        ((self.msb >> 1) & ((1 << Self::EXPONENT_BITS) - 1)) as u16
    }

    /// Electrical revolution period.
    #[must_use]
    pub const fn period_micros(&self) -> u16 {
        self.base() << self.exponent()
    }

    /// Mechanical RPM for a motor with `pole_pairs` pole pairs (1 gives eRPM).
    ///
    /// Check [`is_error`](Self::is_error) first.
    #[must_use]
    pub fn rpm(&self, pole_pairs: u8) -> f32 {
        60e6 / (f32::from(pole_pairs) * f32::from(self.period_micros()))
    }

    /// The reserved all-ones period the ESC sends while the motor is stopped.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.msb == 0x0F && self.lsb == 0xFF
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.lsb, self.msb]
    }

    /// Interpret the response as either eRPM telemetry or an EDT frame.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ResponseError`] for error responses.
    pub fn reading(self) -> Result<Reading, ResponseError> {
        let response = self.result()?;
        if response.is_extended_telemetry() {
            return Ok(Reading::Extended(ExtendedTelemetry {
                kind: response.telemetry_type().unwrap_or(TelemetryType::None),
                value: response.telemetry_value(),
            }));
        }
        if response.is_stopped() {
            return Ok(Reading::Telemetry(Telemetry {
                erpm: 0,
                period_us: None,
            }));
        }
        Ok(Reading::Telemetry(Telemetry::from_period(u32::from(
            response.period_micros(),
        ))))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::from_error(ResponseError::None)
    }
}

impl From<ResponseError> for Response {
    fn from(error: ResponseError) -> Self {
        Self::from_error(error)
    }
}

impl From<Response> for u16 {
    fn from(response: Response) -> Self {
        response.period_micros()
    }
}

/// An eRPM reply in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    /// Zero while stopped.
    pub erpm: u32,
    /// Electrical revolution period; `None` while stopped.
    pub period_us: Option<u32>,
}

impl Telemetry {
    #[must_use]
    pub const fn from_period(period_us: u32) -> Self {
        if period_us == 0 {
            return Self {
                erpm: 0,
                period_us: None,
            };
        }
        Self {
            erpm: 60_000_000 / period_us,
            period_us: Some(period_us),
        }
    }

    /// Whole mechanical RPM, with `pole_pairs` counted as in
    /// [`Response::rpm`]. `None` for zero pole pairs.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn rpm(&self, pole_pairs: u8) -> Option<u32> {
        self.erpm.checked_div(pole_pairs as u32)
    }
}

/// A typed EDT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtendedTelemetry {
    pub kind: TelemetryType,
    pub value: u8,
}

impl ExtendedTelemetry {
    /// Voltage in millivolts, for [`TelemetryType::Voltage`] frames.
    #[must_use]
    pub const fn millivolts(&self) -> Option<u16> {
        match self.kind {
            TelemetryType::Voltage => Some(self.value as u16 * 250),
            _ => None,
        }
    }
}

/// A successfully decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    Telemetry(Telemetry),
    Extended(ExtendedTelemetry),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_rpm_agrees_with_the_response() {
        // 500 = 0x1F4, the same reply as `rpm_from_period`.
        let response = Response::from_nibbles(0x1, 0xF, 0x4);
        let Ok(Reading::Telemetry(telemetry)) = response.reading() else {
            panic!("expected an eRPM reading");
        };
        assert_eq!(telemetry.erpm, 120_000);
        for pole_pairs in [1, 6, 7, 12] {
            let whole = telemetry.rpm(pole_pairs).unwrap();
            assert_eq!(whole, response.rpm(pole_pairs) as u32, "{pole_pairs}");
        }
    }

    #[test]
    fn stopped_or_unset_motor_has_no_rpm_to_divide() {
        let stopped = Telemetry::from_period(0);
        assert_eq!(stopped.period_us, None);
        assert_eq!(stopped.rpm(7), Some(0));
        assert_eq!(Telemetry::from_period(6000).rpm(0), None);
    }

    #[test]
    fn error_round_trips_through_response() {
        for raw in 0..=7 {
            let error = ResponseError::from_raw(raw).unwrap();
            let response = Response::from(error);
            assert!(response.is_error());
            assert_eq!(response.error(), error);
            assert_eq!(response.result(), Err(error));
        }
        assert_eq!(ResponseError::from_raw(8), None);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ResponseError::ResponseTimeout as u8, 1);
        assert_eq!(ResponseError::BadDecodeFirstNibble as u8, 2);
        assert_eq!(ResponseError::BadChecksum as u8, 6);
        assert_eq!(ResponseError::SamplingOverrun as u8, 7);
    }

    #[test]
    fn stopped_motor() {
        let response = Response::from_nibbles(0xF, 0xF, 0xF);
        assert_eq!(response.to_bytes(), [0xFF, 0x0F]);
        assert!(!response.is_error());
        assert!(response.is_stopped());
        assert!(!response.is_extended_telemetry());
        assert_eq!(
            response.reading(),
            Ok(Reading::Telemetry(Telemetry {
                erpm: 0,
                period_us: None
            }))
        );
    }

    #[test]
    fn period_from_base_and_exponent() {
        // eee = 010, x = 1, base = 0x100
        let response = Response::from_nibbles(0b0101, 0x0, 0x0);
        assert_eq!(response.base(), 256);
        assert_eq!(response.exponent(), 2);
        assert_eq!(response.period_micros(), 1024);
        assert_eq!(u16::from(response), 1024);
    }

    #[test]
    fn rpm_from_period() {
        // 500 = 0x1F4: x = 1, base low byte 0xF4, exponent 0
        let response = Response::from_nibbles(0x1, 0xF, 0x4);
        assert_eq!(response.period_micros(), 500);
        let rpm = response.rpm(7);
        assert!((rpm - 17_142.857).abs() < 0.01, "{rpm}");
        assert!((response.rpm(1) - 120_000.0).abs() < 0.5);
        assert_eq!(
            response.reading(),
            Ok(Reading::Telemetry(Telemetry::from_period(500)))
        );
    }

    #[cfg(feature = "edt")]
    #[test]
    fn extended_telemetry_frames() {
        // Voltage frame: type nibble 0x4, value 0x30 = 48 * 0.25 V
        let response = Response::from_nibbles(0x4, 0x3, 0x0);
        assert!(response.is_extended_telemetry());
        assert_eq!(response.telemetry_type(), Some(TelemetryType::Voltage));
        assert_eq!(response.telemetry_value(), 0x30);
        match response.reading() {
            Ok(Reading::Extended(edt)) => assert_eq!(edt.millivolts(), Some(12_000)),
            other => panic!("unexpected {other:?}"),
        }

        let temperature = Response::from_nibbles(0x2, 0x2, 0x8);
        assert_eq!(
            temperature.reading(),
            Ok(Reading::Extended(ExtendedTelemetry {
                kind: TelemetryType::Temperature,
                value: 40
            }))
        );
    }

    #[cfg(not(feature = "edt"))]
    #[test]
    fn without_edt_low_base_bit_is_plain_period() {
        let response = Response::from_nibbles(0x4, 0x3, 0x0);
        assert!(!response.is_extended_telemetry());
        assert_eq!(response.base(), 0x30);
        assert_eq!(response.period_micros(), 0x30 << 2);
    }

    #[test]
    fn reading_propagates_errors() {
        let response = Response::from_error(ResponseError::BadChecksum);
        assert_eq!(response.reading(), Err(ResponseError::BadChecksum));
        assert_eq!(Response::default().error(), ResponseError::None);
    }
}
