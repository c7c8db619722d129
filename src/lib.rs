#![no_std]
#![cfg_attr(
    all(feature = "avr", target_arch = "avr"),
    feature(asm_experimental_arch, abi_avr_interrupt)
)]

#[macro_use]
mod fmt;

pub mod bitbang;
pub mod command;
pub mod config;
#[cfg(any(test, all(feature = "avr", target_arch = "avr")))]
pub mod enable_mask;
pub mod gcr;
pub mod pulsed_output;
pub mod receiver;
pub mod sampler;
pub mod timing;
pub mod traits;
pub mod types;

#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod avr;

pub use bitbang::{BidirDshot, Dshot};
pub use command::{Command, SpecialCommand};
pub use dshot_frame::Command as FrameCommand;
pub use config::{Config, Nominal16MHz, Nominal8MHz};
pub use sampler::Sampler;
pub use timing::DshotSpeed;
pub use traits::{CallerManaged, CycleDelay, EscDriver, InterruptControl, PulseTimer, SignalPin};
pub use types::{ExtendedTelemetry, Reading, Response, ResponseError, Telemetry, TelemetryType};

/// One-way frame: idles low, pulses high.
pub type NormalCommand = Command<false>;
/// Bidirectional frame: idles high, pulses low, CRC inverted.
pub type BidirCommand = Command<true>;
