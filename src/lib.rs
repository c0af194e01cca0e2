//! Bring-up and logic capture for a TinyQV-style device on a shared QSPI bus
//!
//! The host (an RP2040) owns a bus that is multiplexed between two parties:
//! - while the device is held in reset, the host bit-bangs the QSPI lines
//!   to keep the external flash passive and program it;
//! - once reset is released, the device drives the bus itself and the host
//!   only snoops it with a PIO sampler feeding a DMA channel.
//!
//! Everything in this crate is hardware independent.
//! Pins are reached through [`gpio::GpioController`],
//! the sampler through [`capture::CaptureEngine`],
//! and time through the `embedded-hal` delay traits.
//! The firmware binary provides RP2040 implementations of all three.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod capture;
pub mod config;
pub mod decode;
pub mod gpio;
pub mod pins;
pub mod render;
pub mod sequencer;

#[cfg(test)]
mod sim;

pub use bus::{BusController, BusState, ClockGenerator, ClockSource, LineGroup};
pub use capture::{CaptureBuffer, CaptureConfig, CaptureEngine, CaptureError, CaptureHandle};
pub use config::{BringupConfig, Completion, ConfigError, Timing};
pub use decode::{decode, decode_nibble, DecodedWaveform};
pub use gpio::{Direction, GpioController, Level, Pull};
pub use pins::{PinRoleMap, Role};
pub use sequencer::{Bringup, Checkpoint, Hooks, SequenceError, Stage, Unattended};
