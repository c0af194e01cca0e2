//! Trigger-synchronized parallel capture
//!
//! The sampler reads eight adjacent bus pins once per sample clock and packs four samples per
//! 32-bit word.
//! A DMA channel moves the words into the capture buffer until its budget runs out,
//! which is the only completion signal there is.
//! Nothing is sampled until the trigger line reaches its level,
//! so the capture window always starts at a known bus event.

use embedded_hal::blocking::delay::DelayMs;

use crate::config::{ConfigError, CAPTURE_LEN, CAPTURE_WORDS};
use crate::gpio::Level;
use crate::pins::{PinRoleMap, Role};

/// Bits per sample, one per monitored line
pub const SAMPLE_WIDTH_BITS: u32 = 8;

/// Bits per word pushed by the sampler
pub const PACK_WIDTH_BITS: u32 = 32;

const BYTES_PER_WORD: usize = (PACK_WIDTH_BITS / 8) as usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    /// The bounded wait ran out before the DMA budget did
    Timeout,
    /// The engine is already armed
    Busy,
    /// The sampler program doesn't fit in instruction memory
    ProgramSpace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureConfig {
    sample_count: u32,
    trigger_pin: u8,
    trigger_level: Level,
}

impl CaptureConfig {
    /// `sample_count` is in words and has to fill the capture buffer exactly
    pub fn new(
        pins: &PinRoleMap,
        sample_count: u32,
        trigger_pin: u8,
        trigger_level: Level,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            sample_count,
            trigger_pin,
            trigger_level,
        };
        config.validate(pins)?;
        Ok(config)
    }

    /// A full buffer, starting when QSPI SCK first goes high
    pub fn on_rising_sck(pins: &PinRoleMap) -> Self {
        Self {
            sample_count: CAPTURE_WORDS as u32,
            trigger_pin: pins.pin(Role::QSPI_SCK),
            trigger_level: Level::High,
        }
    }

    pub fn validate(&self, pins: &PinRoleMap) -> Result<(), ConfigError> {
        let buffer_len = self.buffer_len_bytes();
        if buffer_len != CAPTURE_LEN || buffer_len % BYTES_PER_WORD != 0 {
            return Err(ConfigError::SampleCountMismatch {
                sample_count: self.sample_count,
                buffer_len: CAPTURE_LEN,
            });
        }
        if pins.sample_bit(self.trigger_pin).is_none() {
            return Err(ConfigError::TriggerNotSampled {
                pin: self.trigger_pin,
            });
        }
        Ok(())
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn trigger_pin(&self) -> u8 {
        self.trigger_pin
    }

    pub fn trigger_level(&self) -> Level {
        self.trigger_level
    }

    pub fn sample_width_bits(&self) -> u32 {
        SAMPLE_WIDTH_BITS
    }

    pub fn pack_width_bits(&self) -> u32 {
        PACK_WIDTH_BITS
    }

    pub fn buffer_len_bytes(&self) -> usize {
        self.sample_count as usize * BYTES_PER_WORD
    }
}

/// One byte per sample instant, bit `i` is monitored line `i`
///
/// Only a buffer whose DMA budget ran out is complete;
/// a torn-down capture keeps whatever arrived and zeroes after that.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureBuffer {
    bytes: [u8; CAPTURE_LEN],
    complete: bool,
}

impl CaptureBuffer {
    /// The zero-filled buffer a capture starts from
    pub const fn new() -> Self {
        Self {
            bytes: [0; CAPTURE_LEN],
            complete: false,
        }
    }

    pub fn from_bytes(bytes: [u8; CAPTURE_LEN], complete: bool) -> Self {
        Self { bytes, complete }
    }

    /// Unpack DMA words, first sample in the low byte of each word
    pub fn from_words(words: &[u32; CAPTURE_WORDS], complete: bool) -> Self {
        let mut bytes = [0; CAPTURE_LEN];
        for (chunk, word) in bytes.chunks_exact_mut(BYTES_PER_WORD).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self { bytes, complete }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// An armed capture
pub trait CaptureHandle {
    /// Whether the DMA budget has run out
    ///
    /// Until the trigger fires this stays false.
    fn is_done(&self) -> bool;
}

/// A sampler plus the DMA channel draining it
pub trait CaptureEngine {
    type Handle: CaptureHandle;

    /// Zero the buffer, load the word budget and install the trigger wait.
    ///
    /// The sampler is running when this returns, parked on the trigger;
    /// the bus clock must not free-run before that.
    fn arm(&mut self, config: &CaptureConfig) -> Result<Self::Handle, CaptureError>;

    /// Stop the sampler and hand out the buffer
    ///
    /// A capture that is not done is aborted and comes back incomplete.
    fn disarm(&mut self, handle: Self::Handle) -> CaptureBuffer;
}

/// Poll `handle` until the capture completes.
///
/// There is no timeout: if the trigger never arrives this never returns.
/// Use [`wait_for_completion_within`] where that is not acceptable.
pub fn wait_for_completion<H, D>(handle: &H, delay: &mut D, interval_ms: u32)
where
    H: CaptureHandle,
    D: DelayMs<u32>,
{
    while !handle.is_done() {
        delay.delay_ms(interval_ms);
    }
}

/// Like [`wait_for_completion`], giving up after about `limit_ms`
pub fn wait_for_completion_within<H, D>(
    handle: &H,
    delay: &mut D,
    interval_ms: u32,
    limit_ms: u32,
) -> Result<(), CaptureError>
where
    H: CaptureHandle,
    D: DelayMs<u32>,
{
    let mut waited = 0u32;
    while !handle.is_done() {
        if waited >= limit_ms {
            warn!("capture not done after {} ms", waited);
            return Err(CaptureError::Timeout);
        }
        delay.delay_ms(interval_ms);
        waited = waited.saturating_add(interval_ms.max(1));
    }
    Ok(())
}
