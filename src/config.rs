//! Board-wide constants and the tunables of a bring-up run

use crate::capture::CaptureConfig;
use crate::pins::{PinRoleMap, Role};

/// *SYSCLK* during bring-up and capture
pub const SYSTEM_CLOCK_HZ: u32 = 80_000_000;

/// Default frequency of the free-running project clock during capture
pub const BUS_CLOCK_HZ: u32 = 40_000_000;

/// The sampler runs undivided, one sample per *SYSCLK* cycle
pub const SAMPLE_CLOCK_HZ: u32 = SYSTEM_CLOCK_HZ;

/// Longest PWM period at divider 1, the counter is 16 bits wide
pub const PWM_MAX_PERIOD: u32 = 1 << 16;

/// Capture buffer size
pub const CAPTURE_LEN: usize = 1280;

/// DMA word budget for a full buffer
pub const CAPTURE_WORDS: usize = CAPTURE_LEN / 4;

// The bus clock comes from a PWM slice counting SYSCLK cycles,
// so it has to be an integer fraction of SYSCLK with an even period for a 50% duty cycle.
const _: () = assert!(SYSTEM_CLOCK_HZ % BUS_CLOCK_HZ == 0);
const _: () = assert!((SYSTEM_CLOCK_HZ / BUS_CLOCK_HZ) % 2 == 0);
const _: () = assert!(SYSTEM_CLOCK_HZ / BUS_CLOCK_HZ <= PWM_MAX_PERIOD);
const _: () = assert!(CAPTURE_LEN % 4 == 0);

/// Configuration contract violations
///
/// These are all detected before any pin is touched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    PinOutOfRange { role: Role, pin: u8 },
    DuplicatePin { pin: u8, first: Role, second: Role },
    /// The sampler needs eight adjacent pins
    NonContiguousSampleLines,
    /// The trigger has to be one of the sampled bus lines
    TriggerNotSampled { pin: u8 },
    /// `sample_count` words do not exactly fill the capture buffer
    SampleCountMismatch { sample_count: u32, buffer_len: usize },
    /// The bus clock cannot be derived from *SYSCLK* with a 50% duty cycle
    BusClock { hz: u32 },
}

/// Settling delays and pulse counts of the bring-up sequence
///
/// These encode undocumented settling requirements of the device and the flash.
/// Don't shorten them without checking on hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Manual clock edges issued before reset is asserted
    pub pre_reset_edges: u32,
    /// Delay after each priming edge and after reset release
    pub settle_ms: u32,
    /// Clock cycles issued while the idle pattern is on the flash bus
    pub pulse_train_edges: u32,
    /// Delay between edges of the pulse train
    pub pulse_train_delay_ms: u32,
    /// Interval of the capture completion poll
    pub poll_interval_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            pre_reset_edges: 2,
            settle_ms: 1,
            pulse_train_edges: 10,
            pulse_train_delay_ms: 1,
            poll_interval_ms: 1,
        }
    }
}

/// How long `CAPTURE_RUN` waits for the DMA budget to drain
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Poll until done.
    ///
    /// A trigger that never arrives hangs the caller.
    Unbounded,
    /// Give up after this many milliseconds
    Within(u32),
}

/// Everything a bring-up run needs besides the hardware itself
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BringupConfig {
    pub pins: PinRoleMap,
    pub capture: CaptureConfig,
    pub timing: Timing,
    pub bus_clock_hz: u32,
    pub completion: Completion,
}

impl BringupConfig {
    /// Board defaults: trigger on QSPI SCK going high, 40MHz bus clock, unbounded wait
    pub fn board() -> Self {
        let pins = PinRoleMap::BOARD;
        Self {
            pins,
            capture: CaptureConfig::on_rising_sck(&pins),
            timing: Timing::default(),
            bus_clock_hz: BUS_CLOCK_HZ,
            completion: Completion::Unbounded,
        }
    }

    /// Cross-check the pieces against each other and the clock tree
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate(&self.pins)?;
        bus_clock_pwm(self.bus_clock_hz)?;
        Ok(())
    }
}

/// PWM `(top, compare)` for a 50% duty bus clock of `hz`, counting *SYSCLK* cycles
///
/// The period has to be an even number of cycles that fits the counter.
pub fn bus_clock_pwm(hz: u32) -> Result<(u16, u16), ConfigError> {
    let err = ConfigError::BusClock { hz };
    if hz == 0 || SYSTEM_CLOCK_HZ % hz != 0 {
        return Err(err);
    }
    let period = SYSTEM_CLOCK_HZ / hz;
    if period % 2 != 0 || period > PWM_MAX_PERIOD {
        return Err(err);
    }
    let top = u16::try_from(period - 1).map_err(|_| err)?;
    let compare = u16::try_from(period / 2).map_err(|_| err)?;
    Ok((top, compare))
}
