//! Brings up a TinyQV project and dumps a trace of its first flash accesses
//!
//! The RP2040 holds the project in reset, parks the QSPI flash in its idle-read state,
//! releases reset and samples the shared bus from the first SCK edge on.
//! The trace is printed over RTT.
#![no_std]
#![no_main]

use bsp::entry;
use cortex_m::singleton;
use defmt::*;
use defmt_rtt as _;
use panic_probe as _;

// Provide an alias for our BSP so we can switch targets quickly.
pub(crate) use rp_pico as bsp;

use bsp::hal::{clocks::Clock, dma::DMAExt, pac, pio::PIOExt, pwm, watchdog::Watchdog};
use tinyqv_bringup::{
    config::{CAPTURE_WORDS, SYSTEM_CLOCK_HZ},
    decode, render, Bringup, BringupConfig, Checkpoint, Hooks,
};

mod board;
mod clocks;
mod logic_analyzer;

/// Nobody to ask at a checkpoint, just mark it in the log
struct LoggedCheckpoints;

impl Hooks for LoggedCheckpoints {
    fn checkpoint(&mut self, checkpoint: Checkpoint) {
        info!("checkpoint: {}", checkpoint);
    }
}

/// Buffers text until a newline, then logs it as one message
struct RttLines {
    buf: [u8; 1300],
    len: usize,
}

impl RttLines {
    const fn new() -> Self {
        Self {
            buf: [0; 1300],
            len: 0,
        }
    }

    fn flush(&mut self) {
        if self.len > 0 {
            let line = core::str::from_utf8(&self.buf[..self.len]).unwrap_or("<garbled>");
            info!("{=str}", line);
            self.len = 0;
        }
    }
}

impl core::fmt::Write for RttLines {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                self.flush();
                continue;
            }
            if self.len == self.buf.len() {
                self.flush();
            }
            self.buf[self.len] = b;
            self.len += 1;
        }
        Ok(())
    }
}

#[entry]
fn main() -> ! {
    info!("Program start");
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);

    let clocks = clocks::init_clocks_and_plls(
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let sys_hz = clocks.system_clock.freq().to_Hz();
    assert_eq!(sys_hz, SYSTEM_CLOCK_HZ);

    let delay = cortex_m::delay::Delay::new(core.SYST, sys_hz);

    let gpio = board::Rp2040Gpio::new(pac.SIO, pac.IO_BANK0, pac.PADS_BANK0, &mut pac.RESETS);
    let pwm_slices = pwm::Slices::new(pac.PWM, &mut pac.RESETS);
    let bus_clock = board::PwmClock::new(pwm_slices.pwm0);

    let config = BringupConfig::board();
    let (pio1, pio1_sm0, _, _, _) = pac.PIO1.split(&mut pac.RESETS);
    let dma = pac.DMA.split(&mut pac.RESETS);
    let buf = singleton!(: [u32; CAPTURE_WORDS] = [0; CAPTURE_WORDS]).unwrap();
    let analyzer = logic_analyzer::PioCapture::new(
        pio1,
        pio1_sm0,
        dma.ch0,
        buf,
        config.pins.sample_base(),
    );

    let mut bringup = unwrap!(Bringup::new(
        gpio,
        delay,
        analyzer,
        bus_clock,
        LoggedCheckpoints,
        config,
    ));

    match bringup.run() {
        Ok(()) => {
            if let Some(capture) = bringup.capture() {
                let mut out = RttLines::new();
                if render::render(&mut out, &decode(capture), &config.pins).is_err() {
                    warn!("trace dump failed");
                }
                out.flush();
            }
            unwrap!(bringup.stop());
        }
        Err(e) => error!("bring-up failed in {}: {}", bringup.stage(), e),
    }

    loop {
        cortex_m::asm::wfi();
    }
}

// End of file
