//! RP2040 backends for the pin and clock abstractions
//!
//! The bring-up sequence addresses pins by number and flips them between roles at runtime,
//! which the type-state pins of the HAL are not made for.
//! These go straight to the SIO, pad and IO bank registers instead.

use embedded_hal::PwmPin;
use tinyqv_bringup::{config::bus_clock_pwm, ClockGenerator, Direction, GpioController, Level, Pull};

use crate::bsp::hal::{
    pac,
    pwm::{FreeRunning, Pwm0, Slice},
};

/// `IO_BANK0` function select values
const FUNCSEL_PWM: u8 = 4;
const FUNCSEL_SIO: u8 = 5;

/// Bank 0 GPIOs through SIO
pub(crate) struct Rp2040Gpio {
    sio: pac::SIO,
    io: pac::IO_BANK0,
    pads: pac::PADS_BANK0,
}

impl Rp2040Gpio {
    /// Bring the IO and pad banks out of reset
    pub(crate) fn new(
        sio: pac::SIO,
        io: pac::IO_BANK0,
        pads: pac::PADS_BANK0,
        resets: &mut pac::RESETS,
    ) -> Self {
        resets
            .reset
            .modify(|_, w| w.io_bank0().clear_bit().pads_bank0().clear_bit());
        while resets.reset_done.read().io_bank0().bit_is_clear()
            || resets.reset_done.read().pads_bank0().bit_is_clear()
        {}
        Self { sio, io, pads }
    }
}

impl GpioController for Rp2040Gpio {
    fn configure_direction(&mut self, pin: u8, direction: Direction) {
        let mask = 1 << pin;
        match direction {
            Direction::Output => {
                self.pads.gpio[usize::from(pin)]
                    .modify(|_, w| w.ie().set_bit().od().clear_bit());
                self.io.gpio[usize::from(pin)]
                    .gpio_ctrl
                    .write(|w| unsafe { w.funcsel().bits(FUNCSEL_SIO) });
                self.sio.gpio_oe_set.write(|w| unsafe { w.bits(mask) });
            }
            Direction::Input => {
                self.sio.gpio_oe_clr.write(|w| unsafe { w.bits(mask) });
                self.io.gpio[usize::from(pin)]
                    .gpio_ctrl
                    .write(|w| unsafe { w.funcsel().bits(FUNCSEL_SIO) });
                self.pads.gpio[usize::from(pin)].modify(|_, w| w.ie().set_bit());
            }
        }
    }

    fn configure_pull(&mut self, pin: u8, pull: Pull) {
        let (up, down) = match pull {
            Pull::None => (false, false),
            Pull::Up => (true, false),
            Pull::Down => (false, true),
        };
        self.pads.gpio[usize::from(pin)].modify(|_, w| w.pue().bit(up).pde().bit(down));
    }

    fn read_level(&self, pin: u8) -> Level {
        Level::from((self.sio.gpio_in.read().bits() >> pin) & 1 != 0)
    }

    fn write_level(&mut self, pin: u8, level: Level) {
        let mask = 1 << pin;
        match level {
            Level::High => self.sio.gpio_out_set.write(|w| unsafe { w.bits(mask) }),
            Level::Low => self.sio.gpio_out_clr.write(|w| unsafe { w.bits(mask) }),
        }
    }
}

/// Bus clock from PWM slice 0, channel A
///
/// That is GPIO 0 or 16.
///
/// Counts at *SYSCLK*, which has to run at [`tinyqv_bringup::config::SYSTEM_CLOCK_HZ`].
pub(crate) struct PwmClock {
    slice: Slice<Pwm0, FreeRunning>,
}

impl PwmClock {
    pub(crate) fn new(mut slice: Slice<Pwm0, FreeRunning>) -> Self {
        slice.default_config();
        slice.disable();
        Self { slice }
    }

    fn route(pin: u8, funcsel: u8) {
        // SAFETY: the bus controller hands the clock pin over exclusively for the
        // duration of `start`/`stop`, nothing else writes its control register meanwhile.
        let io = unsafe { &*pac::IO_BANK0::ptr() };
        io.gpio[usize::from(pin)]
            .gpio_ctrl
            .write(|w| unsafe { w.funcsel().bits(funcsel) });
    }
}

impl ClockGenerator for PwmClock {
    fn start(&mut self, pin: u8, hz: u32) {
        assert!(
            pin & 0b1111 == 0,
            "pin {} is not on PWM slice 0 channel A",
            pin
        );
        // One counter step per SYSCLK cycle, high for the first half of the period
        let (top, compare) = defmt::unwrap!(bus_clock_pwm(hz));
        self.slice.set_div_int(1);
        self.slice.set_div_frac(0);
        self.slice.set_top(top);
        self.slice.channel_a.set_duty(compare);
        Self::route(pin, FUNCSEL_PWM);
        self.slice.enable();
    }

    fn stop(&mut self, pin: u8) {
        self.slice.disable();
        Self::route(pin, FUNCSEL_SIO);
    }
}
