//! Ownership of the shared bus and the project control lines
//!
//! The `uio` lines are shared by three parties:
//! the host (bit-banging QSPI while the device is in reset),
//! the device (once it runs),
//! and the flash/RAMs hanging off them.
//! Every change of ownership goes through [`BusController::set_role`],
//! which refuses transitions that could leave a pin driven from both ends.

use crate::gpio::{Direction, GpioController, Level, Pull};
use crate::pins::{PinRoleMap, Role, GROUP_WIDTH};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineGroup {
    UiIn,
    Uio,
}

/// Who drives a line group
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// Host outputs, used to hold the flash in its idle-read state and to program it
    HostBitbang,
    /// Host inputs, the running device drives the lines
    DeviceDriven,
    /// Host inputs, nobody is expected to drive
    HighZ,
}

/// What drives the project clock pin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    None,
    Gpio,
    Pwm,
}

/// A free-running clock output that can take over a pin
pub trait ClockGenerator {
    /// Route the generator to `pin` and start it at `hz` with a 50% duty cycle
    fn start(&mut self, pin: u8, hz: u32);
    /// Stop the generator and hand `pin` back
    fn stop(&mut self, pin: u8);
}

/// Levels a QSPI flash reads as "no command, continue sequential read",
/// in the order they are driven.
const IDLE_PATTERN: [(Role, Level); GROUP_WIDTH] = [
    (Role::QSPI_SCK, Level::Low),
    (Role::FLASH_SEL, Level::Low),
    (Role::RAM_A_SEL, Level::Low),
    (Role::RAM_B_SEL, Level::Low),
    (Role::QSPI_SD0, Level::High),
    (Role::QSPI_SD1, Level::Low),
    (Role::QSPI_SD2, Level::Low),
    (Role::QSPI_SD3, Level::Low),
];

/// Pull applied to a line while the host is not driving it
///
/// Selects and the UART RX input are pulled up so they don't toggle while floating;
/// the QSPI data and clock lines are left alone, the device drives them once released.
pub fn release_pull(role: Role) -> Pull {
    match role {
        Role::UiIn(7) => Pull::Up,
        Role::UiIn(_) => Pull::None,
        Role::FLASH_SEL | Role::RAM_A_SEL | Role::RAM_B_SEL => Pull::Up,
        Role::Uio(_) => Pull::None,
        Role::ProjectClk | Role::ProjectRstN => Pull::Down,
    }
}

/// Idle-read level of a `uio` line
pub fn idle_level(role: Role) -> Option<Level> {
    IDLE_PATTERN
        .iter()
        .find(|(r, _)| *r == role)
        .map(|&(_, level)| level)
}

pub struct BusController<G> {
    gpio: G,
    pins: PinRoleMap,
    ui_in: Option<BusState>,
    uio: Option<BusState>,
    clock: ClockSource,
}

impl<G: GpioController> BusController<G> {
    /// Take over the pins without touching them
    ///
    /// Both groups start out unconfigured; the first request has to be [`BusState::HighZ`].
    pub fn new(gpio: G, pins: PinRoleMap) -> Self {
        Self {
            gpio,
            pins,
            ui_in: None,
            uio: None,
            clock: ClockSource::None,
        }
    }

    pub fn pins(&self) -> &PinRoleMap {
        &self.pins
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    /// Current owner of `group`, `None` until it is first configured
    pub fn state(&self, group: LineGroup) -> Option<BusState> {
        match group {
            LineGroup::UiIn => self.ui_in,
            LineGroup::Uio => self.uio,
        }
    }

    pub fn clock_source(&self) -> ClockSource {
        self.clock
    }

    /// Whether `group` may move from `from` to `to`
    ///
    /// The host may only take the bus while nobody drives it,
    /// and only the `uio` group can be driven by the host at all.
    pub fn transition_allowed(group: LineGroup, from: Option<BusState>, to: BusState) -> bool {
        use BusState::*;
        match (group, from, to) {
            (LineGroup::UiIn, _, HostBitbang) => false,
            (_, None, HighZ) => true,
            (_, Some(HighZ), HostBitbang | DeviceDriven) => true,
            (_, Some(HostBitbang), DeviceDriven | HighZ) => true,
            (_, Some(DeviceDriven), HighZ) => true,
            _ => false,
        }
    }

    /// Hand every pin of `group` to `state`
    ///
    /// Panics, before touching any pin, on a transition [`Self::transition_allowed`] rejects:
    /// that is a sequencing bug, not something to recover from.
    pub fn set_role(&mut self, group: LineGroup, state: BusState) {
        let from = self.state(group);
        if !Self::transition_allowed(group, from, state) {
            panic!("bus contract violation: {:?} {:?} -> {:?}", group, from, state);
        }
        debug!("bus {:?}: {:?} -> {:?}", group, from, state);

        match state {
            BusState::HostBitbang => {
                for &(role, level) in IDLE_PATTERN.iter() {
                    let pin = self.pins.pin(role);
                    // The output latch is loaded before the driver turns on
                    self.gpio.write_level(pin, level);
                    self.gpio.configure_pull(pin, Pull::None);
                    self.gpio.configure_direction(pin, Direction::Output);
                }
            }
            BusState::DeviceDriven | BusState::HighZ => {
                let roles: [Role; GROUP_WIDTH] = match group {
                    LineGroup::UiIn => core::array::from_fn(|i| Role::UiIn(i as u8)),
                    LineGroup::Uio => core::array::from_fn(|i| Role::Uio(i as u8)),
                };
                for role in roles {
                    let pin = self.pins.pin(role);
                    // Pull first, so the line never floats once the driver lets go
                    self.gpio.configure_pull(pin, release_pull(role));
                    self.gpio.configure_direction(pin, Direction::Input);
                }
            }
        }

        match group {
            LineGroup::UiIn => self.ui_in = Some(state),
            LineGroup::Uio => self.uio = Some(state),
        }
    }

    /// Re-drive the idle-read pattern onto the flash bus
    ///
    /// Only valid while the host owns the bus.
    pub fn drive_idle_pattern(&mut self) {
        assert_eq!(
            self.uio,
            Some(BusState::HostBitbang),
            "idle pattern needs the host to own the bus"
        );
        for &(role, level) in IDLE_PATTERN.iter() {
            self.gpio.write_level(self.pins.pin(role), level);
        }
    }

    /// Drive the project clock (low) and reset (high, inactive) from GPIO
    pub fn take_control_lines(&mut self) {
        assert_ne!(
            self.clock,
            ClockSource::Pwm,
            "clock pin still belongs to the generator"
        );
        let clk = self.pins.project_clk();
        let rst_n = self.pins.project_rst_n();

        self.gpio.write_level(clk, Level::Low);
        self.gpio.configure_pull(clk, Pull::None);
        self.gpio.configure_direction(clk, Direction::Output);

        self.gpio.write_level(rst_n, Level::High);
        self.gpio.configure_pull(rst_n, Pull::None);
        self.gpio.configure_direction(rst_n, Direction::Output);

        self.clock = ClockSource::Gpio;
    }

    pub fn drive_clock(&mut self, level: Level) {
        assert_eq!(self.clock, ClockSource::Gpio, "clock pin not driven by GPIO");
        self.gpio.write_level(self.pins.project_clk(), level);
    }

    /// One high/low clock cycle with no delay
    pub fn pulse_clock(&mut self) {
        self.drive_clock(Level::High);
        self.drive_clock(Level::Low);
    }

    pub fn assert_reset(&mut self) {
        self.gpio.write_level(self.pins.project_rst_n(), Level::Low);
    }

    pub fn release_reset(&mut self) {
        self.gpio.write_level(self.pins.project_rst_n(), Level::High);
    }

    /// Let `generator` clock the project at `hz`
    pub fn hand_clock_to<C: ClockGenerator>(&mut self, generator: &mut C, hz: u32) {
        assert_eq!(self.clock, ClockSource::Gpio, "clock pin not driven by GPIO");
        generator.start(self.pins.project_clk(), hz);
        self.clock = ClockSource::Pwm;
        debug!("bus clock free-running at {} Hz", hz);
    }

    /// Stop driving clock and reset, parking both as pulled-down inputs
    pub fn release_control_lines<C: ClockGenerator>(&mut self, generator: &mut C) {
        let clk = self.pins.project_clk();
        let rst_n = self.pins.project_rst_n();
        if self.clock == ClockSource::Pwm {
            generator.stop(clk);
        }
        for (role, pin) in [(Role::ProjectRstN, rst_n), (Role::ProjectClk, clk)] {
            self.gpio.configure_pull(pin, release_pull(role));
            self.gpio.configure_direction(pin, Direction::Input);
        }
        self.clock = ClockSource::None;
    }
}
