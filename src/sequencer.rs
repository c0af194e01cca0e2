//! The bring-up state machine
//!
//! ```text
//! Init -> ResetAssert -> ClockPrime -> FlashWindowOpen -> FlashIdleDrive
//!      -> ClockPulseTrain -> FlashWindowClose -> ResetRelease
//!      -> CaptureArm -> CaptureRun -> CaptureDone
//! ```
//! Every stage has exactly one successor and the sequence never branches.
//! A stage can only be entered from its predecessor,
//! so e.g. arming the capture before the device is out of reset is rejected
//! without touching any hardware.
//! Nothing is retried: if anything went wrong, [`Bringup::restart`] and run again.

use embedded_hal::blocking::delay::DelayMs;

use crate::bus::{BusController, BusState, ClockGenerator, ClockSource, LineGroup};
use crate::capture::{
    wait_for_completion, wait_for_completion_within, CaptureBuffer, CaptureEngine, CaptureError,
};
use crate::config::{BringupConfig, Completion, ConfigError};
use crate::gpio::{GpioController, Level};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    Init,
    /// Park the bus, take clock and reset, two stray clock edges, assert reset
    ResetAssert,
    /// One slow clock cycle before the flash bus is touched
    ClockPrime,
    /// Host takes the flash bus; the flash loader runs here
    FlashWindowOpen,
    /// Drive the QSPI idle-read pattern
    FlashIdleDrive,
    /// Slow clock cycles with the idle pattern held
    ClockPulseTrain,
    /// Bus goes back to the device; the bitstream loader runs here
    FlashWindowClose,
    /// Device out of reset, clock parked low
    ResetRelease,
    /// Sampler waiting on the trigger
    CaptureArm,
    /// Bus clock free-running, waiting for the DMA budget to drain
    CaptureRun,
    /// Sampler torn down, buffer available
    CaptureDone,
}

impl Stage {
    /// Every stage, in sequence order
    pub const ORDER: [Stage; 11] = [
        Stage::Init,
        Stage::ResetAssert,
        Stage::ClockPrime,
        Stage::FlashWindowOpen,
        Stage::FlashIdleDrive,
        Stage::ClockPulseTrain,
        Stage::FlashWindowClose,
        Stage::ResetRelease,
        Stage::CaptureArm,
        Stage::CaptureRun,
        Stage::CaptureDone,
    ];

    /// The only stage that may follow this one
    pub const fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::ResetAssert),
            Stage::ResetAssert => Some(Stage::ClockPrime),
            Stage::ClockPrime => Some(Stage::FlashWindowOpen),
            Stage::FlashWindowOpen => Some(Stage::FlashIdleDrive),
            Stage::FlashIdleDrive => Some(Stage::ClockPulseTrain),
            Stage::ClockPulseTrain => Some(Stage::FlashWindowClose),
            Stage::FlashWindowClose => Some(Stage::ResetRelease),
            Stage::ResetRelease => Some(Stage::CaptureArm),
            Stage::CaptureArm => Some(Stage::CaptureRun),
            Stage::CaptureRun => Some(Stage::CaptureDone),
            Stage::CaptureDone => None,
        }
    }
}

/// Points where an operator may want to look at the board before the sequence moves on
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Checkpoint {
    /// Before anything is driven
    Reset,
    /// Capture armed, before the bus clock starts
    Start,
    /// Capture done, before clock and reset are released
    Stop,
}

/// Caller-supplied steps around the core sequence
///
/// All of them default to doing nothing.
pub trait Hooks {
    /// Synchronous barrier; return to continue
    fn checkpoint(&mut self, _checkpoint: Checkpoint) {}

    /// Write the external flash.
    ///
    /// Runs with the device in reset and the host owning the `uio` bus;
    /// the idle pattern is driven again afterwards.
    fn program_flash<G: GpioController>(&mut self, _bus: &mut BusController<G>) {}

    /// Configure the programmable device.
    ///
    /// Runs after the bus went back to the device and before reset is released.
    fn program_device<G: GpioController>(&mut self, _bus: &mut BusController<G>) {}
}

/// No operator, no loaders
#[derive(Copy, Clone, Debug, Default)]
pub struct Unattended;

impl Hooks for Unattended {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
    /// `to` does not follow `from`
    OutOfOrder { from: Stage, to: Stage },
    /// Already in [`Stage::CaptureDone`]
    Finished,
    /// Only valid once the capture is done
    NotFinished(Stage),
    Capture(CaptureError),
}

impl From<CaptureError> for SequenceError {
    fn from(e: CaptureError) -> Self {
        SequenceError::Capture(e)
    }
}

pub struct Bringup<G, D, E: CaptureEngine, C, H> {
    bus: BusController<G>,
    delay: D,
    engine: E,
    clock: C,
    hooks: H,
    config: BringupConfig,
    stage: Stage,
    armed: Option<E::Handle>,
    capture: Option<CaptureBuffer>,
}

impl<G, D, E, C, H> Bringup<G, D, E, C, H>
where
    G: GpioController,
    D: DelayMs<u32>,
    E: CaptureEngine,
    C: ClockGenerator,
    H: Hooks,
{
    /// Check `config` and take the hardware, in [`Stage::Init`]
    pub fn new(
        gpio: G,
        delay: D,
        engine: E,
        clock: C,
        hooks: H,
        config: BringupConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bus: BusController::new(gpio, config.pins),
            delay,
            engine,
            clock,
            hooks,
            config,
            stage: Stage::Init,
            armed: None,
            capture: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &BringupConfig {
        &self.config
    }

    pub fn bus(&self) -> &BusController<G> {
        &self.bus
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The capture, once [`Stage::CaptureDone`] is reached
    pub fn capture(&self) -> Option<&CaptureBuffer> {
        self.capture.as_ref()
    }

    pub fn take_capture(&mut self) -> Option<CaptureBuffer> {
        self.capture.take()
    }

    /// Advance to the next stage
    pub fn step(&mut self) -> Result<Stage, SequenceError> {
        let next = self.stage.next().ok_or(SequenceError::Finished)?;
        self.enter(next)?;
        Ok(next)
    }

    /// Step until the capture is done
    pub fn run(&mut self) -> Result<(), SequenceError> {
        while self.stage != Stage::CaptureDone {
            self.step()?;
        }
        Ok(())
    }

    /// Perform `to`, which has to be the successor of the current stage
    ///
    /// On error the stage is unchanged,
    /// except for a timed-out [`Stage::CaptureRun`]:
    /// the bus clock is already running by then, so the machine stays in it and
    /// entering [`Stage::CaptureDone`] tears down the partial capture.
    pub fn enter(&mut self, to: Stage) -> Result<(), SequenceError> {
        if self.stage.next() != Some(to) {
            warn!("bring-up: rejected {:?} -> {:?}", self.stage, to);
            return Err(SequenceError::OutOfOrder {
                from: self.stage,
                to,
            });
        }
        info!("bring-up: {:?}", to);

        let timing = self.config.timing;
        match to {
            Stage::Init => unreachable!(),
            Stage::ResetAssert => {
                self.hooks.checkpoint(Checkpoint::Reset);
                for group in [LineGroup::UiIn, LineGroup::Uio] {
                    if self.bus.state(group) != Some(BusState::HighZ) {
                        self.bus.set_role(group, BusState::HighZ);
                    }
                }
                self.bus.take_control_lines();
                // The device may latch on clock edges even before reset
                for _ in 0..timing.pre_reset_edges {
                    self.bus.pulse_clock();
                }
                self.bus.assert_reset();
            }
            Stage::ClockPrime => {
                self.bus.drive_clock(Level::High);
                self.delay.delay_ms(timing.settle_ms);
                self.bus.drive_clock(Level::Low);
                self.delay.delay_ms(timing.settle_ms);
            }
            Stage::FlashWindowOpen => {
                self.bus.set_role(LineGroup::Uio, BusState::HostBitbang);
                self.hooks.program_flash(&mut self.bus);
            }
            Stage::FlashIdleDrive => {
                self.bus.drive_idle_pattern();
            }
            Stage::ClockPulseTrain => {
                for _ in 0..timing.pulse_train_edges {
                    self.bus.drive_clock(Level::Low);
                    self.delay.delay_ms(timing.pulse_train_delay_ms);
                    self.bus.drive_clock(Level::High);
                    self.delay.delay_ms(timing.pulse_train_delay_ms);
                }
            }
            Stage::FlashWindowClose => {
                self.bus.set_role(LineGroup::Uio, BusState::DeviceDriven);
                self.hooks.program_device(&mut self.bus);
            }
            Stage::ResetRelease => {
                self.bus.release_reset();
                self.delay.delay_ms(timing.settle_ms);
                self.bus.drive_clock(Level::Low);
            }
            Stage::CaptureArm => {
                let handle = self.engine.arm(&self.config.capture)?;
                self.armed = Some(handle);
                self.hooks.checkpoint(Checkpoint::Start);
            }
            Stage::CaptureRun => {
                self.stage = Stage::CaptureRun;
                self.delay.delay_ms(timing.settle_ms);
                self.bus.hand_clock_to(&mut self.clock, self.config.bus_clock_hz);
                if let Some(handle) = self.armed.as_ref() {
                    match self.config.completion {
                        Completion::Unbounded => {
                            wait_for_completion(handle, &mut self.delay, timing.poll_interval_ms)
                        }
                        Completion::Within(limit_ms) => wait_for_completion_within(
                            handle,
                            &mut self.delay,
                            timing.poll_interval_ms,
                            limit_ms,
                        )?,
                    }
                }
            }
            Stage::CaptureDone => {
                if let Some(handle) = self.armed.take() {
                    let buffer = self.engine.disarm(handle);
                    if buffer.is_complete() {
                        info!("capture complete");
                    } else {
                        warn!("capture torn down before completion");
                    }
                    self.capture = Some(buffer);
                }
            }
        }

        self.stage = to;
        Ok(())
    }

    /// Release clock and reset after a finished run
    pub fn stop(&mut self) -> Result<(), SequenceError> {
        if self.stage != Stage::CaptureDone {
            return Err(SequenceError::NotFinished(self.stage));
        }
        self.hooks.checkpoint(Checkpoint::Stop);
        self.bus.release_control_lines(&mut self.clock);
        info!("bring-up: clock and reset released");
        Ok(())
    }

    /// Abandon the current run and go back to [`Stage::Init`]
    ///
    /// An armed capture is torn down and discarded, a running bus clock is stopped.
    pub fn restart(&mut self) {
        warn!("bring-up: restart from {:?}", self.stage);
        if let Some(handle) = self.armed.take() {
            let _ = self.engine.disarm(handle);
        }
        if self.bus.clock_source() == ClockSource::Pwm {
            self.bus.release_control_lines(&mut self.clock);
        }
        self.capture = None;
        self.stage = Stage::Init;
    }
}
