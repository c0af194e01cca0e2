//! Software stand-ins for the RP2040 peripherals, for host tests
//!
//! All of them append to one shared [`Log`] so tests can check the relative order of
//! pin changes, delays, clock hand-offs and capture arming.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::DelayMs;

use crate::bus::ClockGenerator;
use crate::capture::{CaptureBuffer, CaptureConfig, CaptureEngine, CaptureError, CaptureHandle};
use crate::config::CAPTURE_LEN;
use crate::gpio::{Direction, GpioController, Level, Pull};
use crate::pins::BANK0_PINS;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Direction(u8, Direction),
    Pull(u8, Pull),
    Write(u8, Level),
    Delay(u32),
    ClockStart(u8, u32),
    ClockStop(u8),
    Armed,
    Disarmed { complete: bool },
}

pub(crate) type Log = Rc<RefCell<Vec<Event>>>;

pub(crate) fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[derive(Copy, Clone, Debug)]
struct PinState {
    direction: Direction,
    pull: Pull,
    latch: Level,
}

pub(crate) struct SimGpio {
    pins: [PinState; BANK0_PINS as usize],
    log: Log,
}

impl SimGpio {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            // Pad reset state of the part: input, pulled down
            pins: [PinState {
                direction: Direction::Input,
                pull: Pull::Down,
                latch: Level::Low,
            }; BANK0_PINS as usize],
            log: log.clone(),
        }
    }

    pub(crate) fn direction(&self, pin: u8) -> Direction {
        self.pins[usize::from(pin)].direction
    }

    pub(crate) fn pull(&self, pin: u8) -> Pull {
        self.pins[usize::from(pin)].pull
    }
}

impl GpioController for SimGpio {
    fn configure_direction(&mut self, pin: u8, direction: Direction) {
        self.pins[usize::from(pin)].direction = direction;
        self.log.borrow_mut().push(Event::Direction(pin, direction));
    }

    fn configure_pull(&mut self, pin: u8, pull: Pull) {
        self.pins[usize::from(pin)].pull = pull;
        self.log.borrow_mut().push(Event::Pull(pin, pull));
    }

    fn read_level(&self, pin: u8) -> Level {
        let state = &self.pins[usize::from(pin)];
        match state.direction {
            Direction::Output => state.latch,
            // Nothing outside drives the lines, inputs read their pull
            Direction::Input => match state.pull {
                Pull::Up => Level::High,
                Pull::Down | Pull::None => Level::Low,
            },
        }
    }

    fn write_level(&mut self, pin: u8, level: Level) {
        self.pins[usize::from(pin)].latch = level;
        self.log.borrow_mut().push(Event::Write(pin, level));
    }
}

pub(crate) struct SimDelay {
    log: Log,
    pub(crate) elapsed_ms: u32,
}

impl SimDelay {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            elapsed_ms: 0,
        }
    }
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += ms;
        self.log.borrow_mut().push(Event::Delay(ms));
    }
}

pub(crate) struct SimClock {
    log: Log,
    pub(crate) running: Option<u32>,
}

impl SimClock {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            running: None,
        }
    }
}

impl ClockGenerator for SimClock {
    fn start(&mut self, pin: u8, hz: u32) {
        self.running = Some(hz);
        self.log.borrow_mut().push(Event::ClockStart(pin, hz));
    }

    fn stop(&mut self, pin: u8) {
        self.running = None;
        self.log.borrow_mut().push(Event::ClockStop(pin));
    }
}

/// A sampler fed from a repeating byte pattern
///
/// The trigger line is modelled per poll of the handle:
/// it reaches the configured level after `trigger_after` polls, or never.
/// Once triggered, every poll moves `words_per_poll` words into the buffer.
pub(crate) struct SimCapture {
    pattern: Vec<u8>,
    trigger_after: Option<u32>,
    words_per_poll: usize,
    armed: bool,
    log: Log,
    pub(crate) last_config: Option<CaptureConfig>,
}

impl SimCapture {
    pub(crate) fn new(log: &Log, pattern: &[u8]) -> Self {
        Self {
            pattern: pattern.to_vec(),
            trigger_after: Some(0),
            words_per_poll: 64,
            armed: false,
            log: log.clone(),
            last_config: None,
        }
    }

    pub(crate) fn trigger_after(mut self, polls: Option<u32>) -> Self {
        self.trigger_after = polls;
        self
    }
}

struct SimRun {
    bytes: [u8; CAPTURE_LEN],
    words: usize,
    budget: usize,
    pattern: Vec<u8>,
    position: usize,
    trigger_in: Option<u32>,
    triggered: bool,
    words_per_poll: usize,
}

pub(crate) struct SimHandle {
    run: RefCell<SimRun>,
}

impl CaptureHandle for SimHandle {
    fn is_done(&self) -> bool {
        let mut run = self.run.borrow_mut();
        if !run.triggered {
            match run.trigger_in {
                None => return false,
                Some(0) => run.triggered = true,
                Some(n) => {
                    run.trigger_in = Some(n - 1);
                    return false;
                }
            }
        }
        let todo = run.words_per_poll.min(run.budget - run.words);
        for _ in 0..todo * 4 {
            let offset = run.words * 4 + (run.position % 4);
            let sample = run.pattern[run.position % run.pattern.len()];
            run.bytes[offset] = sample;
            run.position += 1;
            if run.position % 4 == 0 {
                run.words += 1;
            }
        }
        run.words == run.budget
    }
}

impl CaptureEngine for SimCapture {
    type Handle = SimHandle;

    fn arm(&mut self, config: &CaptureConfig) -> Result<SimHandle, CaptureError> {
        if self.armed {
            return Err(CaptureError::Busy);
        }
        self.armed = true;
        self.last_config = Some(*config);
        self.log.borrow_mut().push(Event::Armed);
        Ok(SimHandle {
            run: RefCell::new(SimRun {
                bytes: [0; CAPTURE_LEN],
                words: 0,
                budget: config.sample_count() as usize,
                pattern: self.pattern.clone(),
                position: 0,
                trigger_in: self.trigger_after,
                triggered: false,
                words_per_poll: self.words_per_poll,
            }),
        })
    }

    fn disarm(&mut self, handle: SimHandle) -> CaptureBuffer {
        self.armed = false;
        let run = handle.run.into_inner();
        let complete = run.words == run.budget;
        self.log.borrow_mut().push(Event::Disarmed { complete });
        CaptureBuffer::from_bytes(run.bytes, complete)
    }
}
