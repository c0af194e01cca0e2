//! Minimal GPIO interface used by the bus controller

/// Logic level of a pin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Pin-number addressed GPIO access
///
/// Every call takes effect before it returns:
/// a pull change is visible to the next read,
/// a level written while the pin is an input is what the pin drives once it becomes an output.
pub trait GpioController {
    fn configure_direction(&mut self, pin: u8, direction: Direction);
    fn configure_pull(&mut self, pin: u8, pull: Pull);
    fn read_level(&self, pin: u8) -> Level;
    fn write_level(&mut self, pin: u8, level: Level);
}

impl<G: GpioController + ?Sized> GpioController for &mut G {
    fn configure_direction(&mut self, pin: u8, direction: Direction) {
        (**self).configure_direction(pin, direction)
    }

    fn configure_pull(&mut self, pin: u8, pull: Pull) {
        (**self).configure_pull(pin, pull)
    }

    fn read_level(&self, pin: u8) -> Level {
        (**self).read_level(pin)
    }

    fn write_level(&mut self, pin: u8, level: Level) {
        (**self).write_level(pin, level)
    }
}
