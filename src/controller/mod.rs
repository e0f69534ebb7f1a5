//! Decision policies that turn a temperature reading into a heater duty.

use crate::thermometer::Temperature;

pub mod hysteresis;
pub mod pid;

pub use self::{hysteresis::Hysteresis, pid::PidController};

pub trait Controller {
    /// Run the controller for a single tick
    ///
    /// Returns 0 if the heater should be completely off, 255 if it should be completely on, or
    /// somewhere in between. `None` keeps whatever the output currently is.
    fn run(&mut self, temp: Temperature, target: Temperature) -> Option<u8>;

    /// Forget accumulated state. Called whenever the heater is disabled.
    fn reset(&mut self) {}
}

/// The decision policy a build runs with, picked when the controller is constructed.
pub enum Policy {
    Hysteresis(Hysteresis),
    Pid(PidController),
}

impl Controller for Policy {
    fn run(&mut self, temp: Temperature, target: Temperature) -> Option<u8> {
        match self {
            Self::Hysteresis(c) => c.run(temp, target),
            Self::Pid(c) => c.run(temp, target),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Hysteresis(c) => c.reset(),
            Self::Pid(c) => c.reset(),
        }
    }
}

impl From<Hysteresis> for Policy {
    fn from(value: Hysteresis) -> Self {
        Self::Hysteresis(value)
    }
}

impl From<PidController> for Policy {
    fn from(value: PidController) -> Self {
        Self::Pid(value)
    }
}
