use crate::thermometer::Temperature;

/// On/off control with a dead band of `band` on either side of the target.
///
/// The heater turns on below `target - band` and off above `target + band`. Inside the band the
/// output is left alone, so the decision depends on which threshold was crossed last.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hysteresis {
    band: Temperature,
}

impl Hysteresis {
    pub fn new(band: impl Into<Temperature>) -> Self {
        Self {
            band: band.into().abs(),
        }
    }

    pub const fn band(&self) -> Temperature {
        self.band
    }
}

impl super::Controller for Hysteresis {
    fn run(&mut self, temp: Temperature, target: Temperature) -> Option<u8> {
        if temp < target.saturating_sub(self.band) {
            Some(u8::MAX)
        } else if temp > target.saturating_add(self.band) {
            Some(0)
        } else {
            None
        }
    }
}
