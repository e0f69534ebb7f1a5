//! Temperature sensor interface

pub mod max6675;

use fixed::types::I28F4;

/// I28F4 is a fixed point number with 4 fractional bits and 28 integer bits.
/// This gives us a precision of 0.0625 degrees Celsius & a range of (-2^27, 2^27 - 0.0625).
pub type Temperature = I28F4;

/// A set of `N` thermocouple channels read together.
pub trait Thermometer<const N: usize> {
    type Error;

    /// Read every channel in degrees Celsius.
    ///
    /// A failing channel does not prevent the others from being read.
    fn read(&mut self) -> [Result<Temperature, Self::Error>; N];
}
