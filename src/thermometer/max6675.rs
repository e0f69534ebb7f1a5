//! Implementation for the MAX6675 K-type thermocouple converter.
//!
//! The chip is read-only: pulling CS low latches the last conversion and clocks out a 16 bit
//! frame, MSB first.
//!
//! | bit   | meaning                        |
//! |-------|--------------------------------|
//! | 15    | dummy sign bit, always 0       |
//! | 14..3 | temperature, 0.25 °C per count |
//! | 2     | thermocouple input open        |
//! | 1     | device ID, always 0            |
//! | 0     | three-state                    |

use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

use super::{Temperature, Thermometer};

const OPEN_CIRCUIT: u16 = 1 << 2;
const DEVICE_ID: u16 = 1 << 1;
const DUMMY_SIGN: u16 = 1 << 15;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<SpiE, CsE> {
    /// SPI bus error
    Spi(SpiE),

    /// Chip select pin error
    ChipSelect(CsE),

    /// No thermocouple is attached to the converter
    OpenCircuit,

    /// The frame had bits set that the chip always clears. Usually MISO is floating because the
    /// converter is missing or unpowered.
    NotPresent,
}

impl<SpiE, CsE> Error<SpiE, CsE> {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spi(_) => "SPI error",
            Self::ChipSelect(_) => "Chip select error",
            Self::OpenCircuit => "Thermocouple open",
            Self::NotPresent => "Converter not present",
        }
    }
}

/// Decode a raw frame into a temperature.
pub fn decode<SpiE, CsE>(frame: u16) -> Result<Temperature, Error<SpiE, CsE>> {
    if frame & (DUMMY_SIGN | DEVICE_ID) != 0 {
        return Err(Error::NotPresent);
    }
    if frame & OPEN_CIRCUIT != 0 {
        return Err(Error::OpenCircuit);
    }

    // 12 bit count of quarter degrees; I28F4 has 4 fractional bits, so a quarter degree is 4.
    let counts = i32::from((frame >> 3) & 0x0FFF);
    Ok(Temperature::from_bits(counts << 2))
}

/// One converter on a shared SPI bus.
pub struct Max6675<CS> {
    cs: CS,
}

impl<CS: OutputPin> Max6675<CS> {
    /// Wrap a chip select pin and deselect the chip.
    pub fn new(mut cs: CS) -> Result<Self, CS::Error> {
        cs.set_high()?;
        Ok(Self { cs })
    }

    pub fn read<SPI: Transfer<u8>>(
        &mut self,
        spi: &mut SPI,
    ) -> Result<Temperature, Error<SPI::Error, CS::Error>> {
        let frame = self.read_frame(spi)?;
        decode(frame)
    }

    fn read_frame<SPI: Transfer<u8>>(
        &mut self,
        spi: &mut SPI,
    ) -> Result<u16, Error<SPI::Error, CS::Error>> {
        self.cs.set_low().map_err(Error::ChipSelect)?;

        let mut buf = [0u8; 2];
        let result = spi
            .transfer(&mut buf)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .map_err(Error::Spi);

        // Deselect even if the transfer failed, otherwise the next conversion never starts.
        self.cs.set_high().map_err(Error::ChipSelect)?;

        result
    }

    pub fn release(self) -> CS {
        self.cs
    }
}

/// `N` converters sharing one SPI bus, each with its own chip select.
pub struct ThermocoupleReader<SPI, CS, const N: usize> {
    spi: SPI,
    channels: [Max6675<CS>; N],
    latest: [Option<Temperature>; N],
}

impl<SPI, CS, const N: usize> ThermocoupleReader<SPI, CS, N>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: [CS; N]) -> Result<Self, CS::Error> {
        let mut channels = heapless::Vec::<Max6675<CS>, N>::new();
        for pin in cs {
            // Capacity is N and there are exactly N pins
            let _ = channels.push(Max6675::new(pin)?);
        }
        let Ok(channels) = channels.into_array() else {
            unreachable!("exactly N channels were pushed");
        };

        Ok(Self {
            spi,
            channels,
            latest: [None; N],
        })
    }

    /// Last successful reading of every channel, `None` if the last read failed.
    pub const fn latest(&self) -> &[Option<Temperature>; N] {
        &self.latest
    }
}

impl<SPI, CS, const N: usize> Thermometer<N> for ThermocoupleReader<SPI, CS, N>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    type Error = Error<SPI::Error, CS::Error>;

    fn read(&mut self) -> [Result<Temperature, Self::Error>; N] {
        let Self {
            spi,
            channels,
            latest,
        } = self;

        let results: [Result<Temperature, Self::Error>; N] =
            core::array::from_fn(|i| channels[i].read(spi));

        for (latest, result) in latest.iter_mut().zip(&results) {
            *latest = result.as_ref().ok().copied();
        }

        results
    }
}
