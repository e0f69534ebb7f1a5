//! Temperature control cycle: sensor readings in, heater update out.

use crate::{
    config::Config,
    controller::Controller,
    heater::HeaterOutput,
    heater_control::HeaterController,
    thermometer::{Temperature, Thermometer},
    time::Instant,
};

/// Result of one control cycle, handed on to the log.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Sample<const N: usize> {
    pub temps: [Option<Temperature>; N],
    pub heating: bool,
}

/// Feeds the control channel of an `N` channel thermometer to the heater.
///
/// A failed read of the control channel skips the heater update. After `max_failures`
/// consecutive failures the heater is disabled.
pub struct TempController<const N: usize> {
    channel: usize,
    failures: u8,
    max_failures: u8,
}

impl<const N: usize> TempController<N> {
    pub const fn new(channel: usize, config: &Config) -> Self {
        assert!(channel < N, "control channel out of range");
        Self {
            channel,
            failures: 0,
            max_failures: config.max_sensor_failures,
        }
    }

    /// Consecutive failed reads of the control channel.
    pub const fn failures(&self) -> u8 {
        self.failures
    }

    /// Apply one set of readings to the heater.
    pub fn apply<E, H, C>(
        &mut self,
        readings: [Result<Temperature, E>; N],
        heater: &mut HeaterController<H, C>,
        now: Instant,
    ) -> Result<Sample<N>, H::Error>
    where
        H: HeaterOutput,
        C: Controller,
    {
        let mut channel = 0;
        let temps = readings.map(|r| {
            let temp = r.ok();
            if temp.is_none() {
                warn!("thermocouple {=usize} read failed", channel);
            }
            channel += 1;
            temp
        });

        if let Some(temp) = temps[self.channel] {
            self.failures = 0;
            heater.update(temp, now)?;
        } else {
            self.failures = self.failures.saturating_add(1);
            if self.failures >= self.max_failures && heater.is_enabled() {
                error!(
                    "control thermocouple failed {=u8} times, disabling heater",
                    self.failures
                );
                heater.disable(now)?;
            }
        }

        trace!(
            "temperature: {=f32}, heating: {=bool}",
            heater.current().to_num::<f32>(),
            heater.is_heating()
        );

        Ok(Sample {
            temps,
            heating: heater.is_heating(),
        })
    }

    /// Read the thermometer and apply the readings.
    #[cfg_attr(feature = "sizing", inline(never))]
    pub fn run<T, H, C>(
        &mut self,
        thermometer: &mut T,
        heater: &mut HeaterController<H, C>,
        now: Instant,
    ) -> Result<Sample<N>, H::Error>
    where
        T: Thermometer<N>,
        H: HeaterOutput,
        C: Controller,
    {
        let readings = thermometer.read();
        self.apply(readings, heater, now)
    }
}
