//! Build-time configuration.

use crate::{
    controller::{pid::PidGains, Hysteresis, PidController, Policy},
    heater::HeaterOutput,
    heater_control::HeaterController,
    thermometer::Temperature,
    time::Duration,
};

/// Number of thermocouple channels wired to the board.
pub const CHANNELS: usize = 2;

/// Channel the heater is regulated on. The others are only logged.
pub const CONTROL_CHANNEL: usize = 0;

/// Number of log entries kept in RAM.
pub const LOG_DEPTH: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// Target temperature at power-up
    pub target: Temperature,
    /// Half-width of the hysteresis band
    pub hysteresis: Temperature,
    /// Minimum time between two output changes
    pub min_toggle_interval: Duration,
    /// Auto-disable budget at power-up
    pub auto_disable: Duration,
    pub pid: PidGains,
    /// Period of the control loop
    pub control_period: Duration,
    /// Period between two log entries
    pub log_period: Duration,
    /// Consecutive failed reads of the control channel before the heater is disabled
    pub max_sensor_failures: u8,
    /// Menu step per encoder detent when adjusting the target
    pub target_step: Temperature,
    /// Menu step per encoder detent when adjusting the auto-disable time
    pub auto_disable_step: Duration,
}

impl Config {
    pub const DEFAULT: Self = Self {
        target: Temperature::ZERO,
        hysteresis: Temperature::const_from_int(2),
        min_toggle_interval: Duration::secs(5),
        auto_disable: Duration::secs(12 * 60 * 60),
        pid: PidGains {
            kp: 8.0,
            ki: 0.05,
            kd: 20.0,
            limit: 100.0,
        },
        control_period: Duration::secs(1),
        log_period: Duration::secs(10),
        max_sensor_failures: 5,
        target_step: Temperature::ONE,
        auto_disable_step: Duration::secs(30 * 60),
    };

    /// Decision policy selected by the `pid` feature.
    pub fn policy(&self) -> Policy {
        if cfg!(feature = "pid") {
            Policy::from(PidController::new(self.pid))
        } else {
            Policy::from(Hysteresis::new(self.hysteresis))
        }
    }

    pub fn heater_controller<H: HeaterOutput>(
        &self,
        output: H,
    ) -> Result<HeaterController<H>, H::Error> {
        let mut heater = HeaterController::new(
            output,
            self.policy(),
            self.auto_disable,
            self.min_toggle_interval,
        )?;
        heater.set_target(self.target);
        Ok(heater)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    struct Sink;

    impl HeaterOutput for Sink {
        type Error = Infallible;

        fn set_duty(&mut self, _: u8) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.auto_disable.to_millis(), 12 * 60 * 60 * 1000);
        assert_eq!(config.min_toggle_interval.to_millis(), 5_000);
        assert_eq!(config.hysteresis, Temperature::from_num(2));
    }

    #[test]
    fn builds_disabled_controller() {
        let heater = Config::DEFAULT.heater_controller(Sink).unwrap();
        assert!(!heater.is_enabled());
        assert_eq!(heater.target(), Config::DEFAULT.target);
        assert_eq!(heater.auto_disable_budget(), Config::DEFAULT.auto_disable);
    }

    #[cfg(not(feature = "pid"))]
    #[test]
    fn hysteresis_is_the_default_policy() {
        let policy = Config::DEFAULT.policy();
        assert!(matches!(policy, Policy::Hysteresis(h) if h.band() == Temperature::from_num(2)));
    }
}
