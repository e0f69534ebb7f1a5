//! Heater element drivers.

use core::convert::Infallible;

use embedded_hal::{digital::v2::OutputPin, PwmPin};

/// Output stage of a heater.
///
/// The duty is `0..=255`. A digital output treats any non-zero duty as fully on.
pub trait HeaterOutput {
    type Error;

    /// Drive the element with the given duty.
    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error>;

    /// Drive the element inactive.
    fn off(&mut self) -> Result<(), Self::Error> {
        self.set_duty(0)
    }
}

/// A heater switched by a GPIO pin (relay or SSR).
pub struct PinHeater<PIN: OutputPin> {
    pin: PIN,
}

impl<PIN: OutputPin> PinHeater<PIN> {
    pub const fn new(pin: PIN) -> Self {
        Self { pin }
    }

    pub fn release(self) -> PIN {
        self.pin
    }
}

impl<PIN: OutputPin> HeaterOutput for PinHeater<PIN> {
    type Error = PIN::Error;

    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error> {
        if duty > 0 {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

/// A heater driven by a PWM channel.
pub struct PwmHeater<P: PwmPin<Duty = u16>> {
    pwm: P,
}

impl<P: PwmPin<Duty = u16>> PwmHeater<P> {
    pub fn new(mut pwm: P) -> Self {
        pwm.set_duty(0);
        pwm.enable();
        Self { pwm }
    }
}

impl<P: PwmPin<Duty = u16>> HeaterOutput for PwmHeater<P> {
    type Error = Infallible;

    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error> {
        let max = u32::from(self.pwm.get_max_duty());
        let scaled = max * u32::from(duty) / u32::from(u8::MAX);
        // scaled <= max, which came from a u16
        #[allow(clippy::cast_possible_truncation)]
        self.pwm.set_duty(scaled as u16);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Pin that records its level and how often it was written.
    #[derive(Default)]
    pub struct FakePin {
        pub high: bool,
        pub writes: usize,
    }

    impl OutputPin for FakePin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePwm {
        enabled: bool,
        duty: u16,
    }

    impl PwmPin for FakePwm {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn get_duty(&self) -> Self::Duty {
            self.duty
        }

        fn get_max_duty(&self) -> Self::Duty {
            1000
        }

        fn set_duty(&mut self, duty: Self::Duty) {
            self.duty = duty;
        }
    }

    #[test]
    fn pin_heater_any_duty_is_on() {
        let mut heater = PinHeater::new(FakePin::default());
        heater.set_duty(1).unwrap();
        assert!(heater.pin.high);
        heater.off().unwrap();
        assert!(!heater.pin.high);
        heater.set_duty(255).unwrap();
        assert!(heater.release().high);
    }

    #[test]
    fn pwm_heater_scales_duty() {
        let mut heater = PwmHeater::new(FakePwm::default());
        assert!(heater.pwm.enabled);
        assert_eq!(heater.pwm.get_duty(), 0);

        heater.set_duty(255).unwrap();
        assert_eq!(heater.pwm.get_duty(), 1000);

        heater.set_duty(51).unwrap();
        assert_eq!(heater.pwm.get_duty(), 200);

        heater.off().unwrap();
        assert_eq!(heater.pwm.get_duty(), 0);
    }
}
