use num_traits::float::FloatCore;
use pid::Pid;

use crate::thermometer::Temperature;

/// Gains and limits of a [`PidController`].
///
/// `limit` bounds the output as well as each of the three terms; the integral term in
/// particular is clamped to it, which keeps it from winding up while the heater is saturated.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub limit: f32,
}

pub struct PidController {
    gains: PidGains,
    pid: Pid<f32>,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            pid: Self::build(&gains),
        }
    }

    fn build(gains: &PidGains) -> Pid<f32> {
        let limit = gains.limit.abs();

        let mut pid = Pid::new(0.0, limit);
        pid.p(gains.kp, limit);
        pid.i(gains.ki, limit);
        pid.d(gains.kd, limit);
        pid
    }

    pub const fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.pid = Self::build(&gains);
    }

    /// Map a PID output in `[-limit, limit]` to a duty. Outputs at or below zero are off, any
    /// positive output gives at least duty 1.
    // Clamped to [0, 255] before the cast
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn duty(&self, output: f32) -> u8 {
        let limit = self.pid.output_limit;
        if limit <= 0.0 || output <= 0.0 {
            return 0;
        }
        FloatCore::ceil(output.min(limit) / limit * f32::from(u8::MAX)) as u8
    }
}

impl super::Controller for PidController {
    fn run(&mut self, temp: Temperature, target: Temperature) -> Option<u8> {
        self.pid.setpoint = target.to_num();
        let output = self.pid.next_control_output(temp.to_num());
        trace!(
            "pid p: {=f32}, i: {=f32}, d: {=f32}, out: {=f32}",
            output.p,
            output.i,
            output.d,
            output.output
        );
        Some(self.duty(output.output))
    }

    /// Drops the integral and the derivative history.
    fn reset(&mut self) {
        self.pid = Self::build(&self.gains);
    }
}
