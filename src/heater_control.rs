//! Heater control core.
//!
//! [`HeaterController`] owns the enable/disable lifecycle, the auto-disable safety timer, the
//! minimum dwell between output toggles and the decision policy. It is driven by
//! [`HeaterController::update`] from a polling loop; every method takes the current time so the
//! controller itself never reads a clock.
//!
//! The auto-disable budget pauses while the heater is disabled: disabling subtracts the time
//! spent enabled from the budget, enabling resumes the countdown from there.

use crate::{
    controller::{Controller, Policy},
    heater::HeaterOutput,
    thermometer::Temperature,
    time::{self, Duration, Instant},
};

/// Largest auto-disable budget. Elapsed time wraps at 2^32 ms, so the budget must leave at least
/// half the counter range in which an exhausted budget is still seen as exhausted.
pub const MAX_AUTO_DISABLE: Duration = Duration::from_ticks(u32::MAX / 2);

/// Observable state of the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaterState {
    Disabled,
    /// Enabled, output off (inside the hysteresis band or zero PID output)
    EnabledCoasting,
    /// Enabled, output asserted
    EnabledHeating,
}

/// Snapshot of everything the display, menu, terminal and log read from the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: HeaterState,
    pub duty: u8,
    pub target: Temperature,
    pub current: Temperature,
    /// Time left before auto-disable, zero while disabled
    pub time_until_disable: Duration,
    /// Stored budget; while disabled this is what enabling would resume from
    pub budget: Duration,
}

impl Status {
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.state, HeaterState::Disabled)
    }

    pub const fn is_heating(&self) -> bool {
        matches!(self.state, HeaterState::EnabledHeating)
    }

    /// Budget the operator would be adjusting: the live countdown while enabled, the paused
    /// budget otherwise.
    pub const fn remaining(&self) -> Duration {
        if self.is_enabled() {
            self.time_until_disable
        } else {
            self.budget
        }
    }
}

pub struct HeaterController<H, C = Policy> {
    output: H,
    policy: C,

    enabled: bool,
    duty: u8,
    target: Temperature,
    current: Temperature,

    budget: Duration,
    enabled_at: Instant,
    last_toggle: Option<Instant>,
    min_toggle_interval: Duration,
}

impl<H: HeaterOutput, C: Controller> HeaterController<H, C> {
    /// Create a disabled controller and drive the output inactive.
    pub fn new(
        mut output: H,
        policy: C,
        auto_disable: Duration,
        min_toggle_interval: Duration,
    ) -> Result<Self, H::Error> {
        output.off()?;

        Ok(Self {
            output,
            policy,
            enabled: false,
            duty: 0,
            target: Temperature::ZERO,
            current: Temperature::ZERO,
            budget: clamp_budget(auto_disable),
            enabled_at: Instant::from_ticks(0),
            last_toggle: None,
            min_toggle_interval,
        })
    }

    /// Enable heating. The auto-disable countdown resumes from the stored budget.
    ///
    /// The output is left alone until the next [`update`](Self::update).
    pub fn enable(&mut self, now: Instant) {
        if self.enabled {
            return;
        }

        info!(
            "heater enabled, auto-disable in {=u32} s",
            self.budget.to_secs()
        );
        self.enabled = true;
        self.enabled_at = now;
    }

    /// Disable heating and drive the output inactive immediately.
    ///
    /// The time spent enabled is taken off the auto-disable budget so a later
    /// [`enable`](Self::enable) continues the countdown.
    pub fn disable(&mut self, now: Instant) -> Result<(), H::Error> {
        if !self.enabled {
            return Ok(());
        }

        self.budget = self.remaining(now);
        self.enabled_at = now;
        self.enabled = false;
        if self.duty > 0 {
            self.last_toggle = Some(now);
        }
        self.duty = 0;
        self.policy.reset();

        info!(
            "heater disabled, {=u32} s of auto-disable budget left",
            self.budget.to_secs()
        );
        self.output.off()
    }

    pub fn toggle(&mut self, now: Instant) -> Result<(), H::Error> {
        debug!("toggling heater");
        if self.enabled {
            self.disable(now)
        } else {
            self.enable(now);
            Ok(())
        }
    }

    /// Run one control cycle.
    ///
    /// The reading is always stored. While enabled, the cycle is skipped if the output toggled
    /// less than the minimum interval ago; otherwise an exhausted auto-disable budget disables
    /// the heater, and failing that the policy decides the output.
    pub fn update(&mut self, temp: Temperature, now: Instant) -> Result<(), H::Error> {
        self.current = temp;

        if !self.enabled {
            return Ok(());
        }

        if let Some(last) = self.last_toggle {
            if time::elapsed(now, last) < self.min_toggle_interval {
                return Ok(());
            }
        }

        if time::elapsed(now, self.enabled_at) >= self.budget {
            warn!("auto-disable budget exhausted");
            return self.disable(now);
        }

        let Some(duty) = self.policy.run(temp, self.target) else {
            return Ok(());
        };
        if duty == self.duty {
            return Ok(());
        }

        let was_heating = self.duty > 0;
        self.duty = duty;
        if was_heating != (duty > 0) {
            self.last_toggle = Some(now);
            debug!("heater output {=bool}", duty > 0);
        }

        self.output.set_duty(duty)
    }

    /// Time left before auto-disable; zero while disabled.
    pub fn time_until_disable(&self, now: Instant) -> Duration {
        if self.enabled {
            self.remaining(now)
        } else {
            time::ZERO
        }
    }

    /// Replace the auto-disable budget, counted from `now`. Capped at [`MAX_AUTO_DISABLE`].
    pub fn set_time_until_disable(&mut self, budget: Duration, now: Instant) {
        let budget = clamp_budget(budget);
        info!("auto-disable set to {=u32} s", budget.to_secs());
        self.budget = budget;
        self.enabled_at = now;
    }

    /// Takes effect on the next [`update`](Self::update).
    pub fn set_target(&mut self, target: Temperature) {
        self.target = target;
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Is the heater element currently asserted.
    pub const fn is_heating(&self) -> bool {
        self.duty > 0
    }

    pub const fn duty(&self) -> u8 {
        self.duty
    }

    pub const fn target(&self) -> Temperature {
        self.target
    }

    pub const fn current(&self) -> Temperature {
        self.current
    }

    /// The stored budget. While enabled it still includes the time elapsed since enabling.
    pub const fn auto_disable_budget(&self) -> Duration {
        self.budget
    }

    pub const fn state(&self) -> HeaterState {
        match (self.enabled, self.duty > 0) {
            (false, _) => HeaterState::Disabled,
            (true, false) => HeaterState::EnabledCoasting,
            (true, true) => HeaterState::EnabledHeating,
        }
    }

    pub fn status(&self, now: Instant) -> Status {
        Status {
            state: self.state(),
            duty: self.duty,
            target: self.target,
            current: self.current,
            time_until_disable: self.time_until_disable(now),
            budget: self.budget,
        }
    }

    pub const fn policy(&self) -> &C {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut C {
        &mut self.policy
    }

    pub const fn output(&self) -> &H {
        &self.output
    }

    fn remaining(&self, now: Instant) -> Duration {
        time::saturating_sub(self.budget, time::elapsed(now, self.enabled_at))
    }
}

fn clamp_budget(budget: Duration) -> Duration {
    if budget > MAX_AUTO_DISABLE {
        warn!("auto-disable capped at {=u32} s", MAX_AUTO_DISABLE.to_secs());
        MAX_AUTO_DISABLE
    } else {
        budget
    }
}
