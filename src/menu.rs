//! Encoder and push-button menu.
//!
//! Everything here is a polled state machine: the firmware samples the encoder and button pins
//! on a timer and feeds the samples in. Nothing blocks and nothing touches the heater directly;
//! the menu returns an [`Action`] that the caller applies to the controller.

use crate::{
    config::Config,
    controller::Controller,
    heater::HeaterOutput,
    heater_control::{HeaterController, Status, MAX_AUTO_DISABLE},
    thermometer::Temperature,
    time::{self, Duration, Instant},
};

/// Hold time after which a press counts as long.
pub const LONG_PRESS: Duration = Duration::millis(1_000);

/// Presses released sooner than this are contact bounce.
pub const MIN_PRESS: Duration = Duration::millis(200);

/// Quadrature counts per mechanical detent.
pub const COUNTS_PER_DETENT: i8 = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Press {
    Short,
    Long,
}

/// Classifies presses of an active-low push button.
#[derive(Debug, Default)]
pub struct Button {
    pressed_at: Option<Instant>,
    long_handled: bool,
}

impl Button {
    pub const fn new() -> Self {
        Self {
            pressed_at: None,
            long_handled: false,
        }
    }

    /// Feed one sample of the button.
    ///
    /// A long press is reported once while the button is still held. A short press is reported
    /// on release, unless the press was long or shorter than [`MIN_PRESS`].
    pub fn poll(&mut self, pressed: bool, now: Instant) -> Option<Press> {
        match (pressed, self.pressed_at) {
            (true, None) => {
                self.pressed_at = Some(now);
                self.long_handled = false;
                None
            }
            (true, Some(at)) => {
                if !self.long_handled && time::elapsed(now, at) >= LONG_PRESS {
                    self.long_handled = true;
                    Some(Press::Long)
                } else {
                    None
                }
            }
            (false, Some(at)) => {
                self.pressed_at = None;
                (!self.long_handled && time::elapsed(now, at) >= MIN_PRESS)
                    .then_some(Press::Short)
            }
            (false, None) => None,
        }
    }
}

/// Quadrature decoder for a mechanical rotary encoder.
#[derive(Debug, Default)]
pub struct Encoder {
    state: u8,
    counts: i8,
}

impl Encoder {
    // Indexed by (previous AB << 2) | current AB. Invalid double transitions count as 0.
    const TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

    pub const fn new() -> Self {
        Self {
            state: 0,
            counts: 0,
        }
    }

    /// Feed one sample of the A and B pins. Returns `+1` or `-1` when a full detent has been
    /// turned.
    pub fn poll(&mut self, a: bool, b: bool) -> Option<i8> {
        let current = (u8::from(a) << 1) | u8::from(b);
        let index = usize::from((self.state << 2) | current);
        self.state = current;

        self.counts += Self::TABLE[index];
        if self.counts >= COUNTS_PER_DETENT {
            self.counts -= COUNTS_PER_DETENT;
            Some(1)
        } else if self.counts <= -COUNTS_PER_DETENT {
            self.counts += COUNTS_PER_DETENT;
            Some(-1)
        } else {
            None
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Input {
    Press(Press),
    /// Detents turned, clockwise positive
    Rotate(i8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Item {
    TargetTemp,
    CurrentTemp,
    Heater,
    AutoDisable,
}

impl Item {
    pub const ALL: [Self; 4] = [
        Self::TargetTemp,
        Self::CurrentTemp,
        Self::Heater,
        Self::AutoDisable,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Item `steps` away, wrapping around the list.
    #[must_use]
    pub fn step(self, steps: i8) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let len = Self::ALL.len() as i32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let index = (self.index() as i32 + i32::from(steps)).rem_euclid(len) as usize;
        Self::ALL[index]
    }
}

/// What the display should show.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Screen {
    Home,
    Item(Item),
    AdjustTarget(Temperature),
    AdjustAutoDisable(Duration),
}

/// A command for the heater controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Toggle,
    SetTarget(Temperature),
    SetAutoDisable(Duration),
}

impl Action {
    pub fn apply<H: HeaterOutput, C: Controller>(
        self,
        heater: &mut HeaterController<H, C>,
        now: Instant,
    ) -> Result<(), H::Error> {
        match self {
            Self::Toggle => heater.toggle(now)?,
            Self::SetTarget(target) => heater.set_target(target),
            Self::SetAutoDisable(budget) => heater.set_time_until_disable(budget, now),
        }
        Ok(())
    }
}

pub struct Menu {
    screen: Screen,
    target_step: Temperature,
    auto_disable_step: Duration,
}

impl Menu {
    pub const fn new(config: &Config) -> Self {
        Self {
            screen: Screen::Home,
            target_step: config.target_step,
            auto_disable_step: config.auto_disable_step,
        }
    }

    pub const fn screen(&self) -> Screen {
        self.screen
    }

    pub const fn is_active(&self) -> bool {
        !matches!(self.screen, Screen::Home)
    }

    /// Apply one input. `status` seeds the value when an item is opened for adjustment.
    pub fn handle(&mut self, input: Input, status: &Status) -> Option<Action> {
        let (screen, action) = match (self.screen, input) {
            (Screen::Home, Input::Press(Press::Long)) => (Screen::Home, Some(Action::Toggle)),
            (Screen::Home, Input::Press(Press::Short)) => {
                (Screen::Item(Item::TargetTemp), None)
            }
            (Screen::Home, Input::Rotate(_)) => (Screen::Home, None),

            (Screen::Item(item), Input::Rotate(steps)) => (Screen::Item(item.step(steps)), None),
            (Screen::Item(_), Input::Press(Press::Long)) => (Screen::Home, None),
            (Screen::Item(Item::TargetTemp), Input::Press(Press::Short)) => {
                (Screen::AdjustTarget(status.target), None)
            }
            (Screen::Item(Item::AutoDisable), Input::Press(Press::Short)) => {
                (Screen::AdjustAutoDisable(status.remaining()), None)
            }
            // Read-only items
            (Screen::Item(_), Input::Press(Press::Short)) => (Screen::Home, None),

            (Screen::AdjustTarget(target), Input::Rotate(steps)) => {
                let delta = self.target_step.saturating_mul_int(i32::from(steps));
                (Screen::AdjustTarget(target.saturating_add(delta)), None)
            }
            (Screen::AdjustTarget(target), Input::Press(Press::Short)) => {
                (Screen::Home, Some(Action::SetTarget(target)))
            }
            (Screen::AdjustTarget(_), Input::Press(Press::Long)) => {
                (Screen::Item(Item::TargetTemp), None)
            }

            (Screen::AdjustAutoDisable(budget), Input::Rotate(steps)) => {
                (Screen::AdjustAutoDisable(self.step_budget(budget, steps)), None)
            }
            (Screen::AdjustAutoDisable(budget), Input::Press(Press::Short)) => {
                (Screen::Home, Some(Action::SetAutoDisable(budget)))
            }
            (Screen::AdjustAutoDisable(_), Input::Press(Press::Long)) => {
                (Screen::Item(Item::AutoDisable), None)
            }
        };

        if let Some(action) = action {
            debug!("menu action {}", action);
        }
        self.screen = screen;
        action
    }

    /// Whole steps up or down. A step down is skipped if less than a step is left, a step up
    /// stops at [`MAX_AUTO_DISABLE`].
    fn step_budget(&self, budget: Duration, steps: i8) -> Duration {
        let step = self.auto_disable_step.ticks();
        let mut ticks = budget.ticks();
        for _ in 0..steps.unsigned_abs() {
            if steps > 0 {
                ticks = ticks.saturating_add(step).min(MAX_AUTO_DISABLE.ticks());
            } else if ticks >= step {
                ticks -= step;
            }
        }
        Duration::from_ticks(ticks)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Action {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Toggle => defmt::write!(fmt, "toggle"),
            Self::SetTarget(t) => defmt::write!(fmt, "target {=f32}", t.to_num::<f32>()),
            Self::SetAutoDisable(d) => defmt::write!(fmt, "auto-disable {=u32} s", d.to_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heater_control::HeaterState;

    fn ms(v: u32) -> Instant {
        Instant::from_ticks(v)
    }

    fn t(v: i32) -> Temperature {
        Temperature::from_num(v)
    }

    fn status(enabled: bool) -> Status {
        Status {
            state: if enabled {
                HeaterState::EnabledCoasting
            } else {
                HeaterState::Disabled
            },
            duty: 0,
            target: t(50),
            current: t(21),
            time_until_disable: if enabled {
                Duration::secs(3_600)
            } else {
                time::ZERO
            },
            budget: Duration::secs(7_200),
        }
    }

    #[test]
    fn button_short_press_on_release() {
        let mut b = Button::new();
        assert_eq!(b.poll(true, ms(0)), None);
        assert_eq!(b.poll(true, ms(150)), None);
        assert_eq!(b.poll(false, ms(300)), Some(Press::Short));
        assert_eq!(b.poll(false, ms(310)), None);
    }

    #[test]
    fn button_bounce_is_ignored() {
        let mut b = Button::new();
        b.poll(true, ms(0));
        assert_eq!(b.poll(false, ms(50)), None);
    }

    #[test]
    fn button_long_press_once_while_held() {
        let mut b = Button::new();
        b.poll(true, ms(0));
        assert_eq!(b.poll(true, ms(999)), None);
        assert_eq!(b.poll(true, ms(1_000)), Some(Press::Long));
        assert_eq!(b.poll(true, ms(3_000)), None);
        // No short press on release after a long one
        assert_eq!(b.poll(false, ms(3_100)), None);

        // A fresh press is classified on its own
        b.poll(true, ms(4_000));
        assert_eq!(b.poll(false, ms(4_250)), Some(Press::Short));
    }

    /// Gray sequence for one counter-clockwise detent: 00 -> 01 -> 11 -> 10 -> 00
    const CCW: [(bool, bool); 4] = [(false, true), (true, true), (true, false), (false, false)];

    #[test]
    fn encoder_counts_detents() {
        let mut e = Encoder::new();
        let mut detents = 0;
        for _ in 0..3 {
            for (a, b) in CCW {
                if let Some(d) = e.poll(a, b) {
                    detents += d;
                }
            }
        }
        assert_eq!(detents, -3);

        for _ in 0..2 {
            for (a, b) in CCW.iter().rev().skip(1).chain(core::iter::once(&(false, false))) {
                if let Some(d) = e.poll(*a, *b) {
                    detents += d;
                }
            }
        }
        assert_eq!(detents, -1);
    }

    #[test]
    fn encoder_ignores_noise_on_one_pin() {
        let mut e = Encoder::new();
        for _ in 0..10 {
            assert_eq!(e.poll(false, true), None);
            assert_eq!(e.poll(false, false), None);
        }
    }

    #[test]
    fn items_wrap() {
        assert_eq!(Item::TargetTemp.step(-1), Item::AutoDisable);
        assert_eq!(Item::AutoDisable.step(1), Item::TargetTemp);
        assert_eq!(Item::CurrentTemp.step(7), Item::TargetTemp);
    }

    #[test]
    fn long_press_on_home_toggles() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(false);
        assert_eq!(
            menu.handle(Input::Press(Press::Long), &s),
            Some(Action::Toggle)
        );
        assert!(!menu.is_active());
    }

    #[test]
    fn adjust_target() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(true);

        menu.handle(Input::Press(Press::Short), &s);
        assert_eq!(menu.screen(), Screen::Item(Item::TargetTemp));

        menu.handle(Input::Press(Press::Short), &s);
        assert_eq!(menu.screen(), Screen::AdjustTarget(t(50)));

        menu.handle(Input::Rotate(1), &s);
        menu.handle(Input::Rotate(1), &s);
        menu.handle(Input::Rotate(-1), &s);
        menu.handle(Input::Rotate(3), &s);
        assert_eq!(menu.screen(), Screen::AdjustTarget(t(54)));

        assert_eq!(
            menu.handle(Input::Press(Press::Short), &s),
            Some(Action::SetTarget(t(54)))
        );
        assert_eq!(menu.screen(), Screen::Home);
    }

    #[test]
    fn adjust_auto_disable_never_below_zero() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(false);

        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Rotate(-1), &s);
        assert_eq!(menu.screen(), Screen::Item(Item::AutoDisable));

        // Disabled: seeded from the paused budget
        menu.handle(Input::Press(Press::Short), &s);
        assert_eq!(menu.screen(), Screen::AdjustAutoDisable(Duration::secs(7_200)));

        menu.handle(Input::Rotate(-3), &s);
        assert_eq!(menu.screen(), Screen::AdjustAutoDisable(Duration::secs(1_800)));

        // Only one of the two steps fits
        menu.handle(Input::Rotate(-2), &s);
        assert_eq!(menu.screen(), Screen::AdjustAutoDisable(time::ZERO));
        menu.handle(Input::Rotate(-1), &s);
        assert_eq!(menu.screen(), Screen::AdjustAutoDisable(time::ZERO));

        menu.handle(Input::Rotate(2), &s);
        assert_eq!(
            menu.handle(Input::Press(Press::Short), &s),
            Some(Action::SetAutoDisable(Duration::secs(3_600)))
        );
    }

    #[test]
    fn adjust_auto_disable_stops_at_cap() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(false);
        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Rotate(-1), &s);
        menu.handle(Input::Press(Press::Short), &s);

        for _ in 0..30 {
            menu.handle(Input::Rotate(i8::MAX), &s);
        }
        assert_eq!(
            menu.handle(Input::Press(Press::Short), &s),
            Some(Action::SetAutoDisable(MAX_AUTO_DISABLE))
        );
    }

    #[test]
    fn adjust_auto_disable_seeds_from_countdown_while_enabled() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(true);
        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Rotate(3), &s);
        menu.handle(Input::Press(Press::Short), &s);
        assert_eq!(menu.screen(), Screen::AdjustAutoDisable(Duration::secs(3_600)));
    }

    #[test]
    fn long_press_backs_out() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(true);
        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Rotate(5), &s);

        assert_eq!(menu.handle(Input::Press(Press::Long), &s), None);
        assert_eq!(menu.screen(), Screen::Item(Item::TargetTemp));
        assert_eq!(menu.handle(Input::Press(Press::Long), &s), None);
        assert_eq!(menu.screen(), Screen::Home);
    }

    #[test]
    fn actions_reach_the_controller() {
        let mut heater = Config::DEFAULT
            .heater_controller(crate::heater::PinHeater::new(
                crate::heater::tests::FakePin::default(),
            ))
            .unwrap();

        Action::SetTarget(t(65)).apply(&mut heater, ms(0)).unwrap();
        assert_eq!(heater.target(), t(65));

        Action::Toggle.apply(&mut heater, ms(0)).unwrap();
        assert!(heater.is_enabled());

        Action::SetAutoDisable(Duration::secs(60))
            .apply(&mut heater, ms(1_000))
            .unwrap();
        assert_eq!(heater.time_until_disable(ms(31_000)), Duration::secs(30));

        Action::Toggle.apply(&mut heater, ms(2_000)).unwrap();
        assert!(!heater.is_enabled());
    }

    #[test]
    fn read_only_item_returns_home() {
        let mut menu = Menu::new(&Config::DEFAULT);
        let s = status(true);
        menu.handle(Input::Press(Press::Short), &s);
        menu.handle(Input::Rotate(1), &s);
        assert_eq!(menu.screen(), Screen::Item(Item::CurrentTemp));
        assert_eq!(menu.handle(Input::Press(Press::Short), &s), None);
        assert_eq!(menu.screen(), Screen::Home);
    }
}
