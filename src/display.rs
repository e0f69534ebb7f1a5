//! Text for the 16x2 character display.

use core::fmt::{self, Write};

use crate::{
    heater_control::Status,
    menu::{Item, Screen},
    thermometer::Temperature,
    time::Duration,
};

pub const COLUMNS: usize = 16;

pub type Line = heapless::String<COLUMNS>;

const MS_PER_HOUR: u32 = 60 * 60 * 1_000;
const MS_PER_MINUTE: u32 = 60 * 1_000;

/// Write a temperature with one decimal, e.g. `-3.5`.
pub fn write_temp<W: Write>(w: &mut W, temp: Temperature) -> fmt::Result {
    let tenths: i32 = temp.saturating_mul_int(10).saturating_round().to_num();
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.unsigned_abs();
    write!(w, "{sign}{}.{}", abs / 10, abs % 10)
}

/// Write a duration as whole hours and minutes, e.g. `12h 30m`.
pub fn write_hours_minutes<W: Write>(w: &mut W, duration: Duration) -> fmt::Result {
    let ms = duration.to_millis();
    write!(w, "{}h {}m", ms / MS_PER_HOUR, (ms % MS_PER_HOUR) / MS_PER_MINUTE)
}

/// Render both display lines for a screen.
///
/// Text that does not fit a line is dropped rather than wrapped.
pub fn render(screen: Screen, status: &Status) -> [Line; 2] {
    let mut top = Line::new();
    let mut bottom = Line::new();

    // Overflowing writes fail without side effects; the line keeps what fit.
    let _ = match screen {
        Screen::Home => {
            let _ = top.write_str("Target: ");
            let _ = write_temp(&mut top, status.target);
            let _ = top.write_str(" C");
            let _ = bottom.write_str("Current: ");
            let _ = write_temp(&mut bottom, status.current);
            bottom.write_str(" C")
        }
        Screen::Item(Item::TargetTemp) => {
            let _ = top.write_str("Target Temp");
            let _ = write_temp(&mut bottom, status.target);
            bottom.write_str(" C")
        }
        Screen::Item(Item::CurrentTemp) => {
            let _ = top.write_str("Current Temp:");
            let _ = write_temp(&mut bottom, status.current);
            bottom.write_str(" C")
        }
        Screen::Item(Item::Heater) => {
            let _ = top.write_str("Heater:");
            bottom.write_str(match (status.is_enabled(), status.is_heating()) {
                (false, _) => "OFF",
                (true, false) => "ON",
                (true, true) => "ON, HEATING",
            })
        }
        Screen::Item(Item::AutoDisable) => {
            let _ = top.write_str("Auto-Disable");
            write_hours_minutes(&mut bottom, status.remaining())
        }
        Screen::AdjustTarget(target) => {
            let _ = top.write_str("Set Target Temp");
            let _ = write_temp(&mut bottom, target);
            bottom.write_str(" C")
        }
        Screen::AdjustAutoDisable(budget) => {
            let _ = top.write_str("Set Auto-Disable");
            write_hours_minutes(&mut bottom, budget)
        }
    };

    [top, bottom]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{heater_control::HeaterState, time};

    fn status() -> Status {
        Status {
            state: HeaterState::EnabledHeating,
            duty: 255,
            target: Temperature::from_num(50),
            current: Temperature::from_num(123.4375),
            time_until_disable: Duration::millis(12 * MS_PER_HOUR + 30 * MS_PER_MINUTE + 59_999),
            budget: Duration::millis(24 * MS_PER_HOUR),
        }
    }

    fn temp(t: f32) -> Line {
        let mut line = Line::new();
        write_temp(&mut line, Temperature::from_num(t)).unwrap();
        line
    }

    #[test]
    fn temperatures_round_to_one_decimal() {
        assert_eq!(temp(21.0), "21.0");
        assert_eq!(temp(21.0625), "21.1");
        assert_eq!(temp(0.0), "0.0");
        assert_eq!(temp(-3.5), "-3.5");
        assert_eq!(temp(-0.25), "-0.3");
    }

    #[test]
    fn hours_and_minutes_truncate() {
        let mut line = Line::new();
        write_hours_minutes(&mut line, status().time_until_disable).unwrap();
        assert_eq!(line, "12h 30m");

        let mut line = Line::new();
        write_hours_minutes(&mut line, time::ZERO).unwrap();
        assert_eq!(line, "0h 0m");
    }

    #[test]
    fn home_screen() {
        let [top, bottom] = render(Screen::Home, &status());
        assert_eq!(top, "Target: 50.0 C");
        assert_eq!(bottom, "Current: 123.4 C");
    }

    #[test]
    fn item_screens() {
        let s = status();
        assert_eq!(render(Screen::Item(Item::Heater), &s)[1], "ON, HEATING");
        assert_eq!(render(Screen::Item(Item::AutoDisable), &s)[1], "12h 30m");
        assert_eq!(render(Screen::Item(Item::CurrentTemp), &s)[0], "Current Temp:");

        let off = Status {
            state: HeaterState::Disabled,
            duty: 0,
            time_until_disable: time::ZERO,
            ..s
        };
        assert_eq!(render(Screen::Item(Item::Heater), &off)[1], "OFF");
        // Disabled shows the paused budget
        assert_eq!(render(Screen::Item(Item::AutoDisable), &off)[1], "24h 0m");
    }

    #[test]
    fn adjust_screens() {
        let s = status();
        let [top, bottom] = render(Screen::AdjustTarget(Temperature::from_num(75)), &s);
        assert_eq!(top, "Set Target Temp");
        assert_eq!(bottom, "75.0 C");

        let [top, bottom] = render(Screen::AdjustAutoDisable(Duration::millis(MS_PER_HOUR / 2)), &s);
        assert_eq!(top, "Set Auto-Disable");
        assert_eq!(bottom, "0h 30m");
    }
}
