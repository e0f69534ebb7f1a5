//! Line-oriented UART terminal.
//!
//! The firmware collects received bytes in a [`Deque`], pulls complete lines out with
//! [`get_line`], parses them with [`Command::parse`] and executes them against the shared
//! resources. Replies are written through the `write_*` helpers.

use core::{
    fmt::{self, Write},
    str::{self, FromStr},
};

use heapless::{Deque, Vec};

use crate::{
    display::{write_hours_minutes, write_temp},
    heater_control::{HeaterState, Status},
    storage::Entry,
    thermometer::Temperature,
    time::Duration,
};

pub const BUFFER_SIZE: usize = 32;
pub const OK_STR: &str = "<ok>\r\n";

pub const HELP_STR: &str = "Commands:\r
    help\r
    temp\r
    status\r
    heater <on|off|toggle>?\r
    target <deg C>?\r
    autooff <minutes>?\r
    dump temps\r
    erase\r
    reset\r
";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

/// Terminal command
///
/// Commands:
/// - `help` - Print help
/// - `temp` - Get the most recent logged temperatures
/// - `status` - Get the heater state, target, current temperature and auto-disable time
/// - `heater <on|off|toggle>?` - Enable, disable or toggle the heater, or get whether it is enabled
/// - `target <deg C>?` - Get or set the target temperature
/// - `autooff <minutes>?` - Get or set the time until auto-disable
/// - `dump temps` - Dump the temperature log
/// - `erase` - Erase the temperature log
/// - `reset` - Reset the MCU
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Temp,
    Status,
    Heater(Option<Switch>),
    Target(Option<Temperature>),
    AutoOff(Option<Duration>),
    DumpTemps,
    Erase,
    Reset,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseError<'a> {
    UnknownCommand(&'a [u8]),
    UnknownArgument(&'a [u8]),
    MissingArgument,
}

impl Command {
    pub fn parse(line: &[u8]) -> Result<Self, ParseError<'_>> {
        // Split line into arguments
        let mut args = line
            .split(|b| is_whitespace(*b))
            .filter(|arg| !arg.is_empty());

        let command = match args.next() {
            None => Self::Empty,
            Some(b"help") => Self::Help,
            Some(b"temp") => Self::Temp,
            Some(b"status") => Self::Status,
            Some(b"heater") => Self::Heater(match args.next() {
                None => None,
                Some(b"on") => Some(Switch::On),
                Some(b"off") => Some(Switch::Off),
                Some(b"toggle") => Some(Switch::Toggle),
                Some(b) => return Err(ParseError::UnknownArgument(b)),
            }),
            Some(b"target") => Self::Target(match args.next() {
                None => None,
                Some(b) => Some(parse_temp(b).ok_or(ParseError::UnknownArgument(b))?),
            }),
            Some(b"autooff") => Self::AutoOff(match args.next() {
                None => None,
                Some(b) => Some(parse_minutes(b).ok_or(ParseError::UnknownArgument(b))?),
            }),
            Some(b"dump") => match args.next() {
                None => return Err(ParseError::MissingArgument),
                Some(b"temps") => Self::DumpTemps,
                Some(b) => return Err(ParseError::UnknownArgument(b)),
            },
            Some(b"erase") => Self::Erase,
            Some(b"reset") => Self::Reset,
            Some(b) => return Err(ParseError::UnknownCommand(b)),
        };

        Ok(command)
    }
}

fn parse_temp(arg: &[u8]) -> Option<Temperature> {
    Temperature::from_str(str::from_utf8(arg).ok()?).ok()
}

fn parse_minutes(arg: &[u8]) -> Option<Duration> {
    let minutes = u32::from_str(str::from_utf8(arg).ok()?).ok()?;
    minutes.checked_mul(60_000).map(Duration::millis)
}

/// Pop the first complete line, newline included, off the receive buffer.
pub fn get_line(buffer: &mut Deque<u8, BUFFER_SIZE>) -> Option<Vec<u8, BUFFER_SIZE>> {
    // Find newline
    let idx = buffer.iter().position(|b| is_newline(*b))?;

    // Pop line from buffer
    let mut line = Vec::<_, BUFFER_SIZE>::new();
    for _ in 0..=idx {
        let b = buffer.pop_front()?;
        // line has the same capacity as buffer
        let _ = line.push(b);
    }

    Some(line)
}

#[inline]
pub const fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

#[inline]
pub const fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\n' || b == b'\r' || b == b'\t'
}

/// Bytes received from the terminal may not be UTF-8.
fn printable(arg: &[u8]) -> &str {
    str::from_utf8(arg).unwrap_or("?")
}

pub fn write_error<W: Write>(tx: &mut W, err: &ParseError<'_>) -> fmt::Result {
    match err {
        ParseError::UnknownCommand(b) => write!(tx, "Unknown command: '{}'\r\n", printable(b)),
        ParseError::UnknownArgument(b) => write!(tx, "Unknown argument: '{}'\r\n", printable(b)),
        ParseError::MissingArgument => tx.write_str("Missing argument\r\n"),
    }
}

pub fn write_status<W: Write>(tx: &mut W, status: &Status) -> fmt::Result {
    tx.write_str(match status.state {
        HeaterState::Disabled => "disabled",
        HeaterState::EnabledCoasting => "enabled",
        HeaterState::EnabledHeating => "heating",
    })?;
    tx.write_str(" target ")?;
    write_temp(tx, status.target)?;
    tx.write_str(" current ")?;
    write_temp(tx, status.current)?;
    write!(tx, " duty {} autooff ", status.duty)?;
    write_hours_minutes(tx, status.remaining())?;
    tx.write_str("\r\n")
}

pub fn write_enabled<W: Write>(tx: &mut W, status: &Status) -> fmt::Result {
    tx.write_str(if status.is_enabled() { "on\r\n" } else { "off\r\n" })
}

pub fn write_target<W: Write>(tx: &mut W, status: &Status) -> fmt::Result {
    write_temp(tx, status.target)?;
    tx.write_str("\r\n")
}

pub fn write_auto_off<W: Write>(tx: &mut W, status: &Status) -> fmt::Result {
    write!(tx, "{}\r\n", status.remaining().to_millis() / 60_000)
}

/// `<secs> <0|1> <temp>...`, `-` for a failed read.
pub fn write_entry<W: Write, const C: usize>(tx: &mut W, entry: &Entry<C>) -> fmt::Result {
    write!(tx, "{} {}", entry.secs(), u8::from(entry.heating()))?;
    for channel in 0..C {
        tx.write_str(" ")?;
        match entry.temp(channel) {
            Some(temp) => write_temp(tx, temp)?,
            None => tx.write_str("-")?,
        }
    }
    tx.write_str("\r\n")
}
