//! Thermocouple heater controller.
//!
//! The [`heater_control`] module holds the control core: the enable/disable lifecycle, the
//! auto-disable safety timer, the toggle-rate limiter and the decision policy. Everything else is
//! glue around it (sensors, log store, menu, terminal) and is kept free of hardware so it can be
//! tested on the host.
#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod display;
pub mod heater;
pub mod heater_control;
pub mod menu;
pub mod storage;
pub mod temp_controller;
pub mod terminal;
pub mod thermometer;
pub mod time;
