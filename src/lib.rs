//! Irrigation controller firmware library.
//!
//! Exposes the pure-logic core (time, clock, scheduler, actuator,
//! storage, application service) for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod actuator;
pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod storage;
pub mod time;

pub mod adapters;
pub mod drivers;
pub mod pins;
