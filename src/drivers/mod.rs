//! Actuator drivers and platform services.

pub mod solenoid;
pub mod watchdog;
