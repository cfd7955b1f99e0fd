//! Application core: pure domain orchestration, no direct I/O.
//!
//! The control loop lives in [`service`].  All interaction with hardware,
//! storage and the network happens through the **port traits** in
//! [`ports`], so this layer is fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
