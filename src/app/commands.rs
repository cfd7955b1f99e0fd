//! Inbound commands to the application service.
//!
//! These are the requests a presentation layer (web form, serial console)
//! sends into the [`IrrigatorService`](super::service::IrrigatorService).
//! Raw values are carried as received and validated by the service.

use heapless::String;

use crate::config::IrrigatorConfig;

/// Longest raw task label accepted from a client; trimmed on apply.
pub const RAW_DESCRIPTION_LEN: usize = 32;

/// Longest accepted one-off delay.  The armed time is persisted as
/// 4-byte cumulative seconds.
pub const MAX_SCHEDULE_DELAY_SECS: i64 = u32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Overwrite one valve's task.  `valve` is a zero-based physical index.
    UpdateTask {
        valve: u8,
        enabled: bool,
        duration_secs: u16,
        description: String<RAW_DESCRIPTION_LEN>,
    },

    /// Restart the cycle interval from now without watering.
    ResetCycle,

    /// Arm a one-off cycle `delay_secs` from now.  Must lie in
    /// `1..=MAX_SCHEDULE_DELAY_SECS`.
    Schedule { delay_secs: i64 },

    /// Change the regular cycle interval.
    SetCycleInterval { secs: u32 },

    /// Force every valve closed.
    ResetValves,

    /// Persist new settings; they apply on the next boot.
    UpdateConfig(IrrigatorConfig),
}
