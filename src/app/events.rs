//! Outbound application events.
//!
//! The [`IrrigatorService`](super::service::IrrigatorService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them.

use crate::actuator::ValveId;
use crate::error::{Error, SyncError};
use crate::scheduler::CycleReport;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot finished.  `formatted` is set when the store was reinitialised.
    Started { formatted: bool },

    /// Network time obtained.
    TimeSynced { unix_secs: i64 },

    /// A sync attempt failed; retried later.
    SyncFailed(SyncError),

    /// A duty cycle is about to run.
    CycleStarted { planned: usize },

    /// A duty cycle completed and its markers were recorded.
    CycleCompleted(CycleReport),

    /// Cycle markers reset to now without watering.
    CycleReset,

    /// One-off run armed `in_secs` from now.
    OneOffArmed { in_secs: i64 },

    IntervalChanged { secs: i64 },

    TaskUpdated(ValveId),

    ValvesReset,

    /// New settings persisted.
    ConfigSaved,

    /// A control command failed validation or persistence.
    CommandRejected(Error),

    /// State changed in memory but could not be written to the store.
    PersistFailed(Error),
}
