//! Unified error types for the irrigator firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the control
//! loop handles failures uniformly.  All variants are `Copy`; none of them is
//! fatal.  The loop logs and carries on in degraded mode.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Persistent store read/write failed.
    Storage(StorageError),
    /// Network time sync did not complete.
    Sync(SyncError),
    /// A control request was rejected at the boundary.
    Control(ControlError),
    /// Settings could not be loaded or saved.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Sync(e) => write!(f, "sync: {e}"),
            Self::Control(e) => write!(f, "control: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Time sync errors
// ---------------------------------------------------------------------------

/// Why a [`Clock::sync`](crate::clock::Clock::sync) call did not produce a
/// fresh Unix time.  Every variant is soft and retried later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// Isolated and still inside the retry back-off window.
    RetryPending,
    /// No network link.
    NotConnected,
    /// Time server hostname did not resolve.
    ResolveFailed,
    /// Request datagram could not be sent.
    SendFailed,
    /// Socket error while waiting for the reply.
    ReceiveFailed,
    /// No reply within the polling window.
    Timeout,
    /// Reply had the wrong size.
    BadReply(usize),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryPending => write!(f, "retry interval not elapsed"),
            Self::NotConnected => write!(f, "network not connected"),
            Self::ResolveFailed => write!(f, "time server did not resolve"),
            Self::SendFailed => write!(f, "request send failed"),
            Self::ReceiveFailed => write!(f, "reply receive failed"),
            Self::Timeout => write!(f, "no reply from time server"),
            Self::BadReply(len) => write!(f, "reply of {len} bytes, expected 48"),
        }
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

// ---------------------------------------------------------------------------
// Control boundary errors
// ---------------------------------------------------------------------------

/// Invalid inbound control input.  State is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Valve index outside `0..NUM_VALVES`.
    InvalidValve(u8),
    /// One-off schedule delay was zero or negative.
    NonPositiveDelay,
    /// One-off schedule delay beyond what a 4-byte cell can hold.
    DelayTooLong,
    /// Cycle interval below the 60 s floor.
    IntervalTooShort,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValve(v) => write!(f, "invalid valve id {v}"),
            Self::NonPositiveDelay => write!(f, "schedule delay must be positive"),
            Self::DelayTooLong => write!(f, "schedule delay too long"),
            Self::IntervalTooShort => write!(f, "cycle interval below floor"),
        }
    }
}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}
