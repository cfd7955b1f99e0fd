//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Clock · Scheduler · Actuator (domain)
//! ```
//!
//! Driven adapters (counter, storage, network, valves, event sinks)
//! implement these traits.  The domain consumes them via generics or
//! call-site injection, so tests substitute simulated collaborators.
//!
//! Blocking delays are not a port of their own: the domain uses
//! [`embedded_hal::delay::DelayNs`] directly.

use core::net::{Ipv4Addr, SocketAddrV4};

use crate::actuator::ValveId;
use crate::config::IrrigatorConfig;

use super::commands::ControlCommand;

// ───────────────────────────────────────────────────────────────
// Uptime counter (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Free-running hardware millisecond counter.
///
/// Wraps to zero after `u32::MAX` ms (~49.7 days).  The
/// [`Clock`](crate::clock::Clock) counts the wraps.
pub trait UptimeCounter {
    fn millis(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Persistent store (driven adapter: domain ↔ EEPROM / flash)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable persistent memory.
///
/// Callers address fixed, disjoint ranges from the static layout in
/// [`storage::layout`](crate::storage::layout).  A power loss during
/// `write` may leave a range half-written; nothing here guards against
/// that.
pub trait PersistentStore {
    /// Total addressable size in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` from `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` at `offset`, committing before returning.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Network (driven adapter: domain ↔ Wi-Fi / UDP)
// ───────────────────────────────────────────────────────────────

/// Intermittent IPv4 connectivity.  Nothing here is guaranteed to succeed.
pub trait NetworkPort {
    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Resolve a hostname to an IPv4 address.
    fn resolve(&mut self, host: &str) -> Result<Ipv4Addr, NetError>;

    /// Bind `local_port` (if not already bound) and send one datagram.
    fn udp_send(&mut self, local_port: u16, dest: SocketAddrV4, payload: &[u8])
    -> Result<(), NetError>;

    /// Non-blocking receive.  Returns the datagram length, or `None` when
    /// nothing has arrived yet.  A datagram longer than `buf` is truncated
    /// but its full length is still reported.
    fn udp_poll(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError>;

    /// Release the socket bound by `udp_send`.
    fn udp_close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Valve outputs (driven adapter: domain → solenoid drivers)
// ───────────────────────────────────────────────────────────────

/// Raw solenoid outputs.  Writes are assumed to always succeed; the
/// interlock lives in [`ValveActuator`](crate::actuator::ValveActuator),
/// not here.
pub trait ValvePort {
    fn set_output(&mut self, valve: ValveId, energized: bool);

    fn set_master(&mut self, energized: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Control surface (driving adapter: presentation layer → domain)
// ───────────────────────────────────────────────────────────────

/// Inbound control requests, at most one per loop iteration.
pub trait ControlPort {
    fn poll_command(&mut self) -> Option<ControlCommand>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`IrrigatorConfig`].
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Returns [`IrrigatorConfig::default()`] if nothing valid is stored.
    fn load(&self) -> Result<IrrigatorConfig, ConfigError>;

    fn save(&mut self, config: &IrrigatorConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`PersistentStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Range extends past the end of the store.
    OutOfBounds,
    /// Generic I/O error from the backend.
    IoError,
}

/// Errors from [`NetworkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    NotConnected,
    ResolveFailed,
    SocketError,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Encoded config does not fit the settings region.
    TooLarge,
    Storage(StorageError),
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "range out of bounds"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for NetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ResolveFailed => write!(f, "hostname resolution failed"),
            Self::SocketError => write!(f, "socket error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::TooLarge => write!(f, "config exceeds settings region"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}
