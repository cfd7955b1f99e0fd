//! System configuration parameters
//!
//! All tunable parameters for the irrigator.  Persisted as a postcard blob
//! in the settings region of the persistent store; see
//! [`storage::load_settings`](crate::storage::load_settings).

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::time::TimeInterval;

/// Shortest cycle interval the scheduler accepts, in seconds.
pub const MIN_CYCLE_INTERVAL_SECS: u32 = 60;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrigatorConfig {
    // --- Network time ---
    /// Time server hostname
    pub ntp_host: String<32>,
    /// Local UDP port bound for the request
    pub ntp_local_port: u16,
    /// Resync interval once synced (seconds)
    pub sync_interval_secs: u32,
    /// Retry interval while isolated (seconds)
    pub sync_retry_interval_secs: u32,

    // --- Uptime ---
    /// Minimum spacing between cumulative-uptime saves (seconds)
    pub uptime_save_interval_secs: u32,

    // --- Scheduling ---
    /// Cycle interval used when none is persisted (seconds)
    pub default_cycle_interval_secs: u32,

    // --- Valves ---
    /// Mechanical settle time after each valve transition (milliseconds)
    pub valve_settle_ms: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
}

impl Default for IrrigatorConfig {
    fn default() -> Self {
        let mut ntp_host = String::new();
        // Fits: 12 bytes into a 32-byte buffer.
        let _ = ntp_host.push_str("pool.ntp.org");

        Self {
            ntp_host,
            ntp_local_port: 2390,
            sync_interval_secs: 86_400,    // daily
            sync_retry_interval_secs: 60,  // 1/min while isolated
            uptime_save_interval_secs: 3_600,
            default_cycle_interval_secs: 86_400,
            valve_settle_ms: 500,
            control_loop_interval_ms: 1000, // 1 Hz
        }
    }
}

impl IrrigatorConfig {
    /// Rate-limit and endpoint parameters for the [`Clock`](crate::clock::Clock).
    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            ntp_host: self.ntp_host.clone(),
            ntp_local_port: self.ntp_local_port,
            sync_interval: TimeInterval::from_secs(i64::from(self.sync_interval_secs)),
            retry_interval: TimeInterval::from_secs(i64::from(self.sync_retry_interval_secs)),
            uptime_save_interval: TimeInterval::from_secs(i64::from(
                self.uptime_save_interval_secs,
            )),
        }
    }

    pub fn default_cycle_interval(&self) -> TimeInterval {
        TimeInterval::from_secs(i64::from(self.default_cycle_interval_secs))
    }
}

/// Clock tunables derived from [`IrrigatorConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    pub ntp_host: String<32>,
    pub ntp_local_port: u16,
    pub sync_interval: TimeInterval,
    pub retry_interval: TimeInterval,
    pub uptime_save_interval: TimeInterval,
}

impl Default for ClockConfig {
    fn default() -> Self {
        IrrigatorConfig::default().clock_config()
    }
}

/// Range-check every field.  Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &IrrigatorConfig) -> Result<(), ConfigError> {
    if cfg.ntp_host.is_empty() {
        return Err(ConfigError::ValidationFailed("ntp_host must not be empty"));
    }
    if cfg.ntp_local_port == 0 {
        return Err(ConfigError::ValidationFailed("ntp_local_port must be non-zero"));
    }
    if cfg.sync_retry_interval_secs == 0 {
        return Err(ConfigError::ValidationFailed(
            "sync_retry_interval_secs must be >= 1",
        ));
    }
    if cfg.sync_retry_interval_secs > cfg.sync_interval_secs {
        return Err(ConfigError::ValidationFailed(
            "sync_retry_interval_secs must be <= sync_interval_secs",
        ));
    }
    if cfg.uptime_save_interval_secs < 60 {
        return Err(ConfigError::ValidationFailed(
            "uptime_save_interval_secs must be >= 60",
        ));
    }
    if cfg.default_cycle_interval_secs < MIN_CYCLE_INTERVAL_SECS {
        return Err(ConfigError::ValidationFailed(
            "default_cycle_interval_secs must be >= 60",
        ));
    }
    if cfg.valve_settle_ms > 5000 {
        return Err(ConfigError::ValidationFailed("valve_settle_ms must be 0–5000"));
    }
    if !(100..=5000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 100–5000",
        ));
    }
    Ok(())
}
