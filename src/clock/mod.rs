//! Clock: reconciles device uptime, network time and persisted uptime.
//!
//! ```text
//!   UptimeCounter ──▶ DeviceTime ──┬──▶ + startup          ──▶ UnixTime
//!   (wraps ~49 d)    (+ overflow)  └──▶ + previous uptime  ──▶ CumulativeTime
//!                                                              │
//!                                        + first startup ◀─────┘ ──▶ UnixTime
//! ```
//!
//! `startup` and `first_startup` are learned from a successful [`sync`]
//! and stay `None` while the device is isolated.  `previous_uptime` is
//! restored from the persistent store at boot and re-saved periodically.
//!
//! [`sync`]: Clock::sync

pub mod ntp;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{NetworkPort, PersistentStore, StorageError, UptimeCounter};
use crate::config::ClockConfig;
use crate::error::SyncError;
use crate::storage::{self, layout};
use crate::time::{CumulativeTime, DeviceTime, TimeInterval, UnixTime};

/// Result of a [`Clock::sync`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A fresh time was obtained from the network.
    Synced(UnixTime),
    /// Already synced within the resync interval; nothing was sent.
    UpToDate,
}

pub struct Clock<C, D> {
    counter: C,
    delay: D,
    config: ClockConfig,

    overflow: u16,
    last_millis: u32,

    last_successful_sync: Option<DeviceTime>,
    last_sync_attempt: Option<DeviceTime>,
    last_uptime_save: Option<DeviceTime>,

    startup: Option<UnixTime>,
    first_startup: Option<UnixTime>,
    previous_uptime: TimeInterval,
}

impl<C: UptimeCounter, D: DelayNs> Clock<C, D> {
    /// Boot-time construction.  Counts as an uptime save, so the first
    /// periodic save happens one save interval after boot.
    pub fn new(counter: C, delay: D, config: ClockConfig) -> Self {
        let mut clock = Self {
            counter,
            delay,
            config,
            overflow: 0,
            last_millis: 0,
            last_successful_sync: None,
            last_sync_attempt: None,
            last_uptime_save: None,
            startup: None,
            first_startup: None,
            previous_uptime: TimeInterval::ZERO,
        };
        clock.last_uptime_save = Some(clock.device_time());
        clock
    }

    // ── Device time ───────────────────────────────────────────

    /// Read the counter, counting a wrap whenever it went backwards.
    ///
    /// Must run at least once per counter period (~49.7 days) or a wrap
    /// is missed.
    pub fn device_time(&mut self) -> DeviceTime {
        let ms = self.counter.millis();
        if ms < self.last_millis {
            self.overflow = self.overflow.wrapping_add(1);
            info!("CLOCK | uptime counter wrapped ({} wraps)", self.overflow);
        }
        self.last_millis = ms;
        DeviceTime::from_counter(ms, self.overflow)
    }

    pub fn overflow_count(&self) -> u16 {
        self.overflow
    }

    // ── Unix time ─────────────────────────────────────────────

    /// No Unix time established since boot.
    pub fn is_isolated(&self) -> bool {
        self.startup.is_none()
    }

    pub fn unix_time(&mut self) -> Option<UnixTime> {
        let dt = self.device_time();
        self.unix_time_from_device_time(dt)
    }

    pub fn unix_time_from_device_time(&self, dt: DeviceTime) -> Option<UnixTime> {
        self.startup.map(|s| s + dt.since_epoch())
    }

    /// Calendar time for a cumulative-uptime instant, anchored at the
    /// estimated first-ever boot.
    pub fn unix_time_from_cumulative_time(&self, ct: CumulativeTime) -> Option<UnixTime> {
        self.first_startup.map(|s| s + ct.since_epoch())
    }

    // ── Cumulative time ───────────────────────────────────────

    pub fn cumulative_time(&mut self) -> CumulativeTime {
        let dt = self.device_time();
        self.cumulative_time_from_device_time(dt)
    }

    pub fn cumulative_time_from_device_time(&self, dt: DeviceTime) -> CumulativeTime {
        CumulativeTime::from_device_time(dt, self.previous_uptime)
    }

    pub fn previous_uptime(&self) -> TimeInterval {
        self.previous_uptime
    }

    // ── Persistence ───────────────────────────────────────────

    /// Restore the uptime accumulated over earlier boots.
    pub fn load_uptime<S: PersistentStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<(), StorageError> {
        let secs = match storage::read_optional_secs(store, layout::PREVIOUS_UPTIME_SECS)? {
            Some(s) => s,
            None => {
                warn!("CLOCK | no persisted uptime, starting from zero");
                0
            }
        };
        self.previous_uptime = TimeInterval::from_secs(i64::from(secs));
        info!(
            "CLOCK | loaded previous uptime: {} ({})",
            self.previous_uptime, secs
        );
        Ok(())
    }

    /// Persist previous uptime plus this boot's uptime, in whole seconds.
    ///
    /// `previous_uptime` itself is not advanced: it stays the offset this
    /// boot started from.
    pub fn save_uptime<S: PersistentStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<(), StorageError> {
        let now = self.device_time();
        let total = self.previous_uptime.secs() + now.secs();
        // UNSET is reserved.
        let secs = u32::try_from(total).unwrap_or(storage::UNSET - 1);
        storage::write_u32(store, layout::PREVIOUS_UPTIME_SECS, secs)?;
        self.last_uptime_save = Some(now);
        info!(
            "CLOCK | saved uptime: {}",
            TimeInterval::from_secs(i64::from(secs))
        );
        Ok(())
    }

    /// [`save_uptime`](Self::save_uptime) when the save interval has passed.
    /// Returns whether a save happened.
    pub fn save_uptime_if_due<S: PersistentStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<bool, StorageError> {
        let now = self.device_time();
        let due = self
            .last_uptime_save
            .is_none_or(|last| now - last > self.config.uptime_save_interval);
        if due {
            self.save_uptime(store)?;
        }
        Ok(due)
    }

    // ── Network sync ──────────────────────────────────────────

    /// Rate-limited network time sync.  Never blocks much beyond a second.
    ///
    /// The uptime save check runs first and regardless of the outcome.  A
    /// failed save is logged and does not abort the sync.
    pub fn sync<N, S>(&mut self, net: &mut N, store: &mut S) -> Result<SyncOutcome, SyncError>
    where
        N: NetworkPort + ?Sized,
        S: PersistentStore + ?Sized,
    {
        let now = self.device_time();
        debug!(
            "CLOCK | device time {}, cumulative {}",
            now.since_epoch(),
            self.cumulative_time_from_device_time(now).since_epoch()
        );

        if let Err(e) = self.save_uptime_if_due(store) {
            warn!("CLOCK | uptime save failed: {}", e);
        }

        if let Some(last) = self.last_successful_sync {
            if now - last < self.config.sync_interval {
                return Ok(SyncOutcome::UpToDate);
            }
        }
        // A failed attempt is one not followed by a success.  This also
        // throttles resync retries once the resync interval has lapsed.
        if let Some(attempt) = self.last_sync_attempt {
            let failed = self.last_successful_sync.is_none_or(|s| attempt > s);
            if failed && now - attempt < self.config.retry_interval {
                return Err(SyncError::RetryPending);
            }
        }

        self.last_sync_attempt = Some(now);

        let current = ntp::exchange(
            net,
            &mut self.delay,
            &self.config.ntp_host,
            self.config.ntp_local_port,
        )?;
        let sync_time = self.device_time();
        self.apply_sync(current, sync_time);
        Ok(SyncOutcome::Synced(current))
    }

    /// Record `current` as the Unix time observed at device time `at`.
    fn apply_sync(&mut self, current: UnixTime, at: DeviceTime) {
        let ct = self.cumulative_time_from_device_time(at);
        self.startup = Some(current - TimeInterval::from_secs(at.secs()));
        self.first_startup = Some(current - TimeInterval::from_secs(ct.secs()));
        self.last_successful_sync = Some(at);
        info!("CLOCK | synced: unix {}", current.secs());
    }

    pub fn last_successful_sync(&self) -> Option<DeviceTime> {
        self.last_successful_sync
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Blocking delay source shared with the sync poll loop.
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }
}
