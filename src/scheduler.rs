//! Duty-cycle scheduler.
//!
//! Decides when the next watering cycle is due and runs it.  Due-ness is
//! evaluated in whichever time domain is trustworthy right now:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                time_interval_till_next_cycle                 │
//! │                                                              │
//! │   one-off armed? ──yes──▶ one_off − now            (CT)      │
//! │        │ no                                                  │
//! │        ▼                                                     │
//! │   isolated? ──────yes──▶ last_ct + interval − now  (CT)      │
//! │        │ no                                                  │
//! │        ▼                                                     │
//! │   last_ut = stored, or derived from last_ct                  │
//! │   last_ut + interval − now                         (UT)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-evaluated on every call, so a device that just left isolation gets
//! a calendar-accurate due time immediately.  A missing Unix marker is
//! derived from cumulative time and never read as "never ran".

use embedded_hal::delay::DelayNs;
use heapless::{String, Vec};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::actuator::{NUM_VALVES, ValveActuator, ValveId};
use crate::app::ports::{PersistentStore, StorageError, UptimeCounter, ValvePort};
use crate::clock::Clock;
use crate::config::MIN_CYCLE_INTERVAL_SECS;
use crate::error::{ControlError, Error};
use crate::storage::{self, layout};
use crate::time::{CumulativeTime, TimeInterval, UnixTime};

/// Longest task label in bytes.
pub const DESCRIPTION_CAPACITY: usize = 15;

// ═══════════════════════════════════════════════════════════════
//  Task table
// ═══════════════════════════════════════════════════════════════

/// One valve's watering task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub valve: ValveId,
    pub enabled: bool,
    /// Hold time with the valve open.
    pub duration_secs: u16,
    pub description: String<DESCRIPTION_CAPACITY>,
}

impl ScheduledTask {
    /// Label cut at the first NUL, then truncated to
    /// [`DESCRIPTION_CAPACITY`] bytes at a char boundary.  The stored record
    /// is NUL-terminated, so this is exactly what reads back after a reboot.
    pub fn new(valve: ValveId, enabled: bool, duration_secs: u16, description: &str) -> Self {
        let description = description.split_once('\0').map_or(description, |(head, _)| head);
        let mut end = description.len().min(DESCRIPTION_CAPACITY);
        while !description.is_char_boundary(end) {
            end -= 1;
        }
        let mut label = String::new();
        // Fits: `end` is within capacity.
        let _ = label.push_str(&description[..end]);
        Self {
            valve,
            enabled,
            duration_secs,
            description: label,
        }
    }

    /// Factory default: disabled, zero duration, empty label.
    pub fn disabled(valve: ValveId) -> Self {
        Self::new(valve, false, 0, "")
    }

    pub fn duration(&self) -> TimeInterval {
        TimeInterval::from_secs(i64::from(self.duration_secs))
    }
}

/// Which valves a cycle would water, in physical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CyclePlan {
    pub run: Vec<ValveId, NUM_VALVES>,
    pub skipped: Vec<ValveId, NUM_VALVES>,
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub ran: usize,
    pub skipped: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct DutyCycleScheduler {
    tasks: [ScheduledTask; NUM_VALVES],
    last_cycle_cumulative: CumulativeTime,
    last_cycle_unix: Option<UnixTime>,
    one_off: Option<CumulativeTime>,
    cycle_interval: TimeInterval,
    default_interval: TimeInterval,
}

impl DutyCycleScheduler {
    /// Fresh state: every task disabled, last cycle at cumulative zero.
    pub fn new(default_interval: TimeInterval) -> Self {
        Self {
            tasks: ValveId::per_valve(ScheduledTask::disabled),
            last_cycle_cumulative: CumulativeTime::from_secs(0),
            last_cycle_unix: None,
            one_off: None,
            cycle_interval: default_interval,
            default_interval,
        }
    }

    /// Restore markers, task table and interval from the store.
    pub fn load_state<S: PersistentStore + ?Sized>(&mut self, store: &S) -> Result<(), StorageError> {
        let last_ct = storage::read_u32(store, layout::LAST_CYCLE_CUMULATIVE_SECS)?;
        self.last_cycle_cumulative = CumulativeTime::from_secs(i64::from(last_ct));
        self.last_cycle_unix = storage::read_optional_secs(store, layout::LAST_CYCLE_UNIX_SECS)?
            .map(UnixTime::from_unix_secs);
        self.one_off = storage::read_optional_secs(store, layout::ONE_OFF_CUMULATIVE_SECS)?
            .map(|s| CumulativeTime::from_secs(i64::from(s)));

        for valve in ValveId::all() {
            self.tasks[valve.index()] = storage::read_task(store, valve)?;
        }

        self.cycle_interval = match storage::read_u32(store, layout::CYCLE_INTERVAL_SECS)? {
            secs if secs != storage::UNSET && secs >= MIN_CYCLE_INTERVAL_SECS => {
                TimeInterval::from_secs(i64::from(secs))
            }
            secs => {
                warn!(
                    "CYCLE | stored interval {} unusable, using default {}",
                    secs, self.default_interval
                );
                self.default_interval
            }
        };

        info!(
            "CYCLE | loaded: last ct {}s, last ut {:?}, interval {}, one-off {}",
            self.last_cycle_cumulative.secs(),
            self.last_cycle_unix.map(UnixTime::secs),
            self.cycle_interval,
            if self.one_off.is_some() { "armed" } else { "none" },
        );
        Ok(())
    }

    // ── Due-ness ──────────────────────────────────────────────

    pub fn is_due<C: UptimeCounter, D: DelayNs>(&self, clock: &mut Clock<C, D>) -> bool {
        self.time_interval_till_next_cycle(clock) <= TimeInterval::ZERO
    }

    /// Time left until the next cycle; zero or negative when due.
    pub fn time_interval_till_next_cycle<C: UptimeCounter, D: DelayNs>(
        &self,
        clock: &mut Clock<C, D>,
    ) -> TimeInterval {
        let dt = clock.device_time();
        let now_ct = clock.cumulative_time_from_device_time(dt);

        if let Some(at) = self.one_off {
            return at - now_ct;
        }

        let last_ut = self
            .last_cycle_unix
            .or_else(|| clock.unix_time_from_cumulative_time(self.last_cycle_cumulative));
        match (clock.unix_time_from_device_time(dt), last_ut) {
            (Some(now_ut), Some(last_ut)) => (last_ut + self.cycle_interval) - now_ut,
            _ => (self.last_cycle_cumulative + self.cycle_interval) - now_ct,
        }
    }

    pub fn time_interval_since_last_cycle<C: UptimeCounter, D: DelayNs>(
        &self,
        clock: &mut Clock<C, D>,
    ) -> TimeInterval {
        clock.cumulative_time() - self.last_cycle_cumulative
    }

    // ── Execution ─────────────────────────────────────────────

    /// Split the table into runnable and disabled valves.
    pub fn plan_cycle(&self) -> CyclePlan {
        let mut plan = CyclePlan::default();
        for task in &self.tasks {
            let bucket = if task.enabled {
                &mut plan.run
            } else {
                &mut plan.skipped
            };
            // Capacity equals the table size.
            let _ = bucket.push(task.valve);
        }
        plan
    }

    /// Run every enabled task, then record and persist the new markers.
    ///
    /// In-memory state is updated even when persisting fails.
    pub fn run<C, D, V, A, S>(
        &mut self,
        clock: &mut Clock<C, D>,
        actuator: &mut ValveActuator<V, A>,
        store: &mut S,
    ) -> Result<CycleReport, StorageError>
    where
        C: UptimeCounter,
        D: DelayNs,
        V: ValvePort,
        A: DelayNs,
        S: PersistentStore + ?Sized,
    {
        let plan = self.plan_cycle();
        info!("CYCLE | starting: {} to run, {} disabled", plan.run.len(), plan.skipped.len());

        for valve in &plan.skipped {
            info!("CYCLE | skipping valve {}: disabled", valve);
        }
        for valve in &plan.run {
            actuator.perform_task(&self.tasks[valve.index()]);
        }

        self.mark_now(clock);
        self.one_off = None;
        info!("CYCLE | finished at ct {}s", self.last_cycle_cumulative.secs());

        self.persist_markers(store)?;
        storage::write_optional_secs(store, layout::ONE_OFF_CUMULATIVE_SECS, None)?;
        clock.save_uptime(store)?;

        Ok(CycleReport {
            ran: plan.run.len(),
            skipped: plan.skipped.len(),
        })
    }

    /// Restart the interval from now without watering.
    pub fn reset<C, D, S>(&mut self, clock: &mut Clock<C, D>, store: &mut S) -> Result<(), StorageError>
    where
        C: UptimeCounter,
        D: DelayNs,
        S: PersistentStore + ?Sized,
    {
        self.mark_now(clock);
        info!("CYCLE | reset at ct {}s", self.last_cycle_cumulative.secs());
        self.persist_markers(store)
    }

    /// Arm a one-off run `delay` from now; the next `run` consumes it.
    pub fn schedule<C, D, S>(
        &mut self,
        delay: TimeInterval,
        clock: &mut Clock<C, D>,
        store: &mut S,
    ) -> Result<(), Error>
    where
        C: UptimeCounter,
        D: DelayNs,
        S: PersistentStore + ?Sized,
    {
        if !delay.is_positive() {
            return Err(ControlError::NonPositiveDelay.into());
        }
        let at = clock.cumulative_time() + delay;
        self.one_off = Some(at);
        info!("CYCLE | one-off armed in {}", delay);
        storage::write_optional_secs(store, layout::ONE_OFF_CUMULATIVE_SECS, Some(secs_u32(at.secs())))?;
        Ok(())
    }

    /// Intervals under the 60 s floor are rejected and not persisted.
    pub fn set_cycle_interval<S: PersistentStore + ?Sized>(
        &mut self,
        interval: TimeInterval,
        store: &mut S,
    ) -> Result<(), Error> {
        if interval < TimeInterval::from_secs(i64::from(MIN_CYCLE_INTERVAL_SECS)) {
            warn!("CYCLE | rejected interval {}: below floor", interval);
            return Err(ControlError::IntervalTooShort.into());
        }
        self.cycle_interval = interval;
        storage::write_u32(store, layout::CYCLE_INTERVAL_SECS, secs_u32(interval.secs()))?;
        info!("CYCLE | interval set to {}", interval);
        Ok(())
    }

    /// Overwrite one valve's task and persist it.
    pub fn update_task<S: PersistentStore + ?Sized>(
        &mut self,
        task: ScheduledTask,
        store: &mut S,
    ) -> Result<(), StorageError> {
        storage::write_task(store, &task)?;
        info!(
            "CYCLE | task {} updated: enabled={} {}s \"{}\"",
            task.valve, task.enabled, task.duration_secs, task.description
        );
        let slot = task.valve.index();
        self.tasks[slot] = task;
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn task(&self, valve: ValveId) -> &ScheduledTask {
        &self.tasks[valve.index()]
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn cycle_interval(&self) -> TimeInterval {
        self.cycle_interval
    }

    pub fn one_off(&self) -> Option<CumulativeTime> {
        self.one_off
    }

    pub fn last_cycle_cumulative(&self) -> CumulativeTime {
        self.last_cycle_cumulative
    }

    pub fn last_cycle_unix(&self) -> Option<UnixTime> {
        self.last_cycle_unix
    }

    // ── Internals ─────────────────────────────────────────────

    /// Both markers from a single counter read.  Isolated ⇒ Unix marker cleared.
    fn mark_now<C: UptimeCounter, D: DelayNs>(&mut self, clock: &mut Clock<C, D>) {
        let dt = clock.device_time();
        self.last_cycle_cumulative = clock.cumulative_time_from_device_time(dt);
        self.last_cycle_unix = clock.unix_time_from_device_time(dt);
    }

    fn persist_markers<S: PersistentStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        storage::write_u32(
            store,
            layout::LAST_CYCLE_CUMULATIVE_SECS,
            secs_u32(self.last_cycle_cumulative.secs()),
        )?;
        storage::write_optional_secs(
            store,
            layout::LAST_CYCLE_UNIX_SECS,
            self.last_cycle_unix.map(|t| secs_u32(t.secs())),
        )
    }
}

/// Clamp into a 4-byte cell, keeping clear of the unset marker.
fn secs_u32(secs: i64) -> u32 {
    secs.clamp(0, i64::from(storage::UNSET - 1)) as u32
}
