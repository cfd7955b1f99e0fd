//! Application service: the hexagonal core.
//!
//! [`IrrigatorService`] owns the Clock, the duty-cycle scheduler and the
//! valve actuator.  Storage, network, control input and event output are
//! injected at call sites, so the whole loop runs against mock adapters.
//!
//! ```text
//!  NetworkPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  ControlPort ──▶ │       IrrigatorService       │
//!                  │ Clock · Scheduler · Actuator │ ──▶ ValvePort
//!  PersistentStore ◀──────────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::{debug, info, warn};
use serde::Serialize;

use crate::actuator::{NUM_VALVES, ValveActuator, ValveId};
use crate::clock::{Clock, SyncOutcome};
use crate::config::IrrigatorConfig;
use crate::error::{ControlError, Error, SyncError};
use crate::scheduler::{DutyCycleScheduler, ScheduledTask};
use crate::storage;
use crate::time::{OrNever, TimeInterval};

use super::commands::{ControlCommand, MAX_SCHEDULE_DELAY_SECS};
use super::events::AppEvent;
use super::ports::{
    ConfigPort, ControlPort, EventSink, NetworkPort, PersistentStore, UptimeCounter, ValvePort,
};

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

/// Point-in-time view for a presentation layer.  Serializes to JSON.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub isolated: bool,
    pub unix_time_secs: Option<i64>,
    pub device_uptime_secs: i64,
    pub cumulative_uptime_secs: i64,
    pub since_last_cycle: std::string::String,
    pub till_next_cycle: std::string::String,
    pub till_next_cycle_secs: i64,
    pub since_last_sync: std::string::String,
    pub due: bool,
    pub cycle_interval_secs: i64,
    pub one_off_armed: bool,
    pub valves_busy: bool,
    pub interlock_recoveries: u32,
    pub tasks: Vec<ScheduledTask, NUM_VALVES>,
}

impl StatusReport {
    pub fn to_json(&self) -> Result<std::string::String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ───────────────────────────────────────────────────────────────
// IrrigatorService
// ───────────────────────────────────────────────────────────────

pub struct IrrigatorService<C, D, V, A> {
    clock: Clock<C, D>,
    scheduler: DutyCycleScheduler,
    actuator: ValveActuator<V, A>,
    config: IrrigatorConfig,
    cycles_run: u32,
}

impl<C, D, V, A> IrrigatorService<C, D, V, A>
where
    C: UptimeCounter,
    D: DelayNs,
    V: ValvePort,
    A: DelayNs,
{
    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the controller up from whatever the store holds.
    ///
    /// Never fails: every unreadable piece of state falls back to a
    /// default and is logged.  All valves end up closed.
    pub fn boot<S>(
        store: &mut S,
        counter: C,
        clock_delay: D,
        valves: V,
        valve_delay: A,
        sink: &mut impl EventSink,
    ) -> Self
    where
        S: PersistentStore + ConfigPort + ?Sized,
    {
        let defaults = IrrigatorConfig::default();
        let formatted = match storage::ensure_formatted(store, defaults.default_cycle_interval_secs)
        {
            Ok(f) => f,
            Err(e) => {
                warn!("boot: store format check failed: {}", e);
                false
            }
        };

        let config = store.load().unwrap_or_else(|e| {
            warn!("boot: config load failed ({}), using defaults", e);
            IrrigatorConfig::default()
        });

        let mut clock = Clock::new(counter, clock_delay, config.clock_config());
        if let Err(e) = clock.load_uptime(&*store) {
            warn!("boot: uptime load failed: {}", e);
        }

        let mut scheduler = DutyCycleScheduler::new(config.default_cycle_interval());
        if let Err(e) = scheduler.load_state(&*store) {
            warn!("boot: scheduler state load failed: {}", e);
        }

        let mut actuator = ValveActuator::new(valves, valve_delay, config.valve_settle_ms);
        actuator.reset();

        info!(
            "IrrigatorService started (formatted={}, interval {})",
            formatted,
            scheduler.cycle_interval()
        );
        sink.emit(&AppEvent::Started { formatted });

        Self {
            clock,
            scheduler,
            actuator,
            config,
            cycles_run: 0,
        }
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One control-loop iteration: sync, at most one command, due check.
    ///
    /// Returns `true` when a duty cycle ran.
    pub fn poll<N, S>(
        &mut self,
        net: &mut N,
        store: &mut S,
        control: &mut impl ControlPort,
        sink: &mut impl EventSink,
    ) -> bool
    where
        N: NetworkPort + ?Sized,
        S: PersistentStore + ConfigPort + ?Sized,
    {
        self.sync_time(net, store, sink);

        if let Some(cmd) = control.poll_command() {
            // Rejections are already logged and emitted.
            let _ = self.handle_command(cmd, store, sink);
        }

        if self.scheduler.is_due(&mut self.clock) {
            self.run_cycle(store, sink);
            return true;
        }
        false
    }

    fn sync_time<N, S>(&mut self, net: &mut N, store: &mut S, sink: &mut impl EventSink)
    where
        N: NetworkPort + ?Sized,
        S: PersistentStore + ?Sized,
    {
        match self.clock.sync(net, store) {
            Ok(SyncOutcome::Synced(t)) => {
                sink.emit(&AppEvent::TimeSynced { unix_secs: t.secs() });
            }
            Ok(SyncOutcome::UpToDate) => {}
            Err(SyncError::RetryPending) => debug!("sync: waiting for retry interval"),
            Err(e) => {
                warn!("sync failed: {}", e);
                sink.emit(&AppEvent::SyncFailed(e));
            }
        }
    }

    /// Run a duty cycle now, regardless of due-ness.
    pub fn run_cycle<S: PersistentStore + ?Sized>(&mut self, store: &mut S, sink: &mut impl EventSink) {
        let plan = self.scheduler.plan_cycle();
        sink.emit(&AppEvent::CycleStarted {
            planned: plan.run.len(),
        });

        match self
            .scheduler
            .run(&mut self.clock, &mut self.actuator, store)
        {
            Ok(report) => {
                self.cycles_run = self.cycles_run.saturating_add(1);
                sink.emit(&AppEvent::CycleCompleted(report));
            }
            Err(e) => {
                // Markers stay updated in memory.
                warn!("cycle ran but persisting failed: {}", e);
                sink.emit(&AppEvent::PersistFailed(e.into()));
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one control request.  Invalid input leaves state unchanged.
    pub fn handle_command<S>(
        &mut self,
        cmd: ControlCommand,
        store: &mut S,
        sink: &mut impl EventSink,
    ) -> Result<(), Error>
    where
        S: PersistentStore + ConfigPort + ?Sized,
    {
        match self.apply_command(cmd, store) {
            Ok(event) => {
                sink.emit(&event);
                Ok(())
            }
            Err(e) => {
                warn!("command rejected: {}", e);
                sink.emit(&AppEvent::CommandRejected(e));
                Err(e)
            }
        }
    }

    fn apply_command<S>(&mut self, cmd: ControlCommand, store: &mut S) -> Result<AppEvent, Error>
    where
        S: PersistentStore + ConfigPort + ?Sized,
    {
        match cmd {
            ControlCommand::UpdateTask {
                valve,
                enabled,
                duration_secs,
                description,
            } => {
                let valve = ValveId::try_from(valve)?;
                let task = ScheduledTask::new(valve, enabled, duration_secs, &description);
                self.scheduler.update_task(task, store)?;
                Ok(AppEvent::TaskUpdated(valve))
            }
            ControlCommand::ResetCycle => {
                self.scheduler.reset(&mut self.clock, store)?;
                Ok(AppEvent::CycleReset)
            }
            ControlCommand::Schedule { delay_secs } => {
                if delay_secs > MAX_SCHEDULE_DELAY_SECS {
                    return Err(ControlError::DelayTooLong.into());
                }
                self.scheduler.schedule(
                    TimeInterval::from_secs(delay_secs),
                    &mut self.clock,
                    store,
                )?;
                Ok(AppEvent::OneOffArmed {
                    in_secs: delay_secs,
                })
            }
            ControlCommand::SetCycleInterval { secs } => {
                self.scheduler
                    .set_cycle_interval(TimeInterval::from_secs(i64::from(secs)), store)?;
                Ok(AppEvent::IntervalChanged {
                    secs: i64::from(secs),
                })
            }
            ControlCommand::ResetValves => {
                self.actuator.reset();
                Ok(AppEvent::ValvesReset)
            }
            ControlCommand::UpdateConfig(cfg) => {
                store.save(&cfg)?;
                info!("config saved; applies after restart");
                Ok(AppEvent::ConfigSaved)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn task(&self, index: u8) -> Result<&ScheduledTask, ControlError> {
        let valve = ValveId::try_from(index)?;
        Ok(self.scheduler.task(valve))
    }

    pub fn is_due(&mut self) -> bool {
        self.scheduler.is_due(&mut self.clock)
    }

    pub fn time_interval_till_next_cycle(&mut self) -> TimeInterval {
        self.scheduler.time_interval_till_next_cycle(&mut self.clock)
    }

    pub fn time_interval_since_last_cycle(&mut self) -> TimeInterval {
        self.scheduler.time_interval_since_last_cycle(&mut self.clock)
    }

    pub fn status(&mut self) -> StatusReport {
        let dt = self.clock.device_time();
        let ct = self.clock.cumulative_time_from_device_time(dt);
        let since = self.time_interval_since_last_cycle();
        let till = self.time_interval_till_next_cycle();

        let mut tasks = Vec::new();
        for t in self.scheduler.tasks() {
            // Capacity equals the table size.
            let _ = tasks.push(t.clone());
        }

        StatusReport {
            isolated: self.clock.is_isolated(),
            unix_time_secs: self.clock.unix_time_from_device_time(dt).map(|t| t.secs()),
            device_uptime_secs: dt.secs(),
            cumulative_uptime_secs: ct.secs(),
            since_last_cycle: since.to_string(),
            till_next_cycle: till.to_string(),
            till_next_cycle_secs: till.secs(),
            since_last_sync: OrNever(self.clock.last_successful_sync().map(|at| dt - at)).to_string(),
            due: till <= TimeInterval::ZERO,
            cycle_interval_secs: self.scheduler.cycle_interval().secs(),
            one_off_armed: self.scheduler.one_off().is_some(),
            valves_busy: self.actuator.is_busy(),
            interlock_recoveries: self.actuator.interlock_recoveries(),
            tasks,
        }
    }

    pub fn cycles_run(&self) -> u32 {
        self.cycles_run
    }

    pub fn config(&self) -> &IrrigatorConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock<C, D> {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock<C, D> {
        &mut self.clock
    }

    pub fn scheduler(&self) -> &DutyCycleScheduler {
        &self.scheduler
    }

    pub fn actuator(&self) -> &ValveActuator<V, A> {
        &self.actuator
    }
}
