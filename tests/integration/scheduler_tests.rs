//! Duty-cycle scheduling across time domains, reboots and persistence.

use irrigator::actuator::ValveActuator;
use irrigator::clock::Clock;
use irrigator::config::IrrigatorConfig;
use irrigator::error::{ControlError, Error};
use irrigator::scheduler::{DutyCycleScheduler, ScheduledTask};
use irrigator::storage::{self, layout};
use irrigator::time::{CumulativeTime, TimeInterval};

use crate::mock_hw::{
    clock_config, valve, MockNetwork, MockStore, SimCounter, SimDelay, SimTime, ValveBank,
};

const UNIX: u32 = 1_700_000_000;
const DAY: u32 = 86_400;

struct Rig {
    time: SimTime,
    clock: Clock<SimCounter, SimDelay>,
    sched: DutyCycleScheduler,
    actuator: ValveActuator<ValveBank, SimDelay>,
    store: MockStore,
}

impl Rig {
    /// Fresh boot against `store`: device time restarts at zero.
    fn boot(store: MockStore) -> Self {
        let time = SimTime::default();
        let mut clock = Clock::new(time.counter(), time.delay(), clock_config());
        clock.load_uptime(&store).unwrap();
        let mut sched = DutyCycleScheduler::new(IrrigatorConfig::default().default_cycle_interval());
        sched.load_state(&store).unwrap();
        let actuator = ValveActuator::new(ValveBank::default(), time.delay(), 500);
        Self {
            time,
            clock,
            sched,
            actuator,
            store,
        }
    }

    fn fresh() -> Self {
        Self::boot(MockStore::formatted())
    }

    fn till(&mut self) -> TimeInterval {
        self.sched.time_interval_till_next_cycle(&mut self.clock)
    }

    fn due(&mut self) -> bool {
        self.sched.is_due(&mut self.clock)
    }

    fn run(&mut self) {
        self.sched
            .run(&mut self.clock, &mut self.actuator, &mut self.store)
            .unwrap();
    }

    fn sync(&mut self, unix: u32) {
        let mut net = MockNetwork::with_time(unix);
        self.clock.sync(&mut net, &mut self.store).unwrap();
    }

    fn enable(&mut self, v: u8, secs: u16) {
        self.sched
            .update_task(ScheduledTask::new(valve(v), true, secs, "zone"), &mut self.store)
            .unwrap();
    }
}

// ── Due-ness ─────────────────────────────────────────────────

#[test]
fn isolated_day_cycle_boundary() {
    let mut rig = Rig::fresh();
    assert!(rig.clock.is_isolated());

    rig.time.advance_secs(DAY - 1);
    assert!(!rig.due());
    assert_eq!(rig.till(), TimeInterval::from_secs(1));

    rig.time.advance_secs(1);
    assert!(rig.due());

    rig.run();
    assert!(!rig.due());
    assert_eq!(rig.till(), TimeInterval::from_secs(i64::from(DAY)));
    assert_eq!(rig.sched.last_cycle_cumulative(), CumulativeTime::from_secs(i64::from(DAY)));
}

#[test]
fn till_non_positive_iff_due_isolated_and_synced() {
    let mut rig = Rig::fresh();
    for step in [0, 3_600, 40_000, 42_799, 1, 1, 10_000] {
        rig.time.advance_secs(step);
        let till = rig.till();
        assert_eq!(till <= TimeInterval::ZERO, rig.due(), "isolated at {:?}", till);
    }

    rig.sync(UNIX);
    for step in [0, 1, 86_000, 500, 1] {
        rig.time.advance_secs(step);
        let till = rig.till();
        assert_eq!(till <= TimeInterval::ZERO, rig.due(), "synced at {:?}", till);
    }
}

#[test]
fn unset_unix_marker_is_derived_from_cumulative_time() {
    let mut rig = Rig::fresh();
    rig.time.advance_secs(100);
    rig.run();
    assert_eq!(rig.sched.last_cycle_unix(), None);

    rig.time.advance_secs(900);
    rig.sync(UNIX);
    assert!(!rig.clock.is_isolated());

    // Last cycle at ct 100 maps to UNIX - 900; due one day after that.
    assert_eq!(rig.till().secs(), i64::from(DAY) - 900 - 1);
    assert!(!rig.due());
    assert_eq!(rig.sched.last_cycle_unix(), None, "derived, not stored");
}

#[test]
fn wall_clock_decides_once_synced_after_downtime() {
    let mut rig = Rig::fresh();
    rig.sync(UNIX);
    rig.time.advance_secs(100);
    rig.run();
    assert_eq!(rig.store.u32_at(layout::LAST_CYCLE_UNIX_SECS), UNIX + 100);

    // Powered off for a day; only 100 s of uptime was recorded.
    let mut rig = Rig::boot(rig.store.clone());
    assert!(rig.clock.is_isolated());
    assert!(!rig.due(), "cumulative time alone says a day is left");

    rig.sync(UNIX + 100 + DAY + 5);
    assert!(rig.due());
    assert!(rig.till().secs() <= -5);
}

// ── Execution ────────────────────────────────────────────────

#[test]
fn run_executes_enabled_tasks_in_order() {
    let mut rig = Rig::fresh();
    rig.enable(2, 30);
    rig.enable(0, 10);
    rig.sched
        .update_task(ScheduledTask::new(valve(4), false, 99, "off"), &mut rig.store)
        .unwrap();

    let plan = rig.sched.plan_cycle();
    assert_eq!(plan.run.as_slice(), &[valve(0), valve(2)]);
    assert_eq!(plan.skipped.len(), 4);

    let report = rig
        .sched
        .run(&mut rig.clock, &mut rig.actuator, &mut rig.store)
        .unwrap();
    assert_eq!((report.ran, report.skipped), (2, 4));

    let bank = rig.actuator.valves();
    assert_eq!(bank.opened_sequence(), vec![0, 2]);
    assert_eq!(bank.max_open, 1);
    assert!(!bank.master_without_zone);
    assert_eq!(bank.open_count(), 0);
    assert!(!bank.master);

    // 40 s of watering plus four 500 ms settles per task.
    assert_eq!(rig.time.slept_ms(), 44_000);
    assert_eq!(rig.sched.last_cycle_cumulative().secs(), 44);
    assert_eq!(rig.store.u32_at(layout::LAST_CYCLE_CUMULATIVE_SECS), 44);
    assert_eq!(rig.store.u32_at(layout::PREVIOUS_UPTIME_SECS), 44);
}

#[test]
fn isolated_run_clears_stored_unix_marker() {
    let mut store = MockStore::formatted();
    storage::write_u32(&mut store, layout::LAST_CYCLE_UNIX_SECS, UNIX).unwrap();
    let mut rig = Rig::boot(store);
    assert!(rig.sched.last_cycle_unix().is_some());

    rig.run();
    assert_eq!(rig.sched.last_cycle_unix(), None);
    assert_eq!(rig.store.u32_at(layout::LAST_CYCLE_UNIX_SECS), storage::UNSET);
}

#[test]
fn run_keeps_markers_in_memory_when_store_fails() {
    let mut rig = Rig::fresh();
    rig.time.advance_secs(DAY);
    rig.store.fail_writes = true;

    let r = rig.sched.run(&mut rig.clock, &mut rig.actuator, &mut rig.store);
    assert!(r.is_err());
    assert!(!rig.due());
    assert_eq!(rig.store.u32_at(layout::LAST_CYCLE_CUMULATIVE_SECS), 0);
}

#[test]
fn reset_restarts_interval_without_watering() {
    let mut rig = Rig::fresh();
    rig.enable(1, 60);
    rig.time.advance_secs(DAY + 10);
    assert!(rig.due());

    rig.sched.reset(&mut rig.clock, &mut rig.store).unwrap();
    assert_eq!(rig.till(), TimeInterval::from_secs(i64::from(DAY)));
    assert!(rig.actuator.valves().calls.is_empty());
    assert_eq!(rig.store.u32_at(layout::LAST_CYCLE_CUMULATIVE_SECS), DAY + 10);
}

// ── One-off schedule ─────────────────────────────────────────

#[test]
fn one_off_takes_precedence_and_is_consumed() {
    let mut rig = Rig::fresh();
    rig.time.advance_secs(1_000);
    rig.sched
        .schedule(TimeInterval::from_secs(120), &mut rig.clock, &mut rig.store)
        .unwrap();
    assert_eq!(rig.till(), TimeInterval::from_secs(120));
    assert_eq!(rig.store.u32_at(layout::ONE_OFF_CUMULATIVE_SECS), 1_120);

    rig.time.advance_secs(120);
    assert!(rig.due());
    rig.run();

    assert_eq!(rig.sched.one_off(), None);
    assert_eq!(rig.store.u32_at(layout::ONE_OFF_CUMULATIVE_SECS), storage::UNSET);
    assert_eq!(rig.till(), TimeInterval::from_secs(i64::from(DAY)));
}

#[test]
fn one_off_survives_reboot() {
    let mut rig = Rig::fresh();
    rig.time.advance_secs(50);
    rig.sched
        .schedule(TimeInterval::from_secs(600), &mut rig.clock, &mut rig.store)
        .unwrap();
    rig.clock.save_uptime(&mut rig.store).unwrap();

    let mut rig = Rig::boot(rig.store.clone());
    assert_eq!(rig.sched.one_off(), Some(CumulativeTime::from_secs(650)));
    assert_eq!(rig.till(), TimeInterval::from_secs(600));
}

#[test]
fn non_positive_delay_rejected() {
    let mut rig = Rig::fresh();
    for secs in [0, -5] {
        let r = rig
            .sched
            .schedule(TimeInterval::from_secs(secs), &mut rig.clock, &mut rig.store);
        assert_eq!(r, Err(Error::Control(ControlError::NonPositiveDelay)));
    }
    assert_eq!(rig.sched.one_off(), None);
    assert_eq!(rig.store.writes, 0);
}

// ── Interval ─────────────────────────────────────────────────

#[test]
fn interval_below_floor_is_a_no_op() {
    let mut rig = Rig::fresh();
    let r = rig
        .sched
        .set_cycle_interval(TimeInterval::from_secs(30), &mut rig.store);
    assert_eq!(r, Err(Error::Control(ControlError::IntervalTooShort)));
    assert_eq!(rig.sched.cycle_interval(), TimeInterval::from_secs(i64::from(DAY)));
    assert_eq!(rig.store.u32_at(layout::CYCLE_INTERVAL_SECS), DAY);
    assert_eq!(rig.store.writes, 0);
}

#[test]
fn interval_change_persists_and_reloads() {
    let mut rig = Rig::fresh();
    rig.sched
        .set_cycle_interval(TimeInterval::from_secs(7_200), &mut rig.store)
        .unwrap();
    rig.time.advance_secs(7_200);
    assert!(rig.due());

    let rig = Rig::boot(rig.store.clone());
    assert_eq!(rig.sched.cycle_interval(), TimeInterval::from_secs(7_200));
}

#[test]
fn task_table_survives_reboot() {
    let mut rig = Rig::fresh();
    rig.sched
        .update_task(
            ScheduledTask::new(valve(5), true, 900, "back lawn sprinklers"),
            &mut rig.store,
        )
        .unwrap();

    let rig = Rig::boot(rig.store.clone());
    let t = rig.sched.task(valve(5));
    assert!(t.enabled);
    assert_eq!(t.duration_secs, 900);
    assert_eq!(t.description.as_str(), "back lawn sprin");
    assert!(!rig.sched.task(valve(0)).enabled);
}
