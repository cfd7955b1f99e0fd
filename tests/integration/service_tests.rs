//! End-to-end control loop: boot, poll, commands, status.

use irrigator::adapters::console;
use irrigator::adapters::control::{ChannelControl, CommandChannel};
use irrigator::app::commands::ControlCommand;
use irrigator::app::events::AppEvent;
use irrigator::app::ports::{ConfigError, ConfigPort};
use irrigator::app::service::IrrigatorService;
use irrigator::config::IrrigatorConfig;
use irrigator::error::{ControlError, Error, SyncError};
use irrigator::storage::{self, layout};
use irrigator::time::TimeInterval;

use crate::mock_hw::{
    MockNetwork, MockStore, QueuedControl, RecordingSink, SimCounter, SimDelay, SimTime,
    ValveBank, ValveCall,
};

const UNIX: u32 = 1_700_000_000;
const DAY: u32 = 86_400;

type Service = IrrigatorService<SimCounter, SimDelay, ValveBank, SimDelay>;

fn boot(store: &mut MockStore, time: &SimTime, sink: &mut RecordingSink) -> Service {
    IrrigatorService::boot(
        store,
        time.counter(),
        time.delay(),
        ValveBank::default(),
        time.delay(),
        sink,
    )
}

fn task_cmd(valve: u8, secs: u16) -> ControlCommand {
    ControlCommand::UpdateTask {
        valve,
        enabled: true,
        duration_secs: secs,
        description: heapless::String::try_from("front").unwrap(),
    }
}

// ── Boot ─────────────────────────────────────────────────────

#[test]
fn first_boot_formats_store_and_closes_valves() {
    let mut store = MockStore::erased();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let svc = boot(&mut store, &time, &mut sink);

    assert_eq!(sink.events, vec![AppEvent::Started { formatted: true }]);
    assert_eq!(
        storage::read_u16(&store, layout::FIRMWARE_VERSION).unwrap(),
        storage::FIRMWARE_VERSION
    );
    assert_eq!(svc.scheduler().cycle_interval(), TimeInterval::from_secs(i64::from(DAY)));

    let calls = &svc.actuator().valves().calls;
    assert_eq!(calls[0], ValveCall::Master(false));
    assert_eq!(calls.len(), 1 + irrigator::actuator::NUM_VALVES);
    assert!(!svc.actuator().is_busy());

    let mut sink = RecordingSink::default();
    boot(&mut store, &time, &mut sink);
    assert_eq!(sink.events, vec![AppEvent::Started { formatted: false }]);
}

#[test]
fn boot_restores_state_from_previous_run() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    svc.handle_command(task_cmd(2, 45), &mut store, &mut sink).unwrap();
    svc.handle_command(ControlCommand::SetCycleInterval { secs: 3_600 }, &mut store, &mut sink)
        .unwrap();
    time.advance_secs(1_000);
    svc.clock_mut().save_uptime(&mut store).unwrap();

    let time = SimTime::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    assert_eq!(svc.task(2).unwrap().duration_secs, 45);
    assert_eq!(svc.scheduler().cycle_interval(), TimeInterval::from_secs(3_600));
    assert_eq!(svc.clock_mut().cumulative_time().secs(), 1_000);
    assert_eq!(svc.time_interval_till_next_cycle(), TimeInterval::from_secs(2_600));
}

// ── Control loop ─────────────────────────────────────────────

#[test]
fn poll_runs_cycle_when_due() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();
    let mut control = QueuedControl::default();
    control.0.push_back(task_cmd(1, 20));

    assert!(!svc.poll(&mut net, &mut store, &mut control, &mut sink));
    assert!(sink.events.contains(&AppEvent::SyncFailed(SyncError::NotConnected)));
    assert!(sink.events.contains(&AppEvent::TaskUpdated(crate::mock_hw::valve(1))));

    time.advance_secs(DAY);
    sink.events.clear();
    assert!(svc.poll(&mut net, &mut store, &mut control, &mut sink));

    assert_eq!(svc.cycles_run(), 1);
    assert!(sink.events.contains(&AppEvent::CycleStarted { planned: 1 }));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CycleCompleted(r) if r.ran == 1 && r.skipped == 5)),
        1
    );
    assert_eq!(svc.actuator().valves().opened_sequence(), vec![1]);
    assert!(!svc.is_due());
}

#[test]
fn one_command_per_poll() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();
    let mut control = QueuedControl::default();
    control.0.extend([task_cmd(0, 5), task_cmd(1, 5), task_cmd(2, 5)]);

    svc.poll(&mut net, &mut store, &mut control, &mut sink);
    assert_eq!(control.0.len(), 2);
    assert!(svc.task(0).unwrap().enabled);
    assert!(!svc.task(1).unwrap().enabled);
}

#[test]
fn sync_through_poll_emits_event() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::with_time(UNIX);

    svc.poll(&mut net, &mut store, &mut QueuedControl::default(), &mut sink);
    assert!(sink.events.contains(&AppEvent::TimeSynced { unix_secs: i64::from(UNIX) }));

    // Rate limited: nothing further is sent this iteration.
    svc.poll(&mut net, &mut store, &mut QueuedControl::default(), &mut sink);
    assert_eq!(net.sends.len(), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SyncFailed(_))), 0);
}

#[test]
fn retry_pending_is_not_reported_as_failure() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();

    for _ in 0..5 {
        svc.poll(&mut net, &mut store, &mut QueuedControl::default(), &mut sink);
        time.advance_secs(1);
    }
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SyncFailed(_))), 1);
}

#[test]
fn cycle_persist_failure_is_reported() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    time.advance_secs(DAY);
    store.fail_writes = true;

    svc.run_cycle(&mut store, &mut sink);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::PersistFailed(_))), 1);
    assert_eq!(svc.cycles_run(), 0);
    assert!(!svc.is_due());
}

// ── Commands ─────────────────────────────────────────────────

#[test]
fn invalid_valve_rejected_without_side_effects() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    store.writes = 0;

    let r = svc.handle_command(task_cmd(9, 10), &mut store, &mut sink);
    let err = Error::Control(ControlError::InvalidValve(9));
    assert_eq!(r, Err(err));
    assert_eq!(sink.events.last(), Some(&AppEvent::CommandRejected(err)));
    assert_eq!(store.writes, 0);
    assert_eq!(svc.task(9), Err(ControlError::InvalidValve(9)));
}

#[test]
fn short_interval_and_bad_delay_rejected() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);

    assert!(svc
        .handle_command(ControlCommand::SetCycleInterval { secs: 30 }, &mut store, &mut sink)
        .is_err());
    assert!(svc
        .handle_command(ControlCommand::Schedule { delay_secs: 0 }, &mut store, &mut sink)
        .is_err());
    assert_eq!(store.u32_at(layout::CYCLE_INTERVAL_SECS), DAY);
    assert_eq!(store.u32_at(layout::ONE_OFF_CUMULATIVE_SECS), storage::UNSET);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected(_))), 2);
}

#[test]
fn oversized_delay_rejected_without_arming() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();
    let mut control = QueuedControl::default();
    control.0.push_back(ControlCommand::Schedule { delay_secs: (1 << 48) + 5 });

    assert!(!svc.poll(&mut net, &mut store, &mut control, &mut sink));
    assert!(sink.events.contains(&AppEvent::CommandRejected(Error::Control(
        ControlError::DelayTooLong
    ))));
    assert!(!svc.status().one_off_armed);
    assert_eq!(store.u32_at(layout::ONE_OFF_CUMULATIVE_SECS), storage::UNSET);

    time.advance_secs(5);
    assert!(!svc.poll(&mut net, &mut store, &mut control, &mut sink));
}

#[test]
fn longest_delay_is_accepted() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);

    svc.handle_command(
        ControlCommand::Schedule { delay_secs: i64::from(u32::MAX) },
        &mut store,
        &mut sink,
    )
    .unwrap();
    assert!(svc.status().one_off_armed);
    assert!(svc.time_interval_till_next_cycle() > TimeInterval::from_secs(i64::from(DAY)));
}

#[test]
fn schedule_command_triggers_early_cycle() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();
    let mut control = QueuedControl::default();
    control.0.push_back(ControlCommand::Schedule { delay_secs: 300 });

    assert!(!svc.poll(&mut net, &mut store, &mut control, &mut sink));
    assert!(sink.events.contains(&AppEvent::OneOffArmed { in_secs: 300 }));
    assert!(svc.status().one_off_armed);

    time.advance_secs(300);
    assert!(svc.poll(&mut net, &mut store, &mut control, &mut sink));
    assert!(!svc.status().one_off_armed);
}

#[test]
fn reset_commands() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    time.advance_secs(DAY + 1);
    assert!(svc.is_due());

    svc.handle_command(ControlCommand::ResetCycle, &mut store, &mut sink).unwrap();
    assert!(!svc.is_due());
    assert_eq!(store.u32_at(layout::LAST_CYCLE_CUMULATIVE_SECS), DAY + 1);

    let before = svc.actuator().valves().calls.len();
    svc.handle_command(ControlCommand::ResetValves, &mut store, &mut sink).unwrap();
    assert_eq!(svc.actuator().valves().calls.len(), before + 7);
    assert_eq!(sink.events.last(), Some(&AppEvent::ValvesReset));
}

#[test]
fn config_update_applies_on_next_boot() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);

    let cfg = IrrigatorConfig {
        valve_settle_ms: 100,
        control_loop_interval_ms: 250,
        ..IrrigatorConfig::default()
    };
    svc.handle_command(ControlCommand::UpdateConfig(cfg.clone()), &mut store, &mut sink)
        .unwrap();
    assert_eq!(svc.config().valve_settle_ms, 500);

    let svc = boot(&mut store, &time, &mut sink);
    assert_eq!(svc.config(), &cfg);
}

#[test]
fn invalid_config_rejected() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);

    let bad = IrrigatorConfig {
        ntp_local_port: 0,
        ..IrrigatorConfig::default()
    };
    let r = svc.handle_command(ControlCommand::UpdateConfig(bad), &mut store, &mut sink);
    assert!(matches!(r, Err(Error::Config(ConfigError::ValidationFailed(_)))));
    assert_eq!(store.load().unwrap(), IrrigatorConfig::default());
}

// ── Status ───────────────────────────────────────────────────

#[test]
fn status_reports_isolation_and_serializes() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    time.advance_secs(3_661);

    let s = svc.status();
    assert!(s.isolated);
    assert_eq!(s.unix_time_secs, None);
    assert_eq!(s.cumulative_uptime_secs, 3_661);
    assert_eq!(s.since_last_cycle, "1h 1m 1s");
    assert_eq!(s.since_last_sync, "never");
    assert!(!s.due);
    assert_eq!(s.tasks.len(), 6);

    let json = s.to_json().unwrap();
    assert!(json.contains("\"isolated\":true"));
    assert!(json.contains("\"since_last_cycle\":\"1h 1m 1s\""));

    let mut net = MockNetwork::with_time(UNIX);
    svc.poll(&mut net, &mut store, &mut QueuedControl::default(), &mut sink);
    let s = svc.status();
    assert!(!s.isolated);
    assert_eq!(s.unix_time_secs, Some(i64::from(UNIX)));
    assert_eq!(s.since_last_sync, "0s");
}

#[test]
fn label_with_nul_reads_back_the_same_after_reboot() {
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);

    let cmd = ControlCommand::UpdateTask {
        valve: 1,
        enabled: true,
        duration_secs: 30,
        description: heapless::String::try_from("ab\0cd").unwrap(),
    };
    svc.handle_command(cmd, &mut store, &mut sink).unwrap();
    let before = svc.task(1).unwrap().clone();
    assert_eq!(before.description.as_str(), "ab");

    let svc = boot(&mut store, &time, &mut sink);
    assert_eq!(svc.task(1).unwrap(), &before);
}

#[test]
fn console_lines_reach_the_loop_one_per_poll() {
    static CH: CommandChannel = CommandChannel::new();
    let (tx, mut control) = ChannelControl::new(&CH);
    let mut store = MockStore::formatted();
    let time = SimTime::default();
    let mut sink = RecordingSink::default();
    let mut svc = boot(&mut store, &time, &mut sink);
    let mut net = MockNetwork::offline();

    assert!(console::submit("interval 7200\n", &tx));
    assert!(console::submit("task 3 on 20 roses\n", &tx));

    svc.poll(&mut net, &mut store, &mut control, &mut sink);
    assert_eq!(store.u32_at(layout::CYCLE_INTERVAL_SECS), 7_200);
    assert!(!svc.task(3).unwrap().enabled);

    svc.poll(&mut net, &mut store, &mut control, &mut sink);
    let task = svc.task(3).unwrap();
    assert!(task.enabled);
    assert_eq!(task.duration_secs, 20);
    assert_eq!(task.description.as_str(), "roses");
}
