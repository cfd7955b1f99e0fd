//! Valve interlock.
//!
//! Six output valves share one master (supply) valve.  At most one output
//! valve is energized at any instant; the master may be open only while
//! exactly one output is.
//!
//! ```text
//!   perform_task:  open target ─▶ open master ─▶ hold ─▶ close master ─▶ close target
//! ```
//!
//! The master opens after the target so a closed line is never
//! pressurized, and closes first so the line being shut sees no spike.
//! Every transition waits a mechanical settle time.
//!
//! ## Dual-target design
//!
//! Outputs go through a [`ValvePort`]; delays through `DelayNs`.  On
//! ESP-IDF these are GPIO solenoid drivers and a watchdog-feeding delay.
//! On host/test they are in-memory recorders.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ValvePort;
use crate::scheduler::ScheduledTask;

/// Number of physical output valves.
pub const NUM_VALVES: usize = 6;

/// Physical output valve index, always `< NUM_VALVES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ValveId(u8);

impl ValveId {
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < NUM_VALVES {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every valve in physical order.
    pub fn all() -> impl Iterator<Item = ValveId> {
        (0..NUM_VALVES as u8).map(ValveId)
    }

    /// Build a per-valve table indexed by physical position.
    pub fn per_valve<T>(mut f: impl FnMut(ValveId) -> T) -> [T; NUM_VALVES] {
        core::array::from_fn(|i| f(ValveId(i as u8)))
    }
}

impl TryFrom<u8> for ValveId {
    type Error = crate::error::ControlError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::new(v).ok_or(crate::error::ControlError::InvalidValve(v))
    }
}

impl From<ValveId> for u8 {
    fn from(v: ValveId) -> u8 {
        v.0
    }
}

impl fmt::Display for ValveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct ValveActuator<V, D> {
    valves: V,
    delay: D,
    settle_ms: u32,
    open_mask: u8,
    master_open: bool,
    recoveries: u32,
}

impl<V: ValvePort, D: DelayNs> ValveActuator<V, D> {
    /// Takes ownership of the outputs without touching them; call
    /// [`reset`](Self::reset) before first use.
    pub fn new(valves: V, delay: D, settle_ms: u32) -> Self {
        Self {
            valves,
            delay,
            settle_ms,
            open_mask: 0,
            master_open: false,
            recoveries: 0,
        }
    }

    /// Energize `valve`, force-closing any output found open first.
    pub fn open_valve(&mut self, valve: ValveId) {
        info!("VALVE | opening {}", valve);
        self.close_stale(valve);
        self.valves.set_output(valve, true);
        self.open_mask |= 1 << valve.get();
        self.delay.delay_ms(self.settle_ms);
    }

    pub fn close_valve(&mut self, valve: ValveId) {
        self.valves.set_output(valve, false);
        self.open_mask &= !(1 << valve.get());
        self.delay.delay_ms(self.settle_ms);
    }

    /// Run one watering task.  Blocks for the task duration plus four
    /// settle times.
    pub fn perform_task(&mut self, task: &ScheduledTask) {
        info!(
            "VALVE | task start: valve {} for {}s",
            task.valve, task.duration_secs
        );
        self.open_valve(task.valve);
        self.set_master(true);

        self.delay.delay_ms(u32::from(task.duration_secs) * 1000);

        self.set_master(false);
        self.close_valve(task.valve);
        info!("VALVE | task done: valve {}", task.valve);
    }

    /// Unconditionally de-energize master and every output.
    pub fn reset(&mut self) {
        self.valves.set_master(false);
        self.master_open = false;
        for v in ValveId::all() {
            self.valves.set_output(v, false);
        }
        self.open_mask = 0;
        debug!("VALVE | all closed");
    }

    /// Any output or the master currently open.
    pub fn is_busy(&self) -> bool {
        self.open_mask != 0 || self.master_open
    }

    /// Bit `n` set while output `n` is open.
    pub fn open_mask(&self) -> u8 {
        self.open_mask
    }

    pub fn master_open(&self) -> bool {
        self.master_open
    }

    /// Stale-open valves force-closed since construction.
    pub fn interlock_recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn valves(&self) -> &V {
        &self.valves
    }

    fn set_master(&mut self, open: bool) {
        self.valves.set_master(open);
        self.master_open = open;
        self.delay.delay_ms(self.settle_ms);
    }

    fn close_stale(&mut self, opening: ValveId) {
        if self.open_mask == 0 {
            return;
        }
        for v in ValveId::all() {
            if self.open_mask & (1 << v.get()) != 0 {
                warn!(
                    "VALVE | {} was already open when opening {}, forcing closed (mask {:#08b})",
                    v, opening, self.open_mask
                );
                self.recoveries = self.recoveries.saturating_add(1);
                self.close_valve(v);
            }
        }
    }
}
