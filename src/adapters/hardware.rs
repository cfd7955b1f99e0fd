//! Hardware adapter: bridges the solenoid drivers to [`ValvePort`].
//!
//! Owns one [`SolenoidDriver`] per zone plus the master supply valve.
//! This is the only module that touches valve outputs.  On host builds
//! the drivers run over whatever `OutputPin` the caller supplies.

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::actuator::{ValveId, NUM_VALVES};
use crate::app::ports::ValvePort;
use crate::drivers::solenoid::SolenoidDriver;

/// Concrete adapter combining all valve drivers behind [`ValvePort`].
pub struct HardwareAdapter<P> {
    zones: [SolenoidDriver<P>; NUM_VALVES],
    master: SolenoidDriver<P>,
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(zones: [SolenoidDriver<P>; NUM_VALVES], master: SolenoidDriver<P>) -> Self {
        Self { zones, master }
    }

    pub fn zone(&self, valve: ValveId) -> &SolenoidDriver<P> {
        &self.zones[valve.index()]
    }

    pub fn master(&self) -> &SolenoidDriver<P> {
        &self.master
    }

    /// Bitmask of energized zone outputs, bit `n` = valve `n`.
    pub fn energized_mask(&self) -> u8 {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.is_energized())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }
}

// ── ValvePort implementation ──────────────────────────────────

impl<P: OutputPin> ValvePort for HardwareAdapter<P> {
    fn set_output(&mut self, valve: ValveId, open: bool) {
        let zone = &mut self.zones[valve.index()];
        debug!("VALVE | {} -> {}", zone.label(), if open { "open" } else { "closed" });
        zone.set(open);
    }

    fn set_master(&mut self, open: bool) {
        debug!("VALVE | master -> {}", if open { "open" } else { "closed" });
        self.master.set(open);
    }
}
