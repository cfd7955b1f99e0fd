//! Solenoid valve driver (logic-level MOSFET or relay per valve).
//!
//! HIGH energizes the coil and opens the valve.  This driver is a dumb
//! output; the single-open interlock is enforced by
//! [`ValveActuator`](crate::actuator::ValveActuator).
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::digital::OutputPin`: an ESP-IDF
//! `PinDriver` on hardware, a recording pin in tests.

use embedded_hal::digital::OutputPin;
use log::warn;

pub struct SolenoidDriver<P> {
    pin: P,
    label: &'static str,
    energized: bool,
}

impl<P: OutputPin> SolenoidDriver<P> {
    pub fn new(pin: P, label: &'static str) -> Self {
        Self {
            pin,
            label,
            energized: false,
        }
    }

    /// Drive the coil.  Pin errors are logged and otherwise ignored; the
    /// tracked state follows the command either way.
    pub fn set(&mut self, energized: bool) {
        let result = if energized {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("solenoid {}: pin write failed: {:?}", self.label, e);
        }
        self.energized = energized;
    }

    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}
