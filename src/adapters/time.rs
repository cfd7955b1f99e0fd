//! ESP32 uptime counter adapter.
//!
//! Exposes the platform's monotonic timer as a 32-bit millisecond counter
//! that wraps like a classic `millis()`; the [`Clock`](crate::clock::Clock)
//! counts the wraps.
//!
//! - **`target_os = "espidf"`** wraps `esp_timer_get_time()` (µs since boot).
//! - **`not(target_os = "espidf")`** uses `std::time::Instant` for
//!   host-side testing and simulation.

use crate::app::ports::UptimeCounter;

pub struct Esp32UptimeCounter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32UptimeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32UptimeCounter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer_get_time has no preconditions once the timer
        // service is running, which ESP-IDF guarantees before app_main.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl UptimeCounter for Esp32UptimeCounter {
    fn millis(&mut self) -> u32 {
        // Truncation is the wrap.
        (self.uptime_us() / 1000) as u32
    }
}
