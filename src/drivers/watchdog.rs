//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the main loop
//! stalls for more than [`TIMEOUT_MS`].
//!
//! Valve holds block the loop for minutes, so every blocking wait in the
//! firmware goes through [`WatchdogDelay`], which sleeps in slices no
//! longer than [`FEED_SLICE_MS`] and feeds the watchdog between them.

use embedded_hal::delay::DelayNs;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

pub const TIMEOUT_MS: u32 = 10_000;

/// Longest uninterrupted sleep inside a [`WatchdogDelay`].
pub const FEED_SLICE_MS: u32 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task during bootstrap.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    /// Feed the watchdog.  Must be called at least every [`TIMEOUT_MS`].
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// A blocking delay bound to this watchdog.
    pub fn delay(&self) -> WatchdogDelay {
        WatchdogDelay { watchdog: *self }
    }
}

/// Blocking delay that keeps the watchdog fed.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogDelay {
    watchdog: Watchdog,
}

impl WatchdogDelay {
    fn sleep_ms(ms: u32) {
        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);

        #[cfg(not(target_os = "espidf"))]
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

impl DelayNs for WatchdogDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Sub-millisecond waits round up; nothing here needs finer.
        self.delay_ms(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, mut ms: u32) {
        while ms > 0 {
            let slice = ms.min(FEED_SLICE_MS);
            Self::sleep_ms(slice);
            self.watchdog.feed();
            ms -= slice;
        }
    }
}
