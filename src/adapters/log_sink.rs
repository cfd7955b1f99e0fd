//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  Each event becomes
//! one tagged line.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { formatted } => {
                info!("START | formatted={}", formatted);
            }
            AppEvent::TimeSynced { unix_secs } => {
                info!("CLOCK | synced unix={}", unix_secs);
            }
            AppEvent::SyncFailed(e) => {
                warn!("CLOCK | sync failed: {}", e);
            }
            AppEvent::CycleStarted { planned } => {
                info!("CYCLE | start, {} task(s)", planned);
            }
            AppEvent::CycleCompleted(r) => {
                info!("CYCLE | done, ran={} skipped={}", r.ran, r.skipped);
            }
            AppEvent::CycleReset => {
                info!("CYCLE | reset");
            }
            AppEvent::OneOffArmed { in_secs } => {
                info!("CYCLE | one-off in {}s", in_secs);
            }
            AppEvent::IntervalChanged { secs } => {
                info!("CYCLE | interval={}s", secs);
            }
            AppEvent::TaskUpdated(valve) => {
                info!("TASK  | valve {} updated", valve);
            }
            AppEvent::ValvesReset => {
                info!("VALVE | all closed");
            }
            AppEvent::ConfigSaved => {
                info!("CONFIG| saved");
            }
            AppEvent::CommandRejected(e) => {
                warn!("CMD   | rejected: {}", e);
            }
            AppEvent::PersistFailed(e) => {
                warn!("STORE | persist failed: {}", e);
            }
        }
    }
}
