//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                    | Connects to               |
//! |------------|-------------------------------|---------------------------|
//! | `console`  | (producer for `control`)      | UART console lines        |
//! | `control`  | ControlPort                   | none / bounded channel    |
//! | `eeprom`   | PersistentStore, ConfigPort   | NVS blob / in-memory      |
//! | `hardware` | ValvePort                     | solenoid GPIO outputs     |
//! | `log_sink` | EventSink                     | Serial log output         |
//! | `network`  | NetworkPort                   | Wi-Fi STA + lwIP UDP      |
//! | `time`     | UptimeCounter                 | ESP32 system timer        |

pub mod console;
pub mod control;
pub mod eeprom;
pub mod hardware;
pub mod log_sink;
pub mod network;
pub mod time;
