//! Fuzz target: settings region loader
//!
//! Writes arbitrary bytes over the settings region and checks that
//! loading never panics and always yields a config that passes
//! validation (falling back to defaults otherwise).
//!
//! cargo fuzz run fuzz_settings_blob

#![no_main]

use irrigator::adapters::eeprom::EepromStore;
use irrigator::app::ports::PersistentStore;
use irrigator::config::validate_config;
use irrigator::storage::{self, layout};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut store) = EepromStore::new() else {
        return;
    };
    let len = data.len().min(layout::SETTINGS.len);
    if store.write(layout::SETTINGS.offset, &data[..len]).is_err() {
        return;
    }

    let cfg = storage::load_settings(&store);
    assert!(validate_config(&cfg).is_ok());
});
