//! Fuzz target: persisted task record decoder
//!
//! Records come from flash that may hold anything (erased, older layout,
//! bit rot).  Decoding must never panic, and a decoded task must survive
//! an encode/decode cycle unchanged.
//!
//! cargo fuzz run fuzz_task_record

#![no_main]

use irrigator::actuator::{ValveId, NUM_VALVES};
use irrigator::scheduler::DESCRIPTION_CAPACITY;
use irrigator::storage::layout::TASK_RECORD_LEN;
use irrigator::storage::{decode_task, encode_task};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&slot, rest)) = data.split_first() else {
        return;
    };
    let Ok(rec) = <[u8; TASK_RECORD_LEN]>::try_from(rest) else {
        return;
    };
    let Some(valve) = ValveId::new(slot % NUM_VALVES as u8) else {
        return;
    };

    let task = decode_task(valve, &rec);
    assert_eq!(task.valve, valve);
    assert!(task.description.len() <= DESCRIPTION_CAPACITY);

    let again = decode_task(valve, &encode_task(&task));
    assert_eq!(again, task);
});
