//! Fuzz target: NTP reply parser
//!
//! Any datagram must either parse or be rejected as `BadReply(len)`:
//! - exactly 48 bytes always parses
//! - the result is the transmit seconds at offset 40 minus the 1900→1970 offset
//!
//! cargo fuzz run fuzz_ntp_reply

#![no_main]

use irrigator::clock::ntp::{parse_reply, PACKET_LEN, UNIX_EPOCH_OFFSET_SECS};
use irrigator::error::SyncError;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match parse_reply(data) {
        Ok(t) => {
            assert_eq!(data.len(), PACKET_LEN);
            let v = u32::from_be_bytes([data[40], data[41], data[42], data[43]]);
            assert_eq!(t.secs(), i64::from(v.wrapping_sub(UNIX_EPOCH_OFFSET_SECS)));
        }
        Err(e) => {
            assert_ne!(data.len(), PACKET_LEN);
            assert_eq!(e, SyncError::BadReply(data.len()));
        }
    }
});
