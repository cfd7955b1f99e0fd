//! Minimal SNTP exchange.
//!
//! One request, one reply, one field: the transmit timestamp's whole
//! seconds at byte offset 40.  Everything else in the reply is ignored.

use core::net::SocketAddrV4;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::NetworkPort;
use crate::error::SyncError;
use crate::time::UnixTime;

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01.
pub const UNIX_EPOCH_OFFSET_SECS: u32 = 2_208_988_800;

const TRANSMIT_SECS_OFFSET: usize = 40;

/// First poll wait; doubled after every empty poll.
pub const BACKOFF_INITIAL_MS: u32 = 10;
/// Polling stops once the next wait would reach this.
pub const BACKOFF_LIMIT_MS: u32 = 1000;

/// Client request: LI unsynchronized, version 4, mode client.
pub fn request_packet() -> [u8; PACKET_LEN] {
    let mut p = [0u8; PACKET_LEN];
    p[0] = 0b1110_0011; // LI, version, mode
    p[1] = 0; // stratum
    p[2] = 6; // poll interval
    p[3] = 0xEC; // precision
    // root delay and dispersion stay zero
    p[12..16].copy_from_slice(&[49, 0x4E, 49, 52]);
    p
}

/// Extract Unix time from a reply.  Any length other than 48 is invalid.
pub fn parse_reply(reply: &[u8]) -> Result<UnixTime, SyncError> {
    let bytes: &[u8; PACKET_LEN] = reply
        .try_into()
        .map_err(|_| SyncError::BadReply(reply.len()))?;
    let field = &bytes[TRANSMIT_SECS_OFFSET..TRANSMIT_SECS_OFFSET + 4];
    let secs_since_1900 = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    Ok(UnixTime::from_unix_secs(
        secs_since_1900.wrapping_sub(UNIX_EPOCH_OFFSET_SECS),
    ))
}

/// Resolve, send, and poll for a reply with bounded exponential backoff.
///
/// Blocks for at most ~1.3 s of delay.  The socket is closed on every path
/// after it was opened.
pub fn exchange<N, D>(
    net: &mut N,
    delay: &mut D,
    host: &str,
    local_port: u16,
) -> Result<UnixTime, SyncError>
where
    N: NetworkPort + ?Sized,
    D: DelayNs,
{
    if !net.is_connected() {
        return Err(SyncError::NotConnected);
    }
    let ip = net.resolve(host).map_err(|_| SyncError::ResolveFailed)?;
    debug!("ntp: {} -> {}", host, ip);

    let result = send_and_poll(net, delay, SocketAddrV4::new(ip, NTP_PORT), local_port);
    net.udp_close();
    result
}

fn send_and_poll<N, D>(
    net: &mut N,
    delay: &mut D,
    server: SocketAddrV4,
    local_port: u16,
) -> Result<UnixTime, SyncError>
where
    N: NetworkPort + ?Sized,
    D: DelayNs,
{
    net.udp_send(local_port, server, &request_packet())
        .map_err(|_| SyncError::SendFailed)?;

    let mut buf = [0u8; PACKET_LEN];
    let mut wait = BACKOFF_INITIAL_MS;
    let mut received = None;
    while received.is_none() && wait < BACKOFF_LIMIT_MS {
        delay.delay_ms(wait);
        wait *= 2;
        received = net
            .udp_poll(&mut buf)
            .map_err(|_| SyncError::ReceiveFailed)?;
    }

    match received {
        None => Err(SyncError::Timeout),
        Some(len) if len != PACKET_LEN => Err(SyncError::BadReply(len)),
        Some(_) => parse_reply(&buf),
    }
}
