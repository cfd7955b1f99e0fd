//! Wi-Fi station + UDP adapter.
//!
//! Implements [`NetworkPort`] over `std::net`, which ESP-IDF backs with
//! lwIP.  Sockets are non-blocking; the NTP exchange polls them.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: link state comes from the ESP-IDF Wi-Fi
//!   driver, which this adapter owns and reconnects.  Only the
//!   non-blocking `EspWifi` calls are used, so a dead access point never
//!   stalls the control loop.
//! - **all other targets**: the link is a flag, up by default, so host
//!   runs can talk to a real NTP server.
//!
//! ## Reconnection policy
//!
//! While the station is down, [`UdpNetwork::maintain`] issues a connect
//! request and checks back after an exponential backoff (2 s, 4 s, 8 s …
//! capped at 60 s).  The link counts as up once the netif has an address.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::{NetError, NetworkPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::EspWifi;

const BACKOFF_INITIAL_SECS: u64 = 2;
const BACKOFF_MAX_SECS: u64 = 60;

/// Receive scratch size.  Larger than any reply we accept so oversized
/// datagrams report their true length instead of being silently cut.
const RECV_SCRATCH: usize = 512;

// ── Reconnect backoff ─────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Backoff {
    delay: Duration,
    next_attempt: Option<Instant>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: Duration::from_secs(BACKOFF_INITIAL_SECS),
            next_attempt: None,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    /// Hold off the next attempt and double the delay.
    fn defer(&mut self, now: Instant) {
        self.next_attempt = Some(now + self.delay);
        self.delay = (self.delay * 2).min(Duration::from_secs(BACKOFF_MAX_SECS));
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ── Adapter ───────────────────────────────────────────────────

pub struct UdpNetwork {
    socket: Option<UdpSocket>,
    backoff: Backoff,
    was_up: bool,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    link_up: bool,
}

impl UdpNetwork {
    /// Wrap a configured and started station.  The first connect request
    /// is issued here; the device stays isolated until the link comes up.
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        let mut net = Self {
            socket: None,
            backoff: Backoff::new(),
            was_up: false,
            wifi,
        };
        net.maintain();
        net
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("NET   | simulation backend, link up");
        Self {
            socket: None,
            backoff: Backoff::new(),
            was_up: true,
            link_up: true,
        }
    }

    /// Host-only: drive the simulated link state.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    /// Request a reconnect if the station is down and the backoff has
    /// elapsed.  Never waits for the link.
    pub fn maintain(&mut self) {
        let up = self.is_connected();
        if up != self.was_up {
            if up {
                info!("NET   | station up");
            } else {
                warn!("NET   | station down");
            }
            self.was_up = up;
        }
        if up {
            self.backoff.reset();
            return;
        }

        let now = Instant::now();
        if !self.backoff.ready(now) {
            return;
        }
        if let Err(e) = self.platform_connect() {
            warn!("NET   | connect request failed: {}", e);
        }
        // Checked again once the backoff elapses.
        self.backoff.defer(now);
    }

    /// Whether a reconnect request is being held back.
    pub fn reconnect_pending(&self) -> bool {
        !self.backoff.ready(Instant::now())
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), NetError> {
        // Returns once the request is queued with the driver.
        self.wifi.connect().map_err(|e| {
            debug!("NET   | wifi connect: {:?}", e);
            NetError::NotConnected
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), NetError> {
        if self.link_up {
            Ok(())
        } else {
            Err(NetError::NotConnected)
        }
    }

    fn socket(&mut self, local_port: u16) -> Result<&UdpSocket, NetError> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, local_port)).map_err(|e| {
                warn!("NET   | bind :{} failed: {}", local_port, e);
                NetError::SocketError
            })?;
            socket
                .set_nonblocking(true)
                .map_err(|_| NetError::SocketError)?;
            self.socket = Some(socket);
        }
        self.socket.as_ref().ok_or(NetError::SocketError)
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for UdpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

// ── NetworkPort implementation ────────────────────────────────

impl NetworkPort for UdpNetwork {
    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.link_up
    }

    fn resolve(&mut self, host: &str) -> Result<Ipv4Addr, NetError> {
        let addrs = (host, 0).to_socket_addrs().map_err(|e| {
            debug!("NET   | resolve {}: {}", host, e);
            NetError::ResolveFailed
        })?;
        addrs
            .filter_map(|a| match a {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or(NetError::ResolveFailed)
    }

    fn udp_send(&mut self, local_port: u16, to: SocketAddrV4, data: &[u8]) -> Result<(), NetError> {
        let socket = self.socket(local_port)?;
        socket.send_to(data, to).map_err(|e| {
            warn!("NET   | send to {} failed: {}", to, e);
            NetError::SocketError
        })?;
        Ok(())
    }

    fn udp_poll(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(NetError::SocketError);
        };
        let mut scratch = [0u8; RECV_SCRATCH];
        match socket.recv_from(&mut scratch) {
            Ok((len, _from)) => {
                let copied = len.min(buf.len());
                buf[..copied].copy_from_slice(&scratch[..copied]);
                Ok(Some(len))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!("NET   | recv failed: {}", e);
                Err(NetError::SocketError)
            }
        }
    }

    fn udp_close(&mut self) {
        self.socket = None;
    }
}
