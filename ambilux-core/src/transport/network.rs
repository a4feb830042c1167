//! UDP transport.
//!
//! Every `send` is one unacknowledged datagram to the resolved device
//! address. Nothing is retried: a failed or short send is reported to the
//! caller as-is.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AmbiluxError, Result};
use crate::transport::{DeviceTransport, NetworkEndpoint, lock};

/// Shortest receive timeout applied to the socket. A zero timeout would
/// mean "block forever" to the OS.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

struct NetworkHandle {
    socket: UdpSocket,
    remote: SocketAddr,
}

// ── NetworkTransport ─────────────────────────────────────────────

/// Mutex-guarded UDP link to the lighting controller.
pub struct NetworkTransport {
    endpoint: NetworkEndpoint,
    handle: Mutex<Option<NetworkHandle>>,
    /// Total bytes sent since construction.
    bytes_sent: AtomicU64,
}

impl NetworkTransport {
    pub fn new(endpoint: NetworkEndpoint) -> Self {
        Self {
            endpoint,
            handle: Mutex::new(None),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    /// Total bytes sent across all datagrams.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// The device address the link resolved to.
    pub fn remote_addr(&self) -> Result<SocketAddr> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        Ok(handle.remote)
    }

    /// The local address of the open socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        Ok(handle.socket.local_addr()?)
    }

    fn resolve(&self) -> Result<SocketAddr> {
        let unresolved = || AmbiluxError::Unresolved {
            host: self.endpoint.host.clone(),
            port: self.endpoint.port,
        };
        (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|_| unresolved())?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(unresolved)
    }
}

impl DeviceTransport for NetworkTransport {
    fn initialize(&self) -> Result<()> {
        let mut guard = lock(&self.handle);
        if self.endpoint.host.is_empty() {
            return Err(AmbiluxError::EmptyEndpoint("device host"));
        }
        if guard.is_some() {
            return Err(AmbiluxError::AlreadyInitialized);
        }

        let remote = self.resolve()?;
        if remote.ip().to_string() != self.endpoint.host {
            info!("resolved {} to {}", self.endpoint.host, remote.ip());
        }

        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(self.endpoint.timeout.max(MIN_TIMEOUT)))?;

        info!("UDP link open to {remote}");
        *guard = Some(NetworkHandle { socket, remote });
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;

        let sent = handle.socket.send_to(data, handle.remote)?;
        if sent != data.len() {
            return Err(AmbiluxError::PartialDatagram {
                sent,
                expected: data.len(),
            });
        }
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        Ok(sent)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;

        loop {
            match handle.socket.recv_from(buf) {
                Ok((n, _)) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn deinitialize(&self) -> Result<()> {
        let mut guard = lock(&self.handle);
        let handle = guard.take().ok_or(AmbiluxError::NotInitialized)?;
        debug!("UDP link to {} closed", handle.remote);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        lock(&self.handle).is_some()
    }

    fn describe(&self) -> String {
        format!("udp {}:{}", self.endpoint.host, self.endpoint.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────
