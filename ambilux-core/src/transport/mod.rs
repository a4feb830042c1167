//! Point-to-point device transports.
//!
//! | Variant              | Link                                   |
//! |--------------------- |----------------------------------------|
//! | [`SerialTransport`]  | Character device in raw 8N1 mode       |
//! | [`NetworkTransport`] | Connectionless UDP datagrams           |
//!
//! Both share the [`DeviceTransport`] contract:
//!
//! - `initialize` opens the link. A second call without an intervening
//!   `deinitialize` fails with [`AmbiluxError::AlreadyInitialized`]. A
//!   failed `initialize` leaves nothing to clean up.
//! - `send` transmits one buffer completely or returns an error. The only
//!   retries are for interrupted system calls.
//! - `receive` blocks for at most the configured timeout and returns `0`
//!   when nothing arrived.
//! - Every call holds the transport's lock for its whole duration, so a
//!   transport may be shared between threads behind an `Arc`.

pub mod network;
pub mod serial;

pub use network::NetworkTransport;
pub use serial::SerialTransport;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{AmbiluxError, Result};

// ── DeviceTransport ──────────────────────────────────────────────

/// Capability interface shared by every link to the lighting controller.
pub trait DeviceTransport: Send + Sync {
    /// Open and configure the link.
    fn initialize(&self) -> Result<()>;

    /// Transmit `data` in full, returning the number of bytes written.
    fn send(&self, data: &[u8]) -> Result<usize>;

    /// Read whatever the device sent, up to `buf.len()` bytes. Returns
    /// `0` on timeout.
    fn receive(&self, buf: &mut [u8]) -> Result<usize>;

    /// Close the link and restore any OS state changed by `initialize`.
    fn deinitialize(&self) -> Result<()>;

    /// Whether the link is currently open.
    fn is_initialized(&self) -> bool;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Arc<T> {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        (**self).send(data)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn deinitialize(&self) -> Result<()> {
        (**self).deinitialize()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ── BaudRate ─────────────────────────────────────────────────────

/// Supported serial line speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
    B230400,
    B460800,
    B921600,
}

impl BaudRate {
    pub const ALL: [BaudRate; 8] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
        BaudRate::B460800,
        BaudRate::B921600,
    ];

    pub const fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B9600 => 9_600,
            BaudRate::B19200 => 19_200,
            BaudRate::B38400 => 38_400,
            BaudRate::B57600 => 57_600,
            BaudRate::B115200 => 115_200,
            BaudRate::B230400 => 230_400,
            BaudRate::B460800 => 460_800,
            BaudRate::B921600 => 921_600,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = AmbiluxError;

    fn try_from(bps: u32) -> Result<Self> {
        BaudRate::ALL
            .into_iter()
            .find(|b| b.bits_per_second() == bps)
            .ok_or(AmbiluxError::UnsupportedBaudRate(bps))
    }
}

// ── Endpoints ────────────────────────────────────────────────────

/// Serial character device plus line parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEndpoint {
    pub path: PathBuf,
    /// Line speed in bits per second; must be one of [`BaudRate::ALL`].
    pub baud_rate: u32,
    /// Read timeout. Applied in tenths of a second, rounded up.
    pub timeout: Duration,
}

/// UDP peer plus socket parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoint {
    /// Host name or IPv4 literal.
    pub host: String,
    pub port: u16,
    /// Receive timeout.
    pub timeout: Duration,
}

/// Either kind of endpoint, selected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Serial(SerialEndpoint),
    Network(NetworkEndpoint),
}

/// Build the transport for `endpoint`. The link is not opened yet.
pub fn open(endpoint: Endpoint) -> Arc<dyn DeviceTransport> {
    match endpoint {
        Endpoint::Serial(ep) => Arc::new(SerialTransport::new(ep)),
        Endpoint::Network(ep) => Arc::new(NetworkTransport::new(ep)),
    }
}

/// Acquire `mutex`, recovering the guard if a previous holder panicked.
/// Handle state is only replaced wholesale, so it is never left torn.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
