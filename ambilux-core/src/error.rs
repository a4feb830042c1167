//! Error types for the ambilux pipeline.
//!
//! All fallible operations return `Result<T, AmbiluxError>`. Sampling and
//! color correction are infallible once a frame has been validated, so
//! every runtime failure surfaces at the frame boundary or at the
//! transport boundary.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = AmbiluxError> = std::result::Result<T, E>;

/// The canonical error type for ambilux.
#[derive(Debug, Error)]
pub enum AmbiluxError {
    // ── Configuration Errors ─────────────────────────────────────
    /// The requested serial speed is not in the supported set.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// An endpoint field was left empty.
    #[error("empty endpoint: {0}")]
    EmptyEndpoint(&'static str),

    /// `initialize` was called on a transport that is already open.
    #[error("transport already initialized")]
    AlreadyInitialized,

    /// An operation needed an open transport.
    #[error("transport not initialized")]
    NotInitialized,

    /// A configuration value is out of its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device host name did not resolve to an IPv4 address.
    #[error("could not resolve {host}:{port}")]
    Unresolved { host: String, port: u16 },

    // ── I/O Errors ───────────────────────────────────────────────
    /// The OS reported an error opening, configuring, reading or writing.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket accepted fewer bytes than the datagram carried.
    #[error("partial datagram: sent {sent} of {expected} bytes")]
    PartialDatagram { sent: usize, expected: usize },

    // ── Protocol Precondition Errors ─────────────────────────────
    /// The zone sequence does not match the agreed zone count.
    #[error("zone count mismatch: expected {expected}, got {actual}")]
    ZoneCountMismatch { expected: usize, actual: usize },

    /// The frame buffer is shorter than its declared geometry.
    #[error("frame buffer too small: need {expected} bytes, got {actual}")]
    FrameTooSmall { expected: usize, actual: usize },

    /// The frame dimensions differ from the negotiated zone layout.
    #[error("frame is {actual_width}x{actual_height}, layout expects {width}x{height}")]
    GeometryMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Bytes that do not form a valid packet.
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),

    // ── Pipeline Errors ──────────────────────────────────────────
    /// A state-machine transition was requested from the wrong state.
    #[error("invalid pipeline transition: {0}")]
    InvalidTransition(&'static str),

    /// The pipeline has stopped and accepts no further frames.
    #[error("pipeline closed")]
    PipelineClosed,
}

impl AmbiluxError {
    /// `true` for errors raised while validating configuration, before any
    /// device state was touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AmbiluxError::UnsupportedBaudRate(_)
                | AmbiluxError::EmptyEndpoint(_)
                | AmbiluxError::AlreadyInitialized
                | AmbiluxError::NotInitialized
                | AmbiluxError::InvalidConfig(_)
                | AmbiluxError::Unresolved { .. }
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

#[cfg(unix)]
impl From<nix::errno::Errno> for AmbiluxError {
    fn from(errno: nix::errno::Errno) -> Self {
        AmbiluxError::Io(std::io::Error::from(errno))
    }
}
