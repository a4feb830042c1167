//! Device wire protocol.
//!
//! The link is unidirectional and stateless per frame. Two packet kinds
//! exist.
//!
//! **Config packet** (4 bytes, sent once per session before any frame):
//! ```text
//! magic:       u8  (0xFF)
//! kind:        u8  (0xAA)
//! brightness:  u8  (0..=255)
//! saturation:  u8  (extra saturation in percent, 0..=100)
//! ```
//!
//! **Frame packet** (`3 × N` bytes): the zone colors in traversal order,
//! one byte per channel, RGB. No header, no length, no sequence number;
//! the receiver knows `N` from its own static configuration.

use crate::color::Rgb;
use crate::error::{AmbiluxError, Result};

// ── Constants ────────────────────────────────────────────────────

/// First byte of every config packet.
pub const CONFIG_MAGIC: u8 = 0xFF;
/// Second byte of every config packet.
pub const CONFIG_KIND: u8 = 0xAA;

/// Largest saturation byte the device understands.
pub const MAX_SATURATION_BYTE: u8 = 100;

// ── Saturation encoding ──────────────────────────────────────────

/// Encode a boost factor as the percentage of extra saturation.
///
/// `1.0 → 0`, `1.5 → 50`, anything `>= 2.0 → 100`. Factors below 1.0 (and
/// NaN) encode as 0.
pub fn encode_saturation(boost: f32) -> u8 {
    if boost.is_nan() || boost <= 1.0 {
        return 0;
    }
    ((boost - 1.0) * 100.0)
        .round()
        .min(MAX_SATURATION_BYTE as f32) as u8
}

/// Inverse of [`encode_saturation`]. Values above 100 are clamped.
pub fn decode_saturation(byte: u8) -> f32 {
    1.0 + byte.min(MAX_SATURATION_BYTE) as f32 / 100.0
}

// ── ConfigPacket ─────────────────────────────────────────────────

/// One-time configuration handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigPacket {
    pub brightness: u8,
    /// Raw wire byte; see [`encode_saturation`].
    pub saturation: u8,
}

impl ConfigPacket {
    /// Encoded size on the wire.
    pub const SIZE: usize = 4;

    pub fn new(brightness: u8, saturation: u8) -> Self {
        Self {
            brightness,
            saturation,
        }
    }

    /// Build from a brightness and an in-memory boost factor.
    pub fn from_boost(brightness: u8, boost: f32) -> Self {
        Self::new(brightness, encode_saturation(boost))
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [CONFIG_MAGIC, CONFIG_KIND, self.brightness, self.saturation]
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(AmbiluxError::InvalidPacket("config packet must be 4 bytes"));
        }
        if data[0] != CONFIG_MAGIC || data[1] != CONFIG_KIND {
            return Err(AmbiluxError::InvalidPacket("bad config header"));
        }
        Ok(Self::new(data[2], data[3]))
    }
}

// ── DeviceConfig ─────────────────────────────────────────────────

/// Session-wide device settings, fixed for the life of a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// LED brightness, applied by the device.
    pub brightness: u8,
    /// Saturation boost factor; `<= 1.0` disables the boost.
    pub saturation_boost: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            brightness: 150,
            saturation_boost: 1.0,
        }
    }
}

impl DeviceConfig {
    /// The handshake packet announcing these settings.
    pub fn config_packet(&self) -> ConfigPacket {
        ConfigPacket::from_boost(self.brightness, self.saturation_boost)
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Serializes zone sequences into frame packets of a fixed zone count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    zone_count: usize,
}

impl FrameEncoder {
    pub fn new(zone_count: usize) -> Self {
        Self { zone_count }
    }

    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Packet length in bytes.
    pub fn packet_len(&self) -> usize {
        self.zone_count * 3
    }

    /// Encode `zones` into `dst`, replacing its contents.
    ///
    /// Fails without touching `dst` if the zone count is wrong.
    pub fn encode_into(&self, zones: &[Rgb], dst: &mut Vec<u8>) -> Result<()> {
        if zones.len() != self.zone_count {
            return Err(AmbiluxError::ZoneCountMismatch {
                expected: self.zone_count,
                actual: zones.len(),
            });
        }
        dst.clear();
        dst.reserve(self.packet_len());
        for zone in zones {
            dst.extend_from_slice(&zone.to_array());
        }
        Ok(())
    }

    pub fn encode(&self, zones: &[Rgb]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(zones, &mut out)?;
        Ok(out)
    }

    /// Split a frame packet back into zone colors.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Rgb>> {
        if data.len() != self.packet_len() {
            return Err(AmbiluxError::ZoneCountMismatch {
                expected: self.zone_count,
                actual: data.len() / 3,
            });
        }
        Ok(data
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────
