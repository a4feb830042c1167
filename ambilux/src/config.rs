//! Configuration for the ambient-lighting host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use ambilux_core::pipeline::PipelineSettings;
use ambilux_core::protocol::DeviceConfig;
use ambilux_core::transport::{Endpoint, NetworkEndpoint, SerialEndpoint};
use ambilux_core::zone::ZoneLayout;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbiluxConfig {
    /// Frame geometry and zone depth.
    pub capture: CaptureConfig,
    /// Settings sent to, or applied for, the LED controller.
    pub device: DeviceSection,
    /// Link to the controller.
    pub transport: TransportConfig,
    /// Where frames come from.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Zone depth: side length of each sampled square, in pixels.
    pub depth: u32,
    /// Target frames per second for paced sources.
    pub fps: u32,
}

/// Device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    /// LED brightness, 0-255.
    pub brightness: u8,
    /// Saturation boost factor. 1.0 disables the boost.
    pub saturation: f32,
    /// Temporal smoothing factor, clamped into 0.1-1.0. 1.0 disables it.
    pub smoothing: f32,
    /// Pause after the config handshake, in milliseconds.
    pub handshake_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Serial,
    Network,
}

/// Transport selection plus per-kind settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// "serial" or "network".
    pub kind: TransportKind,
    pub serial: SerialConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Character device of the controller.
    pub path: PathBuf,
    pub baud_rate: u32,
    /// Read timeout in milliseconds, applied in tenths of a second.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Controller host name or IPv4 address.
    pub host: String,
    pub port: u16,
    /// Receive timeout in milliseconds.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Packed RGB24 frames read from a file, FIFO, or stdin.
    #[default]
    Raw,
    /// Synthetic animated test pattern.
    Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Input path for raw frames; "-" reads stdin.
    pub path: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 144,
            depth: 10,
            fps: 60,
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            brightness: 150,
            saturation: 1.0,
            smoothing: 1.0,
            handshake_delay_ms: 600,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: 921_600,
            timeout_ms: 1000,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".into(),
            port: 4210,
            timeout_ms: 1000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Raw,
            path: "-".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Command-line overrides ───────────────────────────────────────

/// Settings that may be given on the command line. Each one that is
/// present replaces the value from the file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// LED brightness (0-255).
    #[arg(long)]
    pub brightness: Option<u8>,

    /// Saturation boost factor (1.0 = off).
    #[arg(long)]
    pub saturation: Option<f32>,

    /// Temporal smoothing factor (0.1-1.0, 1.0 = off).
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Link to the controller.
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Serial device path.
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Serial baud rate.
    #[arg(long)]
    pub baud: Option<u32>,

    /// Controller host for the network transport.
    #[arg(long)]
    pub host: Option<String>,

    /// Controller UDP port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Read raw RGB24 frames from a path ("-" for stdin).
    #[arg(long, conflicts_with = "pattern")]
    pub input: Option<String>,

    /// Drive the strip with a synthetic test pattern.
    #[arg(long)]
    pub pattern: bool,
}

// ── Loading ──────────────────────────────────────────────────────

impl AmbiluxConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Apply command-line overrides in place.
    pub fn apply(&mut self, o: &Overrides) {
        if let Some(v) = o.brightness {
            self.device.brightness = v;
        }
        if let Some(v) = o.saturation {
            self.device.saturation = v;
        }
        if let Some(v) = o.smoothing {
            self.device.smoothing = v;
        }
        if let Some(v) = o.transport {
            self.transport.kind = v;
        }
        if let Some(v) = &o.device {
            self.transport.serial.path = v.clone();
        }
        if let Some(v) = o.baud {
            self.transport.serial.baud_rate = v;
        }
        if let Some(v) = &o.host {
            self.transport.network.host = v.clone();
        }
        if let Some(v) = o.port {
            self.transport.network.port = v;
        }
        if let Some(v) = &o.input {
            self.source.kind = SourceKind::Raw;
            self.source.path = v.clone();
        }
        if o.pattern {
            self.source.kind = SourceKind::Pattern;
        }
    }

    /// Zone layout for the configured capture geometry.
    pub fn layout(&self) -> ambilux_core::Result<ZoneLayout> {
        ZoneLayout::new(self.capture.width, self.capture.height, self.capture.depth)
    }

    /// Convert device and capture settings into `PipelineSettings`.
    pub fn to_pipeline_settings(&self) -> ambilux_core::Result<PipelineSettings> {
        Ok(PipelineSettings {
            layout: self.layout()?,
            device: DeviceConfig {
                brightness: self.device.brightness,
                saturation_boost: self.device.saturation,
            },
            smoothing: self.device.smoothing.clamp(0.1, 1.0),
            handshake_delay: Duration::from_millis(self.device.handshake_delay_ms),
        })
    }

    /// The selected transport endpoint.
    pub fn endpoint(&self) -> Endpoint {
        match self.transport.kind {
            TransportKind::Serial => Endpoint::Serial(SerialEndpoint {
                path: self.transport.serial.path.clone(),
                baud_rate: self.transport.serial.baud_rate,
                timeout: Duration::from_millis(self.transport.serial.timeout_ms),
            }),
            TransportKind::Network => Endpoint::Network(NetworkEndpoint {
                host: self.transport.network.host.clone(),
                port: self.transport.network.port,
                timeout: Duration::from_millis(self.transport.network.timeout_ms),
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
