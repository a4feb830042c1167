//! # ambilux-core
//!
//! Core library for driving an ambient-lighting LED strip from screen
//! frames.
//!
//! This crate contains:
//! - **Frame**: `RawFrame`, `FrameBuffer`, and the `FrameSource` pull trait
//! - **Color**: `Rgb`, box sampling, HSV saturation boost, temporal smoothing
//! - **Zone**: `ZoneLayout` and `ZoneMapper` for the left/top/right border
//! - **Protocol**: `ConfigPacket` handshake and `FrameEncoder` frame packets
//! - **Transport**: `DeviceTransport` over a serial line or UDP
//! - **Pipeline**: `FramePipeline`, the per-frame orchestrator and its state machine
//! - **Error**: `AmbiluxError`, a typed `thiserror`-based error hierarchy

pub mod color;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod protocol;
pub mod transport;
pub mod zone;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use color::{Rgb, SaturationCorrector, TemporalSmoother, average_box, boost_saturation};
pub use error::{AmbiluxError, Result};
pub use frame::{BYTES_PER_PIXEL, CaptureEvent, FrameBuffer, FrameSource, RawFrame};
pub use pipeline::{
    FramePipeline, PipelineSettings, PipelineState, PipelineStats, RunOutcome, StopReason,
    ZoneObserver,
};
pub use protocol::{ConfigPacket, DeviceConfig, FrameEncoder};
pub use transport::{
    BaudRate, DeviceTransport, Endpoint, NetworkEndpoint, NetworkTransport, SerialEndpoint,
    SerialTransport,
};
pub use zone::{Edge, ZoneLayout, ZoneMapper, ZoneSequence};
