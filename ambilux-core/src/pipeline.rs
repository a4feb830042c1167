//! Frame pipeline orchestration.
//!
//! For every delivered frame, synchronously:
//!
//! 1. [`ZoneMapper`] samples the border zones.
//! 2. [`SaturationCorrector`] boosts each zone.
//! 3. [`TemporalSmoother`] blends with the previous frames.
//! 4. [`FrameEncoder`] builds the frame packet.
//! 5. [`DeviceTransport::send`] ships it.
//!
//! Frame *k* is fully sent (or has failed) before frame *k + 1* is pulled.
//! A transport error while streaming is fatal: the pipeline closes and
//! consumes no further frames, since a device that silently misses frames
//! shows a stuck picture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::color::{Rgb, SaturationCorrector, TemporalSmoother};
use crate::error::{AmbiluxError, Result};
use crate::frame::{CaptureEvent, FrameSource, RawFrame};
use crate::protocol::{DeviceConfig, FrameEncoder};
use crate::transport::DeviceTransport;
use crate::zone::{ZoneLayout, ZoneMapper, ZoneSequence};

/// Settle time after the config packet, so the device applies brightness
/// and saturation before the first frame arrives.
pub const DEFAULT_HANDSHAKE_DELAY: Duration = Duration::from_millis(600);

// ── PipelineState ────────────────────────────────────────────────

/// Lifecycle of a [`FramePipeline`].
///
/// ```text
///  Uninitialized ──► Configured ──► Streaming ──┐
///        │               │              ▲  │    │
///        │               │              └──┘    │
///        └───────────────┴─────► Closed ◄───────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Transport not opened, no handshake sent.
    #[default]
    Uninitialized,

    /// Transport open and config packet delivered.
    Configured,

    /// At least one frame packet sent.
    Streaming {
        /// When the first frame went out.
        since: Instant,
    },

    /// Terminal. No more frames are accepted.
    Closed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Configured => write!(f, "Configured"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl PipelineState {
    /// Whether frames may be processed in this state.
    pub fn accepts_frames(&self) -> bool {
        matches!(self, Self::Configured | Self::Streaming { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the pipeline has been streaming.
    ///
    /// Returns `None` for any other state.
    pub fn streaming_duration(&self) -> Option<Duration> {
        match self {
            Self::Streaming { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Configured`.
    ///
    /// Valid from: `Uninitialized`.
    pub fn complete_handshake(&mut self) -> Result<()> {
        match self {
            Self::Uninitialized => {
                *self = Self::Configured;
                Ok(())
            }
            _ => Err(AmbiluxError::InvalidTransition(
                "cannot configure: not in Uninitialized state",
            )),
        }
    }

    /// Record that a frame was sent.
    ///
    /// Valid from: `Configured` (enters `Streaming`), `Streaming` (stays).
    pub fn frame_sent(&mut self) -> Result<()> {
        match self {
            Self::Configured => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            Self::Streaming { .. } => Ok(()),
            _ => Err(AmbiluxError::InvalidTransition(
                "cannot stream: handshake not completed",
            )),
        }
    }

    /// Transition to `Closed` from any state.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

// ── Settings & stats ─────────────────────────────────────────────

/// Everything a [`FramePipeline`] needs besides its transport.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: ZoneLayout,
    pub device: DeviceConfig,
    /// Smoothing factor α, clamped into `[0.1, 1.0]`.
    pub smoothing: f32,
    pub handshake_delay: Duration,
}

impl PipelineSettings {
    pub fn new(layout: ZoneLayout) -> Self {
        Self {
            layout,
            device: DeviceConfig::default(),
            smoothing: 1.0,
            handshake_delay: DEFAULT_HANDSHAKE_DELAY,
        }
    }
}

/// Counters maintained by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    /// Capture ticks that delivered no frame.
    pub gaps: u64,
}

/// Why [`FramePipeline::run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The running flag was cleared.
    Stopped,
    /// The frame source is exhausted.
    EndOfStream,
}

/// Summary returned by [`FramePipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub stats: PipelineStats,
}

/// Callback invoked with the final zone colors of every sent frame.
pub type ZoneObserver = Box<dyn FnMut(&[Rgb]) + Send>;

// ── FramePipeline ────────────────────────────────────────────────

/// Turns raw frames into frame packets and sends them to the device.
pub struct FramePipeline {
    transport: Arc<dyn DeviceTransport>,
    mapper: ZoneMapper,
    corrector: SaturationCorrector,
    smoother: TemporalSmoother,
    encoder: FrameEncoder,
    device: DeviceConfig,
    handshake_delay: Duration,
    state: PipelineState,
    stats: PipelineStats,
    zones: ZoneSequence,
    packet: Vec<u8>,
    observer: Option<ZoneObserver>,
}

impl FramePipeline {
    pub fn new(settings: PipelineSettings, transport: Arc<dyn DeviceTransport>) -> Self {
        let layout = settings.layout;
        Self {
            transport,
            mapper: ZoneMapper::new(layout),
            corrector: SaturationCorrector::new(settings.device.saturation_boost),
            smoother: TemporalSmoother::new(settings.smoothing),
            encoder: FrameEncoder::new(layout.zone_count()),
            device: settings.device,
            handshake_delay: settings.handshake_delay,
            state: PipelineState::default(),
            stats: PipelineStats::default(),
            zones: ZoneSequence::default(),
            packet: Vec::with_capacity(layout.packet_len()),
            observer: None,
        }
    }

    /// Register a callback that sees every frame's outgoing zone colors.
    pub fn with_observer(mut self, observer: ZoneObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn layout(&self) -> &ZoneLayout {
        self.mapper.layout()
    }

    /// The effective smoothing factor.
    pub fn smoothing(&self) -> f32 {
        self.smoother.alpha()
    }

    pub fn transport(&self) -> &Arc<dyn DeviceTransport> {
        &self.transport
    }

    /// The zone colors of the most recently sent frame.
    pub fn last_zones(&self) -> &[Rgb] {
        self.zones.colors()
    }

    /// Open the transport, send the config packet, and wait for the
    /// device to settle.
    pub fn configure(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Uninitialized => {}
            PipelineState::Closed => return Err(AmbiluxError::PipelineClosed),
            _ => {
                return Err(AmbiluxError::InvalidTransition(
                    "cannot configure: not in Uninitialized state",
                ));
            }
        }

        if let Err(e) = self.transport.initialize() {
            error!("failed to open {}: {e}", self.transport.describe());
            self.state.close();
            return Err(e);
        }

        let packet = self.device.config_packet();
        if let Err(e) = self.transport.send(&packet.encode()) {
            return Err(self.fail(e));
        }
        info!(
            "config sent: brightness={} saturation={}",
            packet.brightness, packet.saturation
        );

        if !self.handshake_delay.is_zero() {
            debug!("waiting {:?} for the device to settle", self.handshake_delay);
            std::thread::sleep(self.handshake_delay);
        }

        self.state.complete_handshake()?;
        Ok(())
    }

    /// Run one frame through the chain and send it.
    ///
    /// Returns the number of bytes written. Any failure closes the
    /// pipeline.
    pub fn process_frame(&mut self, frame: &RawFrame<'_>) -> Result<usize> {
        match self.state {
            PipelineState::Configured | PipelineState::Streaming { .. } => {}
            PipelineState::Closed => return Err(AmbiluxError::PipelineClosed),
            PipelineState::Uninitialized => {
                return Err(AmbiluxError::InvalidTransition(
                    "cannot stream: handshake not completed",
                ));
            }
        }

        match self.encode_frame(frame) {
            Ok(()) => {}
            Err(e) => return Err(self.fail(e)),
        }

        let written = match self.transport.send(&self.packet) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };

        self.state.frame_sent()?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += written as u64;
        trace!("frame {} sent ({written} bytes)", self.stats.frames_sent);

        if let Some(observer) = self.observer.as_mut() {
            observer(self.zones.colors());
        }
        Ok(written)
    }

    /// Pull frames from `source` until `running` is cleared, the source
    /// ends, or an error occurs. Performs the handshake first if needed
    /// and always leaves the pipeline closed.
    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        running: &AtomicBool,
    ) -> Result<RunOutcome> {
        if self.state == PipelineState::Uninitialized {
            self.configure()?;
        }

        let reason = loop {
            if !running.load(Ordering::SeqCst) {
                break StopReason::Stopped;
            }

            let event = match source.next_frame() {
                Ok(event) => event,
                Err(e) => return Err(self.fail(e)),
            };

            match event {
                CaptureEvent::Frame(buffer) => {
                    let frame = match buffer.as_frame() {
                        Ok(frame) => frame,
                        Err(e) => return Err(self.fail(e)),
                    };
                    self.process_frame(&frame)?;
                }
                CaptureEvent::Gap => {
                    self.stats.gaps += 1;
                }
                CaptureEvent::EndOfStream => break StopReason::EndOfStream,
            }
        };

        self.shutdown()?;
        Ok(RunOutcome {
            reason,
            stats: self.stats,
        })
    }

    /// Close the pipeline and release the transport.
    pub fn shutdown(&mut self) -> Result<()> {
        let streamed = self.state.streaming_duration().unwrap_or_default();
        self.state.close();
        self.smoother.reset();
        if self.transport.is_initialized() {
            self.transport.deinitialize()?;
            info!(
                "pipeline closed after {} frames ({} bytes) in {:.1?}",
                self.stats.frames_sent, self.stats.bytes_sent, streamed
            );
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn encode_frame(&mut self, frame: &RawFrame<'_>) -> Result<()> {
        self.mapper.map_into(frame, &mut self.zones)?;
        self.corrector.apply_all(self.zones.colors_mut());
        self.smoother.apply(self.zones.colors_mut())?;
        self.encoder.encode_into(self.zones.colors(), &mut self.packet)
    }

    /// Close after a fatal error, releasing the transport best-effort.
    fn fail(&mut self, e: AmbiluxError) -> AmbiluxError {
        error!("pipeline stopped in {} state: {e}", self.state);
        self.state.close();
        self.smoother.reset();
        if self.transport.is_initialized()
            && let Err(close_err) = self.transport.deinitialize()
        {
            warn!("failed to close {}: {close_err}", self.transport.describe());
        }
        e
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if !self.state.is_closed()
            && let Err(e) = self.shutdown()
        {
            warn!("pipeline shutdown on drop failed: {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
