//! Raw capture frames and the pull-style source that delivers them.
//!
//! A [`RawFrame`] is a read-only view over packed or strided RGB24 pixels.
//! The buffer belongs to the caller and is only borrowed for the duration
//! of one pipeline pass.

use crate::error::{AmbiluxError, Result};

/// Bytes per RGB24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

// ── RawFrame ─────────────────────────────────────────────────────

/// Borrowed RGB24 frame, row-major with a top-left origin.
///
/// The `data` buffer holds `height` rows of `stride` bytes each; the
/// last row only needs `width * 3` bytes.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> RawFrame<'a> {
    /// Wrap a tightly packed buffer (`stride == width * 3`).
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self> {
        Self::with_stride(data, width, height, width as usize * BYTES_PER_PIXEL)
    }

    /// Wrap a buffer whose rows are `stride` bytes apart.
    pub fn with_stride(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(AmbiluxError::InvalidConfig(format!(
                "stride {stride} is shorter than a {width}-pixel row"
            )));
        }
        let required = match height {
            0 => 0,
            h => stride * (h as usize - 1) + row_bytes,
        };
        if data.len() < required {
            return Err(AmbiluxError::FrameTooSmall {
                expected: required,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether `(x, y)` lies inside the frame.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// The three channel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// Owned, packed RGB24 frame as produced by a [`FrameSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a black frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::packed_len(width, height)],
        }
    }

    /// Byte length of a packed `width × height` RGB24 frame.
    pub const fn packed_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Borrow as a [`RawFrame`].
    pub fn as_frame(&self) -> Result<RawFrame<'_>> {
        RawFrame::new(&self.data, self.width, self.height)
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Result of one pull from a [`FrameSource`].
#[derive(Debug)]
pub enum CaptureEvent {
    /// A new frame is ready.
    Frame(FrameBuffer),
    /// No frame was available this tick. Not an error; pull again.
    Gap,
    /// The source is exhausted and will never yield again.
    EndOfStream,
}

/// Lazy, effectively infinite, non-restartable sequence of frames, one per
/// capture tick.
///
/// Implementations block until the next tick. Delivery cadence is the
/// source's business; consumers must tolerate irregular intervals.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<CaptureEvent>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<CaptureEvent> {
        (**self).next_frame()
    }
}

// ── Tests ────────────────────────────────────────────────────────
