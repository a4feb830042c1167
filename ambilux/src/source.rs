//! Frame sources for the host.
//!
//! - [`RawVideoSource`] reads packed RGB24 frames of a fixed size from any
//!   reader, e.g. a screen grabber piped through
//!   `ffmpeg -f rawvideo -pix_fmt rgb24 -`.
//! - [`PatternSource`] renders an animated hue sweep, paced to a target
//!   frame rate, for checking a strip without a capture setup.

use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use ambilux_core::frame::{BYTES_PER_PIXEL, CaptureEvent, FrameBuffer, FrameSource};

use crate::config::{AmbiluxConfig, SourceKind};

/// How long a raw source waits for input before reporting a capture gap.
pub const DEFAULT_INPUT_WAIT: Duration = Duration::from_millis(100);

/// Build the source selected by `config`.
pub fn from_config(config: &AmbiluxConfig) -> io::Result<Box<dyn FrameSource + Send>> {
    let (w, h) = (config.capture.width, config.capture.height);
    Ok(match config.source.kind {
        SourceKind::Raw => Box::new(RawVideoSource::open(&config.source.path, w, h)?),
        SourceKind::Pattern => Box::new(PatternSource::new(w, h, config.capture.fps)),
    })
}

// ── RawVideoSource ───────────────────────────────────────────────

/// Fixed-size packed RGB24 frames from a byte stream.
///
/// When built with a readiness wait, a stalled input yields
/// [`CaptureEvent::Gap`] instead of blocking, so the pipeline keeps
/// checking its running flag. A partially read frame is kept and
/// completed by later calls.
pub struct RawVideoSource<R> {
    reader: R,
    width: u32,
    height: u32,
    frames: u64,
    pending: Vec<u8>,
    filled: usize,
    readiness: Option<platform::Readiness>,
}

impl RawVideoSource<Box<dyn Read + Send>> {
    /// Open `path` for reading; `"-"` selects stdin.
    pub fn open(path: &str, width: u32, height: u32) -> io::Result<Self> {
        let (reader, readiness) = platform::open_input(path, DEFAULT_INPUT_WAIT)?;
        debug!("reading {width}x{height} RGB24 frames from {path}");
        let mut source = Self::new(reader, width, height);
        source.readiness = readiness;
        Ok(source)
    }
}

#[cfg(unix)]
impl<R: Read + std::os::fd::AsFd> RawVideoSource<R> {
    /// Source that waits at most `wait` for input per call.
    pub fn polled(reader: R, width: u32, height: u32, wait: Duration) -> io::Result<Self> {
        let readiness = platform::Readiness::new(&reader, wait)?;
        let mut source = Self::new(reader, width, height);
        source.readiness = Some(readiness);
        Ok(source)
    }
}

impl<R: Read> RawVideoSource<R> {
    /// Source that blocks in `read` until input arrives.
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        let frame_len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self {
            reader,
            width,
            height,
            frames: 0,
            pending: vec![0u8; frame_len],
            filled: 0,
            readiness: None,
        }
    }

    /// Bytes per frame.
    pub fn frame_len(&self) -> usize {
        self.pending.len()
    }

    /// Frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn input_ready(&self) -> io::Result<bool> {
        match &self.readiness {
            Some(readiness) => readiness.wait(),
            None => Ok(true),
        }
    }

    fn end_of_stream(&mut self) -> CaptureEvent {
        if self.filled == 0 {
            debug!("input ended after {} frames", self.frames);
        } else {
            warn!(
                "input ended mid-frame ({} of {} bytes); dropping partial frame",
                self.filled,
                self.pending.len()
            );
            self.filled = 0;
        }
        CaptureEvent::EndOfStream
    }
}

impl<R: Read> FrameSource for RawVideoSource<R> {
    fn next_frame(&mut self) -> ambilux_core::Result<CaptureEvent> {
        while self.filled < self.pending.len() {
            if !self.input_ready()? {
                return Ok(CaptureEvent::Gap);
            }
            match self.reader.read(&mut self.pending[self.filled..]) {
                Ok(0) => return Ok(self.end_of_stream()),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let frame_len = self.pending.len();
        self.filled = 0;
        self.frames += 1;
        let data = std::mem::replace(&mut self.pending, vec![0u8; frame_len]);
        Ok(CaptureEvent::Frame(FrameBuffer {
            width: self.width,
            height: self.height,
            data,
        }))
    }
}

// ── Input readiness ──────────────────────────────────────────────

#[cfg(unix)]
mod platform {
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::fd::{AsFd, OwnedFd};
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

    /// Waits for a descriptor to become readable.
    pub(super) struct Readiness {
        fd: OwnedFd,
        timeout: PollTimeout,
    }

    impl Readiness {
        pub(super) fn new<F: AsFd>(source: &F, wait: Duration) -> io::Result<Self> {
            let ms = u16::try_from(wait.as_millis()).unwrap_or(u16::MAX);
            Ok(Self {
                fd: source.as_fd().try_clone_to_owned()?,
                timeout: PollTimeout::from(ms),
            })
        }

        /// `Ok(false)` when the wait elapsed or a signal interrupted it.
        pub(super) fn wait(&self) -> io::Result<bool> {
            let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, self.timeout) {
                Ok(0) | Err(Errno::EINTR) => Ok(false),
                Ok(_) => Ok(true),
                Err(e) => Err(e.into()),
            }
        }
    }

    /// Open `path` ("-" for stdin) unbuffered, with a readiness wait.
    pub(super) fn open_input(
        path: &str,
        wait: Duration,
    ) -> io::Result<(Box<dyn Read + Send>, Option<Readiness>)> {
        let file = if path == "-" {
            File::from(io::stdin().as_fd().try_clone_to_owned()?)
        } else {
            File::open(path)?
        };
        let readiness = Readiness::new(&file, wait)?;
        Ok((Box::new(file), Some(readiness)))
    }
}

#[cfg(not(unix))]
mod platform {
    use std::fs::File;
    use std::io::{self, BufReader, Read};
    use std::time::Duration;

    pub(super) struct Readiness;

    impl Readiness {
        pub(super) fn wait(&self) -> io::Result<bool> {
            Ok(true)
        }
    }

    pub(super) fn open_input(
        path: &str,
        _wait: Duration,
    ) -> io::Result<(Box<dyn Read + Send>, Option<Readiness>)> {
        let reader: Box<dyn Read + Send> = if path == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok((reader, None))
    }
}

// ── PatternSource ────────────────────────────────────────────────

/// A hue sweep along the border, one full revolution every 360 frames.
pub struct PatternSource {
    width: u32,
    height: u32,
    interval: Duration,
    next_due: Option<Instant>,
    tick: u64,
    limit: Option<u64>,
}

impl PatternSource {
    /// Pattern paced to `fps`. An `fps` of 0 disables pacing.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / fps
        };
        Self {
            width,
            height,
            interval,
            next_due: None,
            tick: 0,
            limit: None,
        }
    }

    /// End the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Render frame number `tick`.
    pub fn render(&self, tick: u64) -> FrameBuffer {
        let mut frame = FrameBuffer::black(self.width, self.height);
        let w = self.width.max(1) as u64;
        let row = self.width as usize * BYTES_PER_PIXEL;
        if row == 0 {
            return frame;
        }
        for line in frame.data.chunks_exact_mut(row) {
            for (x, px) in line.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let hue = ((x as u64 * 360 / w + tick) % 360) as u32;
                px.copy_from_slice(&hue_to_rgb(hue));
            }
        }
        frame
    }

    fn pace(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Fall behind rather than burst when a frame ran long.
        self.next_due = Some(due.max(now) + self.interval);
    }
}

impl FrameSource for PatternSource {
    fn next_frame(&mut self) -> ambilux_core::Result<CaptureEvent> {
        if self.limit.is_some_and(|limit| self.tick >= limit) {
            return Ok(CaptureEvent::EndOfStream);
        }
        self.pace();
        let frame = self.render(self.tick);
        self.tick += 1;
        Ok(CaptureEvent::Frame(frame))
    }
}

/// Fully saturated color at `hue` degrees.
fn hue_to_rgb(hue: u32) -> [u8; 3] {
    let h = hue % 360;
    let rise = ((h % 60) * 255 / 60) as u8;
    let fall = 255 - rise;
    match h / 60 {
        0 => [255, rise, 0],
        1 => [fall, 255, 0],
        2 => [0, 255, rise],
        3 => [0, fall, 255],
        4 => [rise, 0, 255],
        _ => [255, 0, fall],
    }
}

// ── Tests ────────────────────────────────────────────────────────
