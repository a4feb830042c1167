//! Terminal preview of the outgoing zone colors.
//!
//! Each rendered frame is one line of ANSI true-color cells, left edge
//! (bottom to top), then top (left to right), then right (top to bottom),
//! redrawn in place with a carriage return.

use std::fmt::Write as _;
use std::io::Write;
use std::time::{Duration, Instant};

use ambilux_core::color::Rgb;
use ambilux_core::pipeline::ZoneObserver;

/// Minimum spacing between redraws.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(100);

/// Render `zones` as a single line of colored blocks.
pub fn render_line(zones: &[Rgb]) -> String {
    let mut line = String::with_capacity(zones.len() * 20 + 8);
    line.push('\r');
    for z in zones {
        let _ = write!(line, "\x1b[48;2;{};{};{}m ", z.r, z.g, z.b);
    }
    line.push_str("\x1b[0m");
    line
}

/// Throttled writer of preview lines.
pub struct TerminalPreview<W> {
    out: W,
    refresh: Duration,
    last: Option<Instant>,
}

impl<W: Write> TerminalPreview<W> {
    pub fn new(out: W, refresh: Duration) -> Self {
        Self {
            out,
            refresh,
            last: None,
        }
    }

    /// Draw `zones` unless the previous redraw was too recent. Returns
    /// whether a line was written.
    pub fn show(&mut self, zones: &[Rgb]) -> bool {
        let now = Instant::now();
        if self.last.is_some_and(|t| now.duration_since(t) < self.refresh) {
            return false;
        }
        self.last = Some(now);
        if let Err(e) = self
            .out
            .write_all(render_line(zones).as_bytes())
            .and_then(|()| self.out.flush())
        {
            tracing::debug!("preview write failed: {e}");
            return false;
        }
        true
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> TerminalPreview<W> {
    /// Wrap the preview as a pipeline observer.
    pub fn into_observer(mut self) -> ZoneObserver {
        Box::new(move |zones| {
            self.show(zones);
        })
    }
}

/// Preview on stderr at the default refresh rate.
pub fn stderr_observer() -> ZoneObserver {
    TerminalPreview::new(std::io::stderr(), DEFAULT_REFRESH).into_observer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_has_one_cell_per_zone() {
        let line = render_line(&[Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]);
        assert!(line.starts_with('\r'));
        assert!(line.contains("\x1b[48;2;255;0;0m "));
        assert!(line.contains("\x1b[48;2;0;0;255m "));
        assert!(line.ends_with("\x1b[0m"));
        assert_eq!(line.matches("48;2;").count(), 2);
    }

    #[test]
    fn redraws_are_throttled() {
        let mut p = TerminalPreview::new(Vec::new(), Duration::from_secs(60));
        assert!(p.show(&[Rgb::BLACK]));
        assert!(!p.show(&[Rgb::BLACK]));
        let out = String::from_utf8(p.into_inner()).unwrap();
        assert_eq!(out.matches('\r').count(), 1);
    }

    #[test]
    fn zero_refresh_draws_every_frame() {
        let mut p = TerminalPreview::new(Vec::new(), Duration::ZERO);
        assert!(p.show(&[Rgb::BLACK]));
        assert!(p.show(&[Rgb::BLACK]));
    }
}
