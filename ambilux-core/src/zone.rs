//! Border traversal.
//!
//! Zones are walked in the physical order of the LED strip:
//!
//! ```text
//!        2. top, left → right
//!      ┌──────────────────────┐
//!   1. │                      │ 3.
//! left │                      │ right
//!   ↑  │                      │  ↓
//!      └──────────────────────┘
//! ```
//!
//! 1. Left edge, bottom to top: boxes at `x = 0`, `y = H−D, H−2D, …` for as
//!    long as the box still overlaps the frame. The topmost box may hang
//!    above row 0 and is averaged over its visible rows only.
//! 2. Top edge, left to right: `y = 0`, `x = 0, D, 2D, …` while `x < W`.
//! 3. Right edge, top to bottom: `x = W−D`, `y = 0, D, 2D, …` while `y < H`.
//!
//! The order decides which LED receives which color. It is never sorted or
//! deduplicated.

use crate::color::{Rgb, average_box};
use crate::error::{AmbiluxError, Result};
use crate::frame::RawFrame;

// ── Edge ─────────────────────────────────────────────────────────

/// Screen border a zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Top,
    Right,
}

/// Top-left corner of one sampling box, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneBox {
    pub edge: Edge,
    pub x: i64,
    pub y: i64,
}

// ── ZoneLayout ───────────────────────────────────────────────────

/// Zone geometry for a fixed frame size and box depth.
///
/// Counts are computed once at construction and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneLayout {
    width: u32,
    height: u32,
    depth: u32,
    left: usize,
    top: usize,
    right: usize,
}

impl ZoneLayout {
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AmbiluxError::InvalidConfig(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if depth == 0 {
            return Err(AmbiluxError::InvalidConfig(
                "zone depth must be at least one pixel".into(),
            ));
        }

        let vertical = height.div_ceil(depth) as usize;
        Ok(Self {
            width,
            height,
            depth,
            left: vertical,
            top: width.div_ceil(depth) as usize,
            right: vertical,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Box edge length in pixels.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of zones on `edge`.
    pub fn edge_count(&self, edge: Edge) -> usize {
        match edge {
            Edge::Left => self.left,
            Edge::Top => self.top,
            Edge::Right => self.right,
        }
    }

    /// Total zone count (left + top + right).
    pub fn zone_count(&self) -> usize {
        self.left + self.top + self.right
    }

    /// Frame packet length in bytes.
    pub fn packet_len(&self) -> usize {
        self.zone_count() * 3
    }

    /// Every sampling box in traversal order.
    pub fn boxes(&self) -> impl Iterator<Item = ZoneBox> + '_ {
        let w = self.width as i64;
        let h = self.height as i64;
        let d = self.depth as i64;

        let left = (0..self.left as i64).map(move |i| ZoneBox {
            edge: Edge::Left,
            x: 0,
            y: h - d - i * d,
        });
        let top = (0..self.top as i64).map(move |i| ZoneBox {
            edge: Edge::Top,
            x: i * d,
            y: 0,
        });
        let right = (0..self.right as i64).map(move |i| ZoneBox {
            edge: Edge::Right,
            x: w - d,
            y: i * d,
        });
        left.chain(top).chain(right)
    }
}

// ── ZoneSequence ─────────────────────────────────────────────────

/// Ordered zone colors for one frame, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneSequence {
    colors: Vec<Rgb>,
}

impl ZoneSequence {
    pub fn from_colors(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [Rgb] {
        &mut self.colors
    }

    pub fn into_colors(self) -> Vec<Rgb> {
        self.colors
    }
}

// ── ZoneMapper ───────────────────────────────────────────────────

/// Samples every border zone of a frame.
#[derive(Debug, Clone)]
pub struct ZoneMapper {
    layout: ZoneLayout,
}

impl ZoneMapper {
    pub fn new(layout: ZoneLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    /// Map `frame` into a fresh [`ZoneSequence`].
    pub fn map(&self, frame: &RawFrame<'_>) -> Result<ZoneSequence> {
        let mut out = ZoneSequence::default();
        self.map_into(frame, &mut out)?;
        Ok(out)
    }

    /// Map `frame` into `out`, reusing its allocation.
    ///
    /// Fails if the frame size differs from the layout.
    pub fn map_into(&self, frame: &RawFrame<'_>, out: &mut ZoneSequence) -> Result<()> {
        if frame.width() != self.layout.width || frame.height() != self.layout.height {
            return Err(AmbiluxError::GeometryMismatch {
                width: self.layout.width,
                height: self.layout.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        out.colors.clear();
        out.colors.reserve(self.layout.zone_count());
        out.colors.extend(
            self.layout
                .boxes()
                .map(|b| average_box(frame, b.x, b.y, self.layout.depth)),
        );

        if out.colors.len() != self.layout.zone_count() {
            return Err(AmbiluxError::ZoneCountMismatch {
                expected: self.layout.zone_count(),
                actual: out.colors.len(),
            });
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;

    #[test]
    fn reference_geometry_counts() {
        let layout = ZoneLayout::new(256, 144, 10).unwrap();
        assert_eq!(layout.edge_count(Edge::Left), 15);
        assert_eq!(layout.edge_count(Edge::Top), 26);
        assert_eq!(layout.edge_count(Edge::Right), 15);
        assert_eq!(layout.zone_count(), 56);
        assert_eq!(layout.packet_len(), 168);
    }

    #[test]
    fn count_matches_closed_form() {
        for (w, h, d) in [(256, 144, 10), (64, 48, 8), (7, 5, 3), (100, 20, 25), (9, 9, 1)] {
            let layout = ZoneLayout::new(w, h, d).unwrap();
            let (wf, hf, df) = (w as f64, h as f64, d as f64);
            let expected = ((hf - df) / df).ceil() as usize + 1
                + (wf / df).ceil() as usize
                + (hf / df).ceil() as usize;
            assert_eq!(layout.zone_count(), expected, "{w}x{h} depth {d}");
            assert_eq!(layout.boxes().count(), expected);
        }
    }

    #[test]
    fn traversal_order() {
        let layout = ZoneLayout::new(30, 20, 10).unwrap();
        let boxes: Vec<_> = layout.boxes().map(|b| (b.edge, b.x, b.y)).collect();
        assert_eq!(
            boxes,
            vec![
                (Edge::Left, 0, 10),
                (Edge::Left, 0, 0),
                (Edge::Top, 0, 0),
                (Edge::Top, 10, 0),
                (Edge::Top, 20, 0),
                (Edge::Right, 20, 0),
                (Edge::Right, 20, 10),
            ]
        );
    }

    #[test]
    fn unaligned_left_edge_ends_with_partial_box() {
        let layout = ZoneLayout::new(256, 144, 10).unwrap();
        let left: Vec<_> = layout
            .boxes()
            .filter(|b| b.edge == Edge::Left)
            .map(|b| b.y)
            .collect();
        assert_eq!(left.first(), Some(&134));
        assert_eq!(left.last(), Some(&-6));
    }

    #[test]
    fn rejects_zero_depth_and_empty_frames() {
        assert!(ZoneLayout::new(10, 10, 0).is_err());
        assert!(ZoneLayout::new(0, 10, 2).is_err());
        assert!(ZoneLayout::new(10, 0, 2).is_err());
    }

    #[test]
    fn maps_edges_to_their_colors() {
        // Left column red, top row green, right column blue, rest black.
        let (w, h) = (40u32, 30u32);
        let mut buf = FrameBuffer::black(w, h);
        for y in 0..h {
            for x in 0..w {
                let o = ((y * w + x) * 3) as usize;
                let px = if y < 10 {
                    [0, 255, 0]
                } else if x < 10 {
                    [255, 0, 0]
                } else if x >= 30 {
                    [0, 0, 255]
                } else {
                    [0, 0, 0]
                };
                buf.data[o..o + 3].copy_from_slice(&px);
            }
        }

        let mapper = ZoneMapper::new(ZoneLayout::new(w, h, 10).unwrap());
        let seq = mapper.map(&buf.as_frame().unwrap()).unwrap();
        let c = seq.colors();
        assert_eq!(seq.len(), 3 + 4 + 3);

        // Left: bottom, middle, top (top box lies in the green band).
        assert_eq!(c[0], Rgb::new(255, 0, 0));
        assert_eq!(c[1], Rgb::new(255, 0, 0));
        assert_eq!(c[2], Rgb::new(0, 255, 0));
        // Top row.
        assert!(c[3..7].iter().all(|&z| z == Rgb::new(0, 255, 0)));
        // Right: top (green band), then blue.
        assert_eq!(c[7], Rgb::new(0, 255, 0));
        assert_eq!(c[8], Rgb::new(0, 0, 255));
        assert_eq!(c[9], Rgb::new(0, 0, 255));
    }

    #[test]
    fn length_is_stable_across_frames() {
        let layout = ZoneLayout::new(256, 144, 10).unwrap();
        let mapper = ZoneMapper::new(layout);
        let mut buf = FrameBuffer::black(256, 144);
        let mut seq = ZoneSequence::default();
        for shade in [0u8, 128, 255] {
            buf.data.fill(shade);
            mapper.map_into(&buf.as_frame().unwrap(), &mut seq).unwrap();
            assert_eq!(seq.len(), 56);
            assert!(seq.colors().iter().all(|&z| z == Rgb::new(shade, shade, shade)));
        }
    }

    #[test]
    fn rejects_frame_of_wrong_size() {
        let mapper = ZoneMapper::new(ZoneLayout::new(256, 144, 10).unwrap());
        let buf = FrameBuffer::black(128, 72);
        let err = mapper.map(&buf.as_frame().unwrap()).unwrap_err();
        assert!(matches!(err, AmbiluxError::GeometryMismatch { .. }));
    }
}
