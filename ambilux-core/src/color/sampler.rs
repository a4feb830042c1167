//! Box averaging.
//!
//! A zone's color is the integer-truncated mean of every in-bounds pixel of
//! a `size × size` box. Pixels outside the frame are skipped, so a box
//! straddling an edge is averaged over fewer pixels rather than darkened.

use crate::color::Rgb;
use crate::frame::RawFrame;

/// Average the `size × size` box whose top-left corner is `(x, y)`.
///
/// `(x, y)` may lie outside the frame. A box with no in-bounds pixel
/// yields black.
pub fn average_box(frame: &RawFrame<'_>, x: i64, y: i64, size: u32) -> Rgb {
    let size = size as i64;
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + size).min(frame.width() as i64);
    let y1 = (y + size).min(frame.height() as i64);

    if x0 >= x1 || y0 >= y1 {
        return Rgb::BLACK;
    }

    let mut totals = [0u64; 3];
    for py in y0..y1 {
        for px in x0..x1 {
            let [r, g, b] = frame.pixel(px as u32, py as u32);
            totals[0] += r as u64;
            totals[1] += g as u64;
            totals[2] += b as u64;
        }
    }

    let count = ((x1 - x0) * (y1 - y0)) as u64;
    Rgb::new(
        (totals[0] / count) as u8,
        (totals[1] / count) as u8,
        (totals[2] / count) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;

    fn gradient(width: u32, height: u32) -> FrameBuffer {
        let mut buf = FrameBuffer::black(width, height);
        for y in 0..height {
            for x in 0..width {
                let o = ((y * width + x) * 3) as usize;
                buf.data[o] = (x * 10) as u8;
                buf.data[o + 1] = (y * 10) as u8;
                buf.data[o + 2] = ((x + y) % 7) as u8;
            }
        }
        buf
    }

    #[test]
    fn in_bounds_box_is_exact_truncated_mean() {
        let buf = gradient(8, 8);
        let frame = buf.as_frame().unwrap();
        let got = average_box(&frame, 1, 2, 3);

        let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
        for y in 2..5 {
            for x in 1..4 {
                let [pr, pg, pb] = frame.pixel(x, y);
                r += pr as u32;
                g += pg as u32;
                b += pb as u32;
            }
        }
        assert_eq!(got, Rgb::new((r / 9) as u8, (g / 9) as u8, (b / 9) as u8));
    }

    #[test]
    fn truncates_rather_than_rounds() {
        let mut buf = FrameBuffer::black(2, 1);
        buf.data.copy_from_slice(&[1, 0, 255, 2, 1, 254]);
        let frame = buf.as_frame().unwrap();
        // (1+2)/2 = 1, (0+1)/2 = 0, (255+254)/2 = 254
        assert_eq!(average_box(&frame, 0, 0, 2), Rgb::new(1, 0, 254));
    }

    #[test]
    fn straddling_box_uses_only_in_bounds_pixels() {
        let mut buf = FrameBuffer::black(4, 4);
        for px in buf.data.chunks_exact_mut(3) {
            px.copy_from_slice(&[200, 100, 50]);
        }
        let frame = buf.as_frame().unwrap();
        // Box hangs off the top-left and the bottom-right corners.
        assert_eq!(average_box(&frame, -2, -2, 4), Rgb::new(200, 100, 50));
        assert_eq!(average_box(&frame, 3, 3, 4), Rgb::new(200, 100, 50));
    }

    #[test]
    fn fully_outside_box_is_black() {
        let mut buf = FrameBuffer::black(4, 4);
        buf.data.fill(255);
        let frame = buf.as_frame().unwrap();
        assert_eq!(average_box(&frame, -10, 0, 4), Rgb::BLACK);
        assert_eq!(average_box(&frame, 0, 4, 4), Rgb::BLACK);
    }

    #[test]
    fn respects_stride_padding() {
        // 2x2 frame with 2 bytes of padding per row that must be ignored.
        let data = [
            10, 10, 10, 20, 20, 20, 99, 99, //
            30, 30, 30, 40, 40, 40, 99, 99,
        ];
        let frame = RawFrame::with_stride(&data, 2, 2, 8).unwrap();
        assert_eq!(average_box(&frame, 0, 0, 2), Rgb::new(25, 25, 25));
    }
}
