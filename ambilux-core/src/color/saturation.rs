//! HSV saturation boost.
//!
//! Colors are converted to hexagonal HSV, saturation is multiplied by the
//! boost factor and clamped to 1.0, then converted back. Value (the max
//! channel) is carried through untouched, so the output stays in range.

use crate::color::Rgb;

/// Below this chroma a color is treated as gray and left alone.
const ACHROMATIC_EPSILON: f32 = 0.001;

/// Boost the saturation of `color` by `boost`.
///
/// Boost factors `<= 1.0` return the color unchanged.
pub fn boost_saturation(color: Rgb, boost: f32) -> Rgb {
    if boost.is_nan() || boost <= 1.0 {
        return color;
    }

    let r = color.r as f32 / 255.0;
    let g = color.g as f32 / 255.0;
    let b = color.b as f32 / 255.0;

    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let delta = max - min;

    if delta < ACHROMATIC_EPSILON {
        return color;
    }

    let v = max;
    let s = (delta / max * boost).min(1.0);

    // Hue in [0, 1), then back to a sector index in 0..6.
    let hue = (if r == max {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if g == max {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    }) / 6.0;

    let sector = hue * 6.0;
    let i = sector.trunc();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (i as u32) % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb::new(to_channel(r), to_channel(g), to_channel(b))
}

/// Truncating quantization; the float-to-int cast saturates at 0 and 255.
fn to_channel(unit: f32) -> u8 {
    (unit * 255.0) as u8
}

// ── SaturationCorrector ──────────────────────────────────────────

/// Applies a fixed saturation boost to every zone of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaturationCorrector {
    boost: f32,
}

impl SaturationCorrector {
    pub fn new(boost: f32) -> Self {
        Self { boost }
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    /// `true` when the corrector leaves every color unchanged.
    pub fn is_noop(&self) -> bool {
        self.boost.is_nan() || self.boost <= 1.0
    }

    pub fn apply(&self, color: Rgb) -> Rgb {
        boost_saturation(color, self.boost)
    }

    /// Correct every zone in place, preserving order.
    pub fn apply_all(&self, zones: &mut [Rgb]) {
        if self.is_noop() {
            return;
        }
        for zone in zones {
            *zone = self.apply(*zone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> impl Iterator<Item = Rgb> {
        (0..=255u16).step_by(17).flat_map(|r| {
            (0..=255u16).step_by(51).flat_map(move |g| {
                (0..=255u16)
                    .step_by(85)
                    .map(move |b| Rgb::new(r as u8, g as u8, b as u8))
            })
        })
    }

    #[test]
    fn boost_at_or_below_one_is_identity() {
        for c in samples() {
            assert_eq!(boost_saturation(c, 1.0), c);
            assert_eq!(boost_saturation(c, 0.5), c);
            assert_eq!(boost_saturation(c, -3.0), c);
        }
    }

    #[test]
    fn gray_is_unchanged() {
        for v in 0..=255u8 {
            let c = Rgb::new(v, v, v);
            assert_eq!(boost_saturation(c, 3.0), c);
        }
    }

    #[test]
    fn boosts_muted_red() {
        // s = 0.5 -> 0.75, v = 200
        assert_eq!(
            boost_saturation(Rgb::new(200, 100, 100), 1.5),
            Rgb::new(200, 50, 50)
        );
    }

    #[test]
    fn boosts_muted_green() {
        assert_eq!(
            boost_saturation(Rgb::new(100, 200, 100), 1.5),
            Rgb::new(50, 200, 50)
        );
    }

    #[test]
    fn saturation_clamps_at_full() {
        // s = 0.5 * 4 -> clamped to 1.0: min channel goes to zero.
        assert_eq!(
            boost_saturation(Rgb::new(100, 100, 200), 4.0),
            Rgb::new(0, 0, 200)
        );
        // Already fully saturated.
        assert_eq!(
            boost_saturation(Rgb::new(255, 0, 0), 2.0),
            Rgb::new(255, 0, 0)
        );
    }

    #[test]
    fn channels_are_truncated_not_rounded() {
        // The green channel lands just below 5.0 before quantization.
        assert_eq!(
            boost_saturation(Rgb::new(0, 5, 30), 1.5),
            Rgb::new(0, 4, 30)
        );
        assert_eq!(to_channel(0.999), 254);
        assert_eq!(to_channel(1.0), 255);
        assert_eq!(to_channel(0.0), 0);
    }

    #[test]
    fn value_channel_is_preserved() {
        for c in samples() {
            let out = boost_saturation(c, 1.7);
            let max_in = c.r.max(c.g).max(c.b);
            let max_out = out.r.max(out.g).max(out.b);
            assert_eq!(max_in, max_out, "{c:?} -> {out:?}");
        }
    }

    #[test]
    fn corrector_preserves_order() {
        let corrector = SaturationCorrector::new(1.5);
        let mut zones = vec![
            Rgb::new(200, 100, 100),
            Rgb::new(10, 10, 10),
            Rgb::new(100, 200, 100),
        ];
        corrector.apply_all(&mut zones);
        assert_eq!(
            zones,
            vec![
                Rgb::new(200, 50, 50),
                Rgb::new(10, 10, 10),
                Rgb::new(50, 200, 50)
            ]
        );
    }

    #[test]
    fn nan_boost_is_noop() {
        let corrector = SaturationCorrector::new(f32::NAN);
        assert!(corrector.is_noop());
        assert_eq!(corrector.apply(Rgb::new(1, 2, 3)), Rgb::new(1, 2, 3));
    }
}
