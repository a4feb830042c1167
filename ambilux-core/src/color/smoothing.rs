//! Temporal smoothing.
//!
//! Each zone keeps a floating-point accumulator updated as
//! `state = α·new + (1 − α)·state`. State is indexed by zone position and
//! seeded verbatim from the first frame, so the strip does not fade in
//! from black.

use crate::color::Rgb;
use crate::error::{AmbiluxError, Result};

/// Lower bound for the smoothing factor.
pub const MIN_SMOOTHING: f32 = 0.1;
/// Upper bound for the smoothing factor; disables smoothing.
pub const MAX_SMOOTHING: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Accumulator {
    r: f32,
    g: f32,
    b: f32,
}

impl Accumulator {
    fn seed(c: Rgb) -> Self {
        Self {
            r: c.r as f32,
            g: c.g as f32,
            b: c.b as f32,
        }
    }

    fn blend(&mut self, c: Rgb, alpha: f32) {
        self.r = alpha * c.r as f32 + (1.0 - alpha) * self.r;
        self.g = alpha * c.g as f32 + (1.0 - alpha) * self.g;
        self.b = alpha * c.b as f32 + (1.0 - alpha) * self.b;
    }

    fn to_rgb(self) -> Rgb {
        Rgb::new(quantize(self.r), quantize(self.g), quantize(self.b))
    }
}

fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ── TemporalSmoother ─────────────────────────────────────────────

/// Exponential moving average over successive zone sequences.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    alpha: f32,
    state: Option<Vec<Accumulator>>,
}

impl TemporalSmoother {
    /// Create a smoother. `alpha` is clamped into
    /// [`MIN_SMOOTHING`]`..=`[`MAX_SMOOTHING`]; a non-finite value
    /// disables smoothing.
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(MIN_SMOOTHING, MAX_SMOOTHING)
        } else {
            MAX_SMOOTHING
        };
        Self { alpha, state: None }
    }

    /// The effective (clamped) smoothing factor.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Number of zones tracked, or `None` before the first frame.
    pub fn zone_count(&self) -> Option<usize> {
        self.state.as_ref().map(Vec::len)
    }

    /// Drop all state; the next frame seeds it again.
    ///
    /// Must be called whenever the zone count changes.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Smooth `zones` in place.
    ///
    /// The first call seeds the state and leaves `zones` untouched. Later
    /// calls fail with [`AmbiluxError::ZoneCountMismatch`] if the length
    /// differs from the seeded one.
    pub fn apply(&mut self, zones: &mut [Rgb]) -> Result<()> {
        let alpha = self.alpha;
        if let Some(state) = self.state.as_mut() {
            if state.len() != zones.len() {
                return Err(AmbiluxError::ZoneCountMismatch {
                    expected: state.len(),
                    actual: zones.len(),
                });
            }
            for (acc, zone) in state.iter_mut().zip(zones.iter_mut()) {
                acc.blend(*zone, alpha);
                *zone = acc.to_rgb();
            }
            return Ok(());
        }

        self.state = Some(zones.iter().copied().map(Accumulator::seed).collect());
        Ok(())
    }
}
