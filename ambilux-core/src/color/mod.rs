//! Per-zone color math.
//!
//! | Module       | Purpose                                           |
//! |------------- |---------------------------------------------------|
//! | `sampler`    | Box-average of a square region of a frame         |
//! | `saturation` | HSV saturation boost                              |
//! | `smoothing`  | Per-zone exponential moving average across frames |

pub mod sampler;
pub mod saturation;
pub mod smoothing;

pub use sampler::average_box;
pub use saturation::{SaturationCorrector, boost_saturation};
pub use smoothing::TemporalSmoother;

/// One zone's color: three 8-bit channels in RGB order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as `[r, g, b]`.
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// `true` when all three channels are equal.
    pub fn is_gray(self) -> bool {
        self.r == self.g && self.g == self.b
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}
