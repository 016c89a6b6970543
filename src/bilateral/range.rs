use serde_derive::{Deserialize, Serialize};

use crate::image::rgb_to_luma;

/// Maps a color onto the two range axes of the grid. Splat and slice of a
/// grid must go through the same feature, otherwise lookups land on cells
/// that were never written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeFeature {
    /// Red drives range axis 1 and green drives range axis 2.
    #[default]
    RedGreen,
    /// Red drives range axis 1; range axis 2 is always 0.
    Red,
    /// Luminance drives range axis 1; range axis 2 is always 0.
    Luma,
}

impl RangeFeature {
    /// Range coordinates of `rgb`, in `[0, range_size[0] - 1] x [0, range_size[1] - 1]`.
    #[inline]
    pub fn range_coord(&self, rgb: [f32; 3], range_size: [usize; 2]) -> [f32; 2] {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { num::clamp(v, 0.0, 1.0) };
        let (r1, r2) = match self {
            RangeFeature::RedGreen => (unit(rgb[0]), unit(rgb[1])),
            RangeFeature::Red => (unit(rgb[0]), 0.0),
            RangeFeature::Luma => (unit(rgb_to_luma(rgb)), 0.0),
        };
        [
            r1 * (range_size[0].max(1) - 1) as f32,
            r2 * (range_size[1].max(1) - 1) as f32,
        ]
    }
}
