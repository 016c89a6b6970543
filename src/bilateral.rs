//! Joint bilateral upsampling with a 4D bilateral grid: two spatial axes and
//! two range axes driven by a reference color.

mod layout;
pub use layout::{grid_extent, rescale_index, to_input_coord, GridConfig, GridLayout, NUM_AXES};

mod range;
pub use range::RangeFeature;

mod blur;
pub use blur::{kernel, BlurParams, GAUSSIAN_TAPS};

mod grid;
pub use grid::{
    BilateralGrid, MergeStats, Sample, SplatParams, SplatSource, WeightedRgbd, RESOLVED_SLOT,
};
