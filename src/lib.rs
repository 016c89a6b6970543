//! Edge-aware depth upsampling with bilateral grids.
//!
//! A sparse or low resolution depth map is densified under the guidance of a
//! full resolution color image: samples are splatted into a grid indexed by
//! position and color, blurred, normalized and sliced back at every pixel of
//! the reference. [`DepthUpsampler`] runs this coarse to fine over image
//! pyramids.

pub mod bilateral;
pub mod error;
pub mod handoff;
pub mod io;
pub mod pyramid;
pub mod upsampler;

#[cfg(test)]
mod unit_test;

mod image;
pub use crate::image::{
    is_valid_depth, rgb_to_luma, ColorImage, IntoColorArray, IntoImageRgb8, IntoLumaImage,
    RgbdImage, RgbdView, SensorFrame, FAR_CLIP, INVALID_DEPTH,
};

mod memory;
pub use memory::{Array2Recycle, Array3Recycle};

pub use bilateral::{BilateralGrid, BlurParams, RangeFeature, SplatParams};
pub use error::{Result, UpsampleError};
pub use handoff::FrameMailbox;
pub use pyramid::ReducePolicy;
pub use upsampler::{DepthUpsampler, UpsampleMode, UpsampleParams};
