use image::GrayImage;
use ndarray::Array2;

use super::is_valid_depth;

/// Trait to convert a depth map into an 8-bit image for inspection.
pub trait IntoLumaImage {
    fn to_luma_image(&self) -> GrayImage;
}

impl IntoLumaImage for Array2<f32> {
    /// Valid depths are stretched over `[1, 255]` (near is bright);
    /// invalid pixels are black.
    fn to_luma_image(&self) -> GrayImage {
        let (height, width) = self.dim();

        let (min, max) = self
            .iter()
            .filter(|d| is_valid_depth(**d))
            .fold((f32::MAX, f32::MIN), |(mi, ma), d| (mi.min(*d), ma.max(*d)));
        let range = if max > min { max - min } else { 1.0 };

        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let depth = self[(y as usize, x as usize)];
            if !is_valid_depth(depth) {
                return image::Luma([0]);
            }
            let t = (depth - min) / range;
            image::Luma([(255.0 - t * 254.0).round() as u8])
        })
    }
}

/// Perceptual luminance of a color with channels in `[0, 1]`.
pub fn rgb_to_luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * 0.3 + rgb[1] * 0.59 + rgb[2] * 0.11
}
