use image::{flat::SampleLayout, RgbImage};
use ndarray::{Array3, ShapeBuilder};

/// Color image of shape `[height, width, 3]` with channels in `[0, 1]`.
pub type ColorImage = Array3<f32>;

/// Trait to convert into a [`ColorImage`]. Unlike the nshare version, the
/// result uses the shape [height, width, channels] instead of [channels, height, width].
pub trait IntoColorArray {
    fn into_color_array(self) -> ColorImage;
}

impl IntoColorArray for RgbImage {
    fn into_color_array(self) -> ColorImage {
        let SampleLayout {
            channels,
            channel_stride,
            height,
            height_stride,
            width,
            width_stride,
        } = self.sample_layout();
        let shape = (height as usize, width as usize, channels as usize);
        let strides = (height_stride, width_stride, channel_stride);
        let raw: Vec<f32> = self.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
        // The layout comes from a well formed `RgbImage`, so the shape always fits.
        Array3::from_shape_vec(shape.strides(strides), raw)
            .unwrap_or_else(|_| Array3::zeros(shape))
    }
}

/// Trait to convert objects into image::RgbImage
pub trait IntoImageRgb8 {
    fn to_image_rgb8(&self) -> RgbImage;
}

impl IntoImageRgb8 for Array3<f32> {
    /// Channels beyond the third are ignored; values are clamped to `[0, 1]`.
    fn to_image_rgb8(&self) -> RgbImage {
        let (height, width, _) = self.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (row, col) = (y as usize, x as usize);
            let channel = |c: usize| (num::clamp(self[(row, col, c)], 0.0, 1.0) * 255.0).round() as u8;
            image::Rgb([channel(0), channel(1), channel(2)])
        })
    }
}
