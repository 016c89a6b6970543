use std::path::Path;

use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3};
use nshare::ToNdarray2;
use serde_derive::{Deserialize, Serialize};

use crate::{
    error::{Result, UpsampleError},
    image::{
        is_valid_depth, ColorImage, IntoColorArray, IntoImageRgb8, IntoLumaImage, RgbdImage,
        INVALID_DEPTH,
    },
};

/// How 16-bit depth images map to normalized depth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthEncoding {
    /// Meters per raw unit.
    pub depth_scale: f64,
    /// Distance in meters of the far clip plane, mapped to 1.
    pub far_clip: f64,
}

impl Default for DepthEncoding {
    fn default() -> Self {
        Self {
            depth_scale: 0.001,
            far_clip: 10.0,
        }
    }
}

impl DepthEncoding {
    pub fn new(depth_scale: f64, far_clip: f64) -> Result<Self> {
        let encoding = Self {
            depth_scale,
            far_clip,
        };
        encoding.validate()?;
        Ok(encoding)
    }

    fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.depth_scale) || !positive(self.far_clip) {
            return Err(UpsampleError::invalid_parameter(format!(
                "depth scale ({}) and far clip ({}) must be positive",
                self.depth_scale, self.far_clip
            )));
        }
        Ok(())
    }

    /// Normalized depth of a raw value. 0 and anything at or beyond the far
    /// clip is invalid.
    pub fn normalize(&self, raw: u16) -> f32 {
        if raw == 0 {
            return INVALID_DEPTH;
        }
        // In f64, so that depths in whole raw units read back exactly.
        let depth = (raw as f64 * self.depth_scale / self.far_clip) as f32;
        if is_valid_depth(depth) {
            depth
        } else {
            INVALID_DEPTH
        }
    }

    /// Raw value of a normalized depth. Invalid depths become 0, valid ones
    /// at least 1.
    pub fn encode(&self, depth: f32) -> u16 {
        if !is_valid_depth(depth) {
            return 0;
        }
        let raw = (depth as f64 * self.far_clip / self.depth_scale).round();
        num::clamp(raw, 1.0, u16::MAX as f64) as u16
    }
}

/// Reads any image format supported by the `image` crate as RGB in `[0, 1]`.
pub fn read_color_image<P: AsRef<Path>>(path: P) -> Result<ColorImage> {
    Ok(image::open(path)?.into_rgb8().into_color_array())
}

pub fn write_color_image<P: AsRef<Path>>(path: P, color: &Array3<f32>) -> Result<()> {
    color.to_image_rgb8().save(path)?;
    Ok(())
}

/// Reads a 16-bit depth image as normalized depth.
pub fn read_depth_image<P: AsRef<Path>>(path: P, encoding: DepthEncoding) -> Result<Array2<f32>> {
    encoding.validate()?;
    let raw = image::open(path)?.into_luma16().into_ndarray2();
    Ok(raw.mapv(|v| encoding.normalize(v)))
}

/// Writes normalized depth as a 16-bit image, see [`DepthEncoding::encode`].
pub fn write_depth_image<P: AsRef<Path>>(
    path: P,
    depth: &Array2<f32>,
    encoding: DepthEncoding,
) -> Result<()> {
    encoding.validate()?;
    let (height, width) = depth.dim();
    let image = ImageBuffer::<Luma<u16>, Vec<u16>>::from_fn(width as u32, height as u32, |x, y| {
        Luma([encoding.encode(depth[(y as usize, x as usize)])])
    });
    image.save(path)?;
    Ok(())
}

/// Writes an 8-bit rendering of a depth map, near is bright and invalid is black.
pub fn write_depth_preview<P: AsRef<Path>>(path: P, depth: &Array2<f32>) -> Result<()> {
    depth.to_luma_image().save(path)?;
    Ok(())
}

/// Reads a color and a depth image of the same size.
pub fn read_rgbd_image<P: AsRef<Path>, Q: AsRef<Path>>(
    color_path: P,
    depth_path: Q,
    encoding: DepthEncoding,
) -> Result<RgbdImage> {
    RgbdImage::from_parts(
        read_color_image(color_path)?,
        read_depth_image(depth_path, encoding)?,
    )
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array3};
    use tempfile::tempdir;

    use super::{
        read_color_image, read_depth_image, read_rgbd_image, write_color_image,
        write_depth_image, write_depth_preview, DepthEncoding,
    };
    use crate::{error::UpsampleError, image::INVALID_DEPTH};

    #[test]
    fn verify_depth_encoding() {
        let encoding = DepthEncoding::new(0.001, 4.0).unwrap();
        assert_eq!(encoding.normalize(0), INVALID_DEPTH);
        assert_eq!(encoding.normalize(2000), 0.5);
        assert_eq!(encoding.normalize(4000), INVALID_DEPTH);
        assert_eq!(encoding.normalize(u16::MAX), INVALID_DEPTH);

        assert_eq!(encoding.encode(0.5), 2000);
        assert_eq!(encoding.encode(INVALID_DEPTH), 0);
        assert_eq!(encoding.encode(f32::NAN), 0);
        assert_eq!(encoding.encode(0.0), 1);

        assert!(DepthEncoding::new(0.0, 4.0).is_err());
        assert!(DepthEncoding::new(0.001, f64::INFINITY).is_err());

        let encoding = DepthEncoding::new(0.001, 8.0).unwrap();
        for raw in [1000, 2000, 5000, 6000] {
            assert_eq!(encoding.normalize(raw), raw as f32 / 8000.0);
            assert_eq!(encoding.encode(encoding.normalize(raw)), raw);
        }
    }

    #[test]
    fn verify_depth_png_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("depth.png");
        let encoding = DepthEncoding::new(0.001, 8.0).unwrap();
        let depth = array![[0.25, 1.0, 0.5], [0.125, 0.75, 2.0]];

        write_depth_image(&path, &depth, encoding).unwrap();
        let read = read_depth_image(&path, encoding).unwrap();
        assert_eq!(read, array![[0.25, 1.0, 0.5], [0.125, 0.75, 1.0]]);

        let preview = dir.path().join("preview.png");
        write_depth_preview(&preview, &read).unwrap();
        let preview = image::open(&preview).unwrap().into_luma8();
        assert_eq!(preview.get_pixel(0, 1).0, [255]);
        assert_eq!(preview.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn verify_rgbd_roundtrip() {
        let dir = tempdir().unwrap();
        let (color_path, depth_path) = (dir.path().join("rgb.png"), dir.path().join("d.png"));
        let color = Array3::from_shape_fn((2, 3, 3), |(row, col, c)| {
            [0.0, 0.2, 1.0][c] * (row * 3 + col) as f32 / 5.0
        });
        write_color_image(&color_path, &color).unwrap();
        write_depth_image(&depth_path, &array![[0.5, 0.5, 0.5], [0.5, 0.5, 0.5]], DepthEncoding::default())
            .unwrap();

        let rgbd = read_rgbd_image(&color_path, &depth_path, DepthEncoding::default()).unwrap();
        assert_eq!(rgbd.dim(), (2, 3));
        assert_eq!(rgbd.valid_count(), 6);
        for (a, b) in rgbd.color.iter().zip(color.iter()) {
            assert!((a - b).abs() <= 0.5 / 255.0 + 1e-6);
        }

        let color = read_color_image(&color_path).unwrap();
        assert_eq!(color.dim(), (2, 3, 3));
    }

    #[test]
    fn should_fail_on_missing_files() {
        assert!(matches!(
            read_color_image("no/such/image.png"),
            Err(UpsampleError::Image(_))
        ));
        assert!(read_depth_image("no/such/depth.png", DepthEncoding::default()).is_err());
    }
}
