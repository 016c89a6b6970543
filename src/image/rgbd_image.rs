use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::error::{Result, UpsampleError};

/// Normalized depth of the far clip plane. Depths at or beyond it carry no
/// measurement.
pub const FAR_CLIP: f32 = 1.0;

/// Depth written into pixels that have no data.
pub const INVALID_DEPTH: f32 = FAR_CLIP;

/// Whether a normalized depth value is a measurement. NaN is invalid.
#[inline]
pub fn is_valid_depth(depth: f32) -> bool {
    (0.0..FAR_CLIP).contains(&depth)
}

/// A color image of shape `[height, width, 3]` paired with a normalized depth
/// image of shape `[height, width]`. Validity is carried by the depth
/// channel, see [`is_valid_depth`].
#[derive(Clone, Debug, PartialEq)]
pub struct RgbdImage {
    pub color: Array3<f32>,
    pub depth: Array2<f32>,
}

impl RgbdImage {
    /// Pairs color and depth without checking their dimensions.
    pub fn new(color: Array3<f32>, depth: Array2<f32>) -> Self {
        Self { color, depth }
    }

    /// Pairs color and depth, failing if they don't cover the same pixels.
    pub fn from_parts(color: Array3<f32>, depth: Array2<f32>) -> Result<Self> {
        let (height, width, channels) = color.dim();
        if channels != 3 {
            return Err(UpsampleError::invalid_parameter(format!(
                "color image must have 3 channels, found {channels}"
            )));
        }
        UpsampleError::check_dims("rgbd depth", (height, width), depth.dim())?;
        Ok(Self { color, depth })
    }

    /// An image where every pixel is invalid.
    pub fn invalid(height: usize, width: usize) -> Self {
        Self {
            color: Array3::zeros((height, width, 3)),
            depth: Array2::from_elem((height, width), INVALID_DEPTH),
        }
    }

    pub fn width(&self) -> usize {
        self.depth.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.depth.shape()[0]
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.depth.dim()
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        is_valid_depth(self.depth[(row, col)])
    }

    pub fn valid_count(&self) -> usize {
        self.depth.iter().filter(|d| is_valid_depth(**d)).count()
    }

    pub fn color_at(&self, row: usize, col: usize) -> [f32; 3] {
        [
            self.color[(row, col, 0)],
            self.color[(row, col, 1)],
            self.color[(row, col, 2)],
        ]
    }

    pub fn set(&mut self, row: usize, col: usize, color: [f32; 3], depth: f32) {
        self.color[(row, col, 0)] = color[0];
        self.color[(row, col, 1)] = color[1];
        self.color[(row, col, 2)] = color[2];
        self.depth[(row, col)] = depth;
    }

    /// Marks every pixel invalid, keeping the allocation.
    pub fn invalidate(&mut self) {
        self.color.fill(0.0);
        self.depth.fill(INVALID_DEPTH);
    }

    /// Overwrites this image with `other`, reusing the allocation when the
    /// dimensions agree.
    pub fn assign_from(&mut self, other: &RgbdImage) {
        if self.dim() == other.dim() {
            self.color.assign(&other.color);
            self.depth.assign(&other.depth);
        } else {
            *self = other.clone();
        }
    }

    pub fn view(&self) -> RgbdView<'_> {
        RgbdView {
            color: self.color.view(),
            depth: self.depth.view(),
        }
    }
}

/// Borrowed counterpart of [`RgbdImage`].
#[derive(Clone, Copy, Debug)]
pub struct RgbdView<'a> {
    pub color: ArrayView3<'a, f32>,
    pub depth: ArrayView2<'a, f32>,
}

impl<'a> RgbdView<'a> {
    pub fn dim(&self) -> (usize, usize) {
        self.depth.dim()
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        is_valid_depth(self.depth[(row, col)])
    }

    pub fn color_at(&self, row: usize, col: usize) -> [f32; 3] {
        [
            self.color[(row, col, 0)],
            self.color[(row, col, 1)],
            self.color[(row, col, 2)],
        ]
    }
}

/// A frame-consistent snapshot of the two per-frame inputs: the reference
/// color image and the sparse RGBD image.
#[derive(Clone, Debug)]
pub struct SensorFrame {
    pub reference: Array3<f32>,
    pub rgbd: RgbdImage,
    pub timestamp: Option<f64>,
}

impl SensorFrame {
    pub fn new(reference: Array3<f32>, rgbd: RgbdImage) -> Self {
        Self {
            reference,
            rgbd,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn into_parts(self) -> (Array3<f32>, RgbdImage) {
        (self.reference, self.rgbd)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3};

    use super::{is_valid_depth, RgbdImage, FAR_CLIP, INVALID_DEPTH};

    #[test]
    fn test_depth_validity() {
        assert!(is_valid_depth(0.0));
        assert!(is_valid_depth(0.999));
        assert!(!is_valid_depth(FAR_CLIP));
        assert!(!is_valid_depth(1.1));
        assert!(!is_valid_depth(-0.1));
        assert!(!is_valid_depth(f32::NAN));
    }

    #[test]
    fn test_from_parts_checks_dims() {
        assert!(RgbdImage::from_parts(Array3::zeros((4, 5, 3)), Array2::zeros((4, 5))).is_ok());
        assert!(RgbdImage::from_parts(Array3::zeros((4, 5, 3)), Array2::zeros((5, 4))).is_err());
        assert!(RgbdImage::from_parts(Array3::zeros((4, 5, 4)), Array2::zeros((4, 5))).is_err());
    }

    #[test]
    fn test_invalid_and_set() {
        let mut image = RgbdImage::invalid(3, 2);
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 3);
        assert_eq!(image.valid_count(), 0);

        image.set(2, 1, [0.1, 0.2, 0.3], 0.4);
        assert!(image.is_valid(2, 1));
        assert_eq!(image.color_at(2, 1), [0.1, 0.2, 0.3]);
        assert_eq!(image.valid_count(), 1);

        image.invalidate();
        assert_eq!(image.depth[(2, 1)], INVALID_DEPTH);
        assert_eq!(image.valid_count(), 0);
    }
}
