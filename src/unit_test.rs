use ndarray::{Array2, Array3};
use rstest::*;

use crate::image::{RgbdImage, SensorFrame};

/// Depth of the left half of the step edge images.
pub const STEP_NEAR: f32 = 0.3;
/// Depth of the right half of the step edge images.
pub const STEP_FAR: f32 = 0.7;

fn step_color(col: usize, width: usize) -> [f32; 3] {
    if col < width / 2 {
        [0.0, 0.2, 0.4]
    } else {
        [1.0, 0.6, 0.2]
    }
}

/// A reference image split in two flat colors at `width / 2`.
pub fn step_edge_color(height: usize, width: usize) -> Array3<f32> {
    Array3::from_shape_fn((height, width, 3), |(_, col, c)| step_color(col, width)[c])
}

/// Step edge RGBD image where only the pixels with `row % stride == 0` and
/// `col % stride == 0` are valid.
pub fn sparse_step_edge(height: usize, width: usize, stride: usize) -> RgbdImage {
    let color = step_edge_color(height, width);
    let depth = Array2::from_shape_fn((height, width), |(row, col)| {
        if row % stride != 0 || col % stride != 0 {
            1.0
        } else if col < width / 2 {
            STEP_NEAR
        } else {
            STEP_FAR
        }
    });
    RgbdImage::new(color, depth)
}

#[fixture]
pub fn step_edge_reference() -> Array3<f32> {
    step_edge_color(8, 16)
}

#[fixture]
pub fn step_edge_rgbd() -> RgbdImage {
    sparse_step_edge(8, 16, 1)
}

#[fixture]
pub fn step_edge_frame() -> SensorFrame {
    SensorFrame::new(step_edge_color(32, 32), sparse_step_edge(32, 32, 3)).with_timestamp(0.5)
}

/// Smooth color and depth ramps, with every third pixel invalid.
#[fixture]
pub fn gradient_rgbd() -> RgbdImage {
    let (height, width) = (12, 16);
    let color = Array3::from_shape_fn((height, width, 3), |(row, col, c)| match c {
        0 => col as f32 / (width - 1) as f32,
        1 => row as f32 / (height - 1) as f32,
        _ => 0.5,
    });
    let depth = Array2::from_shape_fn((height, width), |(row, col)| {
        if (row * width + col) % 3 == 2 {
            1.0
        } else {
            0.2 + 0.4 * col as f32 / (width - 1) as f32 + 0.2 * row as f32 / (height - 1) as f32
        }
    });
    RgbdImage::new(color, depth)
}
