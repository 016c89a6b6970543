use ndarray::{ArrayView3, ArrayViewMut3, Axis, Zip};
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

use super::layout::GridLayout;

/// Unnormalized taps of the 5-tap near-Gaussian, at offsets -2..=2:
/// `exp(-2)`, `exp(-0.5)`, `1`, `exp(-0.5)`, `exp(-2)`.
pub const GAUSSIAN_TAPS: [f32; 5] = [
    0.135_335_28,
    0.606_530_66,
    1.0,
    0.606_530_66,
    0.135_335_28,
];

/// Blur settings of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    /// Factor applied to the side taps along the range axes. Small values
    /// keep the range structure, that is the color edges, mostly intact.
    pub range_attenuation: f32,
    /// How many times the x and y passes are repeated before the range passes.
    pub spatial_passes: usize,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            range_attenuation: 1.0e-3,
            spatial_passes: 1,
        }
    }
}

impl BlurParams {
    pub fn with_range_attenuation(mut self, value: f32) -> Self {
        self.range_attenuation = value;
        self
    }

    pub fn with_spatial_passes(mut self, value: usize) -> Self {
        self.spatial_passes = value;
        self
    }

    /// Kernel for the spatial axes.
    pub fn spatial_kernel(&self) -> [f32; 5] {
        kernel(1.0)
    }

    /// Kernel for the range axes.
    pub fn range_kernel(&self) -> [f32; 5] {
        kernel(self.range_attenuation)
    }

    /// Axes visited by one blur, in order.
    pub fn axis_sequence(&self) -> Vec<usize> {
        let mut axes = Vec::with_capacity(2 * self.spatial_passes + 2);
        for _ in 0..self.spatial_passes {
            axes.extend([0, 1]);
        }
        axes.extend([2, 3]);
        axes
    }
}

/// Gaussian taps with the side taps scaled by `attenuation`, normalized to sum 1.
pub fn kernel(attenuation: f32) -> [f32; 5] {
    let attenuation = if attenuation.is_finite() {
        attenuation.max(0.0)
    } else {
        0.0
    };
    let mut taps = GAUSSIAN_TAPS;
    for i in [0, 1, 3, 4] {
        taps[i] *= attenuation;
    }
    let sum: f32 = taps.iter().sum();
    taps.map(|t| t / sum)
}

/// Convolves the grid raster `src` with `kernel` along one grid `axis`,
/// writing into `dst`. Both rasters hold `(value, weight)` pairs. Taps that
/// fall outside the axis contribute nothing, they never wrap into a
/// neighbor tile.
pub fn blur_axis(
    layout: &GridLayout,
    axis: usize,
    kernel: &[f32; 5],
    src: ArrayView3<f32>,
    mut dst: ArrayViewMut3<f32>,
) {
    let extent = layout.grid_size[axis] as isize;
    let (row_step, col_step) = layout.raster_step(axis);
    let (row_step, col_step) = (row_step as isize, col_step as isize);

    dst.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut dst_row)| {
            for col in 0..layout.raster_width {
                let position = layout.cell_of_raster(row, col)[axis] as isize;
                let (mut value, mut weight) = (0.0, 0.0);
                for (tap, w) in kernel.iter().enumerate() {
                    let offset = tap as isize - 2;
                    let neighbor = position + offset;
                    if neighbor < 0 || neighbor >= extent {
                        continue;
                    }
                    let src_row = (row as isize + offset * row_step) as usize;
                    let src_col = (col as isize + offset * col_step) as usize;
                    value += w * src[(src_row, src_col, 0)];
                    weight += w * src[(src_row, src_col, 1)];
                }
                dst_row[(col, 0)] = value;
                dst_row[(col, 1)] = weight;
            }
        });
}

/// Divides every cell with positive weight by its weight, leaving
/// `(value, 1)`. Cells without weight become `(0, 0)`.
pub fn normalize(src: ArrayView3<f32>, mut dst: ArrayViewMut3<f32>) {
    Zip::from(dst.lanes_mut(Axis(2)))
        .and(src.lanes(Axis(2)))
        .par_for_each(|mut dst_cell, src_cell| {
            let weight = src_cell[1];
            if weight > 0.0 {
                dst_cell[0] = src_cell[0] / weight;
                dst_cell[1] = 1.0;
            } else {
                dst_cell[0] = 0.0;
                dst_cell[1] = 0.0;
            }
        });
}
