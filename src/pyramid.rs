//! Color and RGBD mip pyramids. Level `k` has `(height >> k, width >> k)`
//! pixels and is reduced from level `k - 1` by 2x2 blocks.

use ndarray::{Array2, Array3, ArrayView3, Axis, Zip};
use ordered_float::OrderedFloat;
use serde_derive::{Deserialize, Serialize};

use crate::{
    error::{Result, UpsampleError},
    image::{ColorImage, RgbdImage, INVALID_DEPTH},
    memory::{Array2Recycle, Array3Recycle},
};

/// Which valid depth of a 2x2 block survives the RGBD reduction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducePolicy {
    /// Largest valid depth.
    #[default]
    Farthest,
    /// Smallest valid depth.
    Nearest,
}

impl ReducePolicy {
    /// Whether `candidate` replaces `current`. Strict, so on ties the first
    /// pixel stays.
    #[inline]
    fn prefers(&self, candidate: f32, current: f32) -> bool {
        match self {
            ReducePolicy::Farthest => OrderedFloat(candidate) > OrderedFloat(current),
            ReducePolicy::Nearest => OrderedFloat(candidate) < OrderedFloat(current),
        }
    }
}

/// Clamps a requested level count to at least 1 and to the levels that keep
/// at least one pixel.
pub fn clamp_num_levels(width: usize, height: usize, requested: usize) -> usize {
    let smallest = width.min(height);
    let available = if smallest == 0 {
        1
    } else {
        (usize::BITS - smallest.leading_zeros()) as usize
    };
    requested.clamp(1, available)
}

/// Averages each 2x2 block of `src` into `dst`.
fn reduce_color(src: ArrayView3<f32>, dst: &mut Array3<f32>) {
    Zip::indexed(dst.lanes_mut(Axis(2))).par_for_each(|(row, col), mut rgb| {
        let (r0, c0) = (2 * row, 2 * col);
        for c in 0..3 {
            rgb[c] = 0.25
                * (src[(r0, c0, c)]
                    + src[(r0, c0 + 1, c)]
                    + src[(r0 + 1, c0, c)]
                    + src[(r0 + 1, c0 + 1, c)]);
        }
    });
}

/// Picks one valid pixel of each 2x2 block of `src` according to `policy`.
/// Blocks without valid pixels become invalid and black.
fn reduce_rgbd(src: &RgbdImage, dst: &mut RgbdImage, policy: ReducePolicy) {
    let RgbdImage { color, depth } = dst;
    Zip::indexed(depth)
        .and(color.lanes_mut(Axis(2)))
        .par_for_each(|(row, col), depth, mut rgb| {
            let (r0, c0) = (2 * row, 2 * col);
            let best = [(r0, c0), (r0, c0 + 1), (r0 + 1, c0), (r0 + 1, c0 + 1)]
                .into_iter()
                .filter(|(r, c)| src.is_valid(*r, *c))
                .fold(None, |best: Option<(usize, usize)>, candidate| match best {
                    Some(current)
                        if !policy.prefers(src.depth[candidate], src.depth[current]) =>
                    {
                        Some(current)
                    }
                    _ => Some(candidate),
                });

            match best {
                Some((r, c)) => {
                    *depth = src.depth[(r, c)];
                    for k in 0..3 {
                        rgb[k] = src.color[(r, c, k)];
                    }
                }
                None => {
                    *depth = INVALID_DEPTH;
                    rgb.fill(0.0);
                }
            }
        });
}

/// Color pyramid that reuses its buffers across updates.
#[derive(Clone, Debug, Default)]
pub struct ColorPyramid {
    levels: Vec<ColorImage>,
}

impl ColorPyramid {
    /// Rebuilds the pyramid from `base`, which must have 3 channels. The
    /// level count is clamped with [`clamp_num_levels`].
    pub fn update(&mut self, base: &Array3<f32>, num_levels: usize) -> Result<()> {
        let (height, width, channels) = base.dim();
        if channels != 3 {
            return Err(UpsampleError::invalid_parameter(format!(
                "color pyramid needs 3 channels, found {channels}"
            )));
        }
        let num_levels = clamp_num_levels(width, height, num_levels);
        let mut previous = std::mem::take(&mut self.levels).into_iter();

        let mut level0 = Array3Recycle::from(previous.next()).get((height, width, channels));
        level0.assign(base);
        self.levels.push(level0);

        for k in 1..num_levels {
            let mut level =
                Array3Recycle::from(previous.next()).get((height >> k, width >> k, 3));
            reduce_color(self.levels[k - 1].view(), &mut level);
            self.levels.push(level);
        }
        Ok(())
    }

    pub fn levels(&self) -> &[ColorImage] {
        &self.levels
    }

    pub fn level(&self, k: usize) -> Option<&ColorImage> {
        self.levels.get(k)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn into_levels(self) -> Vec<ColorImage> {
        self.levels
    }
}

/// RGBD pyramid that reuses its buffers across updates.
#[derive(Clone, Debug, Default)]
pub struct RgbdPyramid {
    levels: Vec<RgbdImage>,
    policy: ReducePolicy,
}

impl RgbdPyramid {
    pub fn new(policy: ReducePolicy) -> Self {
        Self {
            levels: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> ReducePolicy {
        self.policy
    }

    /// Rebuilds the pyramid from `base`. The level count is clamped with
    /// [`clamp_num_levels`].
    pub fn update(&mut self, base: &RgbdImage, num_levels: usize) {
        let (height, width) = base.dim();
        let num_levels = clamp_num_levels(width, height, num_levels);
        let mut previous = std::mem::take(&mut self.levels).into_iter();

        for k in 0..num_levels {
            let (color, depth) = match previous.next() {
                Some(RgbdImage { color, depth }) => (Some(color), Some(depth)),
                None => (None, None),
            };
            let dim = (height >> k, width >> k);
            let mut level = RgbdImage::new(
                Array3Recycle::from(color).get((dim.0, dim.1, 3)),
                Array2Recycle::from(depth).get(dim),
            );
            if k == 0 {
                level.assign_from(base);
            } else {
                reduce_rgbd(&self.levels[k - 1], &mut level, self.policy);
            }
            self.levels.push(level);
        }
    }

    pub fn levels(&self) -> &[RgbdImage] {
        &self.levels
    }

    pub fn level(&self, k: usize) -> Option<&RgbdImage> {
        self.levels.get(k)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn into_levels(self) -> Vec<RgbdImage> {
        self.levels
    }
}

/// Builds `num_levels` levels of box-averaged color.
pub fn build_color_pyramid(base: &Array3<f32>, num_levels: usize) -> Result<Vec<ColorImage>> {
    let mut pyramid = ColorPyramid::default();
    pyramid.update(base, num_levels)?;
    Ok(pyramid.into_levels())
}

/// Builds `num_levels` RGBD levels from a color image and a normalized depth
/// map of the same size.
pub fn build_rgbd_pyramid(
    color: &Array3<f32>,
    depth: &Array2<f32>,
    num_levels: usize,
    policy: ReducePolicy,
) -> Result<Vec<RgbdImage>> {
    let base = RgbdImage::from_parts(color.clone(), depth.clone())?;
    let mut pyramid = RgbdPyramid::new(policy);
    pyramid.update(&base, num_levels);
    Ok(pyramid.into_levels())
}

/// Fraction of valid pixels of every level, finest first.
pub fn coverage(levels: &[RgbdImage]) -> Vec<f32> {
    levels
        .iter()
        .map(|level| {
            let (height, width) = level.dim();
            let total = (height * width).max(1);
            level.valid_count() as f32 / total as f32
        })
        .collect()
}
