use std::ops::Add;

use log::{debug, trace};
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis};
use rayon::prelude::*;

use super::{
    blur::{blur_axis, normalize, BlurParams},
    layout::{rescale_index, to_input_coord, GridConfig, GridLayout, NUM_AXES},
    range::RangeFeature,
};
use crate::{
    error::{Result, UpsampleError},
    image::{is_valid_depth, RgbdImage, RgbdView, INVALID_DEPTH},
};

/// Buffer slot that holds the grid after [`BilateralGrid::blur_and_normalize`].
pub const RESOLVED_SLOT: usize = 1;

/// Per-call splat settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatParams {
    /// Multiplies the confidence of every sample.
    pub weight: f32,
    /// Timestamp of the splatted data. It is only recorded, the grid has no
    /// time axis.
    pub time: f32,
}

impl Default for SplatParams {
    fn default() -> Self {
        Self {
            weight: 1.0,
            time: 0.0,
        }
    }
}

impl SplatParams {
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

/// One pixel as seen by the splat pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Color that selects the range cell.
    pub color: [f32; 3],
    /// Value stored in the grid, a normalized depth.
    pub value: f32,
    /// Bilateral weight of the sample. Non-positive excludes it.
    pub confidence: f32,
}

/// Anything that can be splatted into a [`BilateralGrid`].
pub trait SplatSource: Sync {
    /// `(height, width)`
    fn dim(&self) -> (usize, usize);
    fn sample(&self, row: usize, col: usize) -> Sample;
}

impl<'a> SplatSource for RgbdView<'a> {
    fn dim(&self) -> (usize, usize) {
        RgbdView::dim(self)
    }

    fn sample(&self, row: usize, col: usize) -> Sample {
        let value = self.depth[(row, col)];
        Sample {
            color: self.color_at(row, col),
            value,
            confidence: if is_valid_depth(value) { 1.0 } else { 0.0 },
        }
    }
}

impl SplatSource for RgbdImage {
    fn dim(&self) -> (usize, usize) {
        RgbdImage::dim(self)
    }

    fn sample(&self, row: usize, col: usize) -> Sample {
        self.view().sample(row, col)
    }
}

/// RGBD pixels with an explicit per-pixel confidence.
#[derive(Clone, Copy, Debug)]
pub struct WeightedRgbd<'a> {
    pub rgbd: RgbdView<'a>,
    pub confidence: ArrayView2<'a, f32>,
}

impl<'a> WeightedRgbd<'a> {
    pub fn new(rgbd: RgbdView<'a>, confidence: ArrayView2<'a, f32>) -> Result<Self> {
        UpsampleError::check_dims("confidence map", rgbd.dim(), confidence.dim())?;
        Ok(Self { rgbd, confidence })
    }
}

impl<'a> SplatSource for WeightedRgbd<'a> {
    fn dim(&self) -> (usize, usize) {
        self.rgbd.dim()
    }

    fn sample(&self, row: usize, col: usize) -> Sample {
        let mut sample = self.rgbd.sample(row, col);
        if sample.confidence > 0.0 {
            sample.confidence = self.confidence[(row, col)];
        }
        sample
    }
}

/// Where each pixel written by [`BilateralGrid::slice_merge`] came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Copied from a parent pixel that was invalid.
    pub parent_invalid: usize,
    /// Copied from a valid sparse sample.
    pub sparse: usize,
    /// Copied from a valid parent pixel because the grid cell was empty.
    pub parent_fallback: usize,
    /// Taken from the grid.
    pub grid: usize,
    /// No parent and an empty cell.
    pub invalid: usize,
}

impl MergeStats {
    pub fn total(&self) -> usize {
        self.parent_invalid + self.sparse + self.parent_fallback + self.grid + self.invalid
    }
}

impl Add for MergeStats {
    type Output = MergeStats;

    fn add(self, rhs: Self) -> Self {
        MergeStats {
            parent_invalid: self.parent_invalid + rhs.parent_invalid,
            sparse: self.sparse + rhs.sparse,
            parent_fallback: self.parent_fallback + rhs.parent_fallback,
            grid: self.grid + rhs.grid,
            invalid: self.invalid + rhs.invalid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GridState {
    Accumulating,
    Resolved,
}

/// Bilateral grid over two spatial and two range axes, used for joint
/// bilateral upsampling of depth guided by a color image.
///
/// More information: Chen, J., Paris, S.,
/// & Durand, F. (2007). Real-time edge-aware image processing with
/// the bilateral grid. ACM Transactions on Graphics (TOG), 26(3), 103-es.
///
/// The grid is stored as a tiled raster (see [`GridLayout`]) in two
/// buffers of shape `[raster_height, raster_width, 2]`, where the last
/// dimension contains, in order, the value and the weight. The blur
/// ping-pongs between them.
pub struct BilateralGrid {
    layout: Option<GridLayout>,
    range_feature: RangeFeature,
    buffers: [Array3<f32>; 2],
    active: usize,
    state: GridState,
}

impl Default for BilateralGrid {
    fn default() -> Self {
        Self::new(RangeFeature::default())
    }
}

impl BilateralGrid {
    /// Creates an unconfigured grid.
    pub fn new(range_feature: RangeFeature) -> Self {
        Self {
            layout: None,
            range_feature,
            buffers: [Array3::zeros((0, 0, 2)), Array3::zeros((0, 0, 2))],
            active: 0,
            state: GridState::Accumulating,
        }
    }

    /// Sets the grid geometry. Sigma is clamped to at least 1 and padding to
    /// at least 0. Returns `true` if the buffers were (re)allocated; calling
    /// it again with the same parameters does nothing.
    pub fn configure(
        &mut self,
        input_size: [usize; NUM_AXES],
        sigma: [f32; NUM_AXES],
        padding: [i32; NUM_AXES],
    ) -> bool {
        let config = GridConfig::new(input_size, sigma, padding);
        if matches!(self.layout, Some(layout) if layout.config == config) {
            return false;
        }

        let layout = GridLayout::new(config);
        debug!(
            "bilateral grid: input {:?}, sigma {:?}, padding {:?}, grid {:?}, raster {}x{}",
            config.input_size,
            config.sigma,
            config.padding,
            layout.grid_size,
            layout.raster_width,
            layout.raster_height
        );

        let shape = (layout.raster_height, layout.raster_width, 2);
        self.buffers = [Array3::zeros(shape), Array3::zeros(shape)];
        self.active = 0;
        self.state = GridState::Accumulating;
        self.layout = Some(layout);
        true
    }

    pub fn is_configured(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Result<&GridLayout> {
        self.layout.as_ref().ok_or(UpsampleError::Unconfigured)
    }

    pub fn range_feature(&self) -> RangeFeature {
        self.range_feature
    }

    /// Slot of the buffer that holds the current grid.
    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn is_resolved(&self) -> bool {
        self.state == GridState::Resolved
    }

    /// Empties the grid: slot 0 becomes the active buffer, with all weights 0.
    pub fn clear(&mut self) -> Result<()> {
        self.layout()?;
        self.active = 0;
        self.buffers[0].fill(0.0);
        self.state = GridState::Accumulating;
        Ok(())
    }

    /// Accumulates `source` into the grid.
    ///
    /// The source is sampled at each spatial input position of the grid,
    /// nearest pixel, so it may have a different resolution than the grid
    /// input. Every sample with positive confidence `c` adds
    /// `(value * c * weight, c * weight)` to its cell. Contributions are
    /// collected in parallel and summed in one sequential pass, so samples
    /// landing on the same cell always add up.
    ///
    /// # Returns
    ///
    /// The number of accumulated samples.
    pub fn splat<S>(&mut self, source: &S, params: SplatParams) -> Result<usize>
    where
        S: SplatSource + ?Sized,
    {
        let layout = *self.layout()?;
        if self.state == GridState::Resolved {
            return Err(UpsampleError::invalid_parameter(
                "the grid holds resolved values; clear it before splatting",
            ));
        }

        let (src_height, src_width) = source.dim();
        let weight = params.weight;
        if src_height == 0 || src_width == 0 || !(weight > 0.0 && weight.is_finite()) {
            return Ok(0);
        }

        let [input_width, input_height, range_1, range_2] = layout.config.input_size;
        let feature = self.range_feature;
        let contributions: Vec<(usize, usize, f32, f32)> = (0..input_height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let row = rescale_index(y, input_height, src_height);
                (0..input_width).filter_map(move |x| {
                    let col = rescale_index(x, input_width, src_width);
                    let sample = source.sample(row, col);
                    let confidence = sample.confidence * weight;
                    if !(confidence > 0.0 && confidence.is_finite()) || !is_valid_depth(sample.value) {
                        return None;
                    }
                    let range = feature.range_coord(sample.color, [range_1, range_2]);
                    let cell = layout.cell_of([x as f32, y as f32, range[0], range[1]]);
                    let (raster_row, raster_col) = layout.raster_of(cell);
                    Some((raster_row, raster_col, sample.value * confidence, confidence))
                })
            })
            .collect();

        let grid = &mut self.buffers[self.active];
        for (row, col, value, weight) in contributions.iter() {
            grid[(*row, *col, 0)] += value;
            grid[(*row, *col, 1)] += weight;
        }

        trace!(
            "splatted {} samples (time {}, weight {})",
            contributions.len(),
            params.time,
            weight
        );
        Ok(contributions.len())
    }

    /// Splats a color image and a depth map given separately, with an
    /// optional per-pixel confidence.
    pub fn splat_color_depth<'a>(
        &mut self,
        color: ArrayView3<'a, f32>,
        depth: ArrayView2<'a, f32>,
        confidence: Option<ArrayView2<'a, f32>>,
        params: SplatParams,
    ) -> Result<usize> {
        let dim = check_channels(color.dim())?;
        UpsampleError::check_dims("splat depth", dim, depth.dim())?;
        let rgbd = RgbdView { color, depth };
        match confidence {
            Some(confidence) => self.splat(&WeightedRgbd::new(rgbd, confidence)?, params),
            None => self.splat(&rgbd, params),
        }
    }

    /// Blurs the grid along each axis and normalizes it.
    ///
    /// The x and y passes use the full Gaussian kernel, the range passes use
    /// the attenuated one. Each pass reads the active buffer and writes the
    /// other one; the last pass divides every cell by its weight. The number
    /// of passes is always odd, so the result always ends in
    /// [`RESOLVED_SLOT`].
    pub fn blur_and_normalize(&mut self, params: &BlurParams) -> Result<()> {
        let layout = *self.layout()?;
        if self.state == GridState::Resolved {
            return Err(UpsampleError::invalid_parameter("the grid is already resolved"));
        }

        let spatial_kernel = params.spatial_kernel();
        let range_kernel = params.range_kernel();
        for axis in params.axis_sequence() {
            let kernel = if axis < 2 { &spatial_kernel } else { &range_kernel };
            self.pass(|src, dst| blur_axis(&layout, axis, kernel, src, dst));
        }
        self.pass(normalize);

        debug_assert_eq!(self.active, RESOLVED_SLOT);
        self.state = GridState::Resolved;
        Ok(())
    }

    fn pass<F>(&mut self, f: F)
    where
        F: FnOnce(ArrayView3<f32>, ArrayViewMut3<f32>),
    {
        let [first, second] = &mut self.buffers;
        if self.active == 0 {
            f(first.view(), second.view_mut());
        } else {
            f(second.view(), first.view_mut());
        }
        self.active = 1 - self.active;
    }

    /// Accumulated `(value, weight)` of a cell in the active buffer. Before
    /// the blur the value is premultiplied by the weight.
    pub fn cell_sums(&self, cell: [usize; NUM_AXES]) -> Result<(f32, f32)> {
        let layout = self.layout()?;
        let (row, col) = layout.raster_of(cell);
        let grid = &self.buffers[self.active];
        Ok((grid[(row, col, 0)], grid[(row, col, 1)]))
    }

    /// Resolved value of a cell, `None` if the cell is empty.
    pub fn resolved_cell(&self, cell: [usize; NUM_AXES]) -> Result<Option<f32>> {
        self.resolved_layout()?;
        let (value, weight) = self.cell_sums(cell)?;
        Ok(if weight > 0.0 { Some(value) } else { None })
    }

    /// Resolved value at an input coordinate `(x, y, range 1, range 2)`.
    pub fn cell_at(&self, coord: [f32; NUM_AXES]) -> Result<Option<f32>> {
        let layout = self.resolved_layout()?;
        self.resolved_cell(layout.cell_of(coord))
    }

    fn resolved_layout(&self) -> Result<&GridLayout> {
        let layout = self.layout()?;
        if self.state != GridState::Resolved {
            return Err(UpsampleError::invalid_parameter(
                "the grid must be blurred and normalized before slicing",
            ));
        }
        Ok(layout)
    }

    /// Looks up the cell of pixel `(row, col)` of an image of `(height, width)`
    /// whose reference color is `rgb`. Nearest cell.
    #[inline]
    fn lookup(
        &self,
        layout: &GridLayout,
        (row, col): (usize, usize),
        (height, width): (usize, usize),
        rgb: [f32; 3],
    ) -> Option<f32> {
        let [input_width, input_height, range_1, range_2] = layout.config.input_size;
        let range = self.range_feature.range_coord(rgb, [range_1, range_2]);
        let cell = layout.cell_of([
            to_input_coord(col, width, input_width),
            to_input_coord(row, height, input_height),
            range[0],
            range[1],
        ]);
        let (raster_row, raster_col) = layout.raster_of(cell);
        let grid = &self.buffers[RESOLVED_SLOT];
        if grid[(raster_row, raster_col, 1)] > 0.0 {
            Some(grid[(raster_row, raster_col, 0)])
        } else {
            None
        }
    }

    /// Reads the grid at every pixel of `reference` into `dest`.
    ///
    /// Pixels whose cell is empty are invalid, the others get the resolved
    /// depth. The output color is the reference color.
    ///
    /// # Returns
    ///
    /// The number of valid pixels written.
    pub fn slice(&self, reference: &Array3<f32>, dest: &mut RgbdImage) -> Result<usize> {
        let layout = self.resolved_layout()?;
        let dim = check_channels(reference.dim())?;
        UpsampleError::check_dims("slice destination", dim, dest.dim())?;

        let RgbdImage { color, depth } = dest;
        let valid = depth
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(color.axis_iter_mut(Axis(0)).into_par_iter())
            .enumerate()
            .map(|(row, (mut depth_row, mut color_row))| {
                let mut valid = 0;
                for col in 0..dim.1 {
                    let rgb = pixel(reference, row, col);
                    let value = self.lookup(layout, (row, col), dim, rgb);
                    depth_row[col] = value.unwrap_or(INVALID_DEPTH);
                    valid += value.is_some() as usize;
                    for c in 0..3 {
                        color_row[(col, c)] = rgb[c];
                    }
                }
                valid
            })
            .sum();
        Ok(valid)
    }

    /// Slices the grid while merging with the previous, coarser, result and
    /// the sparse samples of this level.
    ///
    /// For every pixel, in order:
    /// 1. a parent pixel that is invalid is copied, so no depth is made up
    ///    where the coarser level had none;
    /// 2. a valid sparse sample is copied verbatim, measurements always win
    ///    over interpolated values;
    /// 3. if the grid cell is empty, the parent pixel is copied (invalid
    ///    when there is no parent);
    /// 4. otherwise the grid value is paired with the reference color.
    ///
    /// `reference`, `sparse` and `dest` must have the same dimensions,
    /// `previous` may have any and is sampled at the nearest pixel.
    pub fn slice_merge(
        &self,
        reference: &Array3<f32>,
        previous: Option<&RgbdImage>,
        sparse: &RgbdImage,
        dest: &mut RgbdImage,
    ) -> Result<MergeStats> {
        let layout = self.resolved_layout()?;
        let dim = check_channels(reference.dim())?;
        UpsampleError::check_dims("sparse image", dim, sparse.dim())?;
        UpsampleError::check_dims("merge destination", dim, dest.dim())?;
        if let Some(previous) = previous {
            let (height, width) = previous.dim();
            if height == 0 || width == 0 {
                return Err(UpsampleError::invalid_parameter("previous upsample is empty"));
            }
        }

        let RgbdImage { color, depth } = dest;
        let stats = depth
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(color.axis_iter_mut(Axis(0)).into_par_iter())
            .enumerate()
            .map(|(row, (mut depth_row, mut color_row))| {
                let mut stats = MergeStats::default();
                for col in 0..dim.1 {
                    let parent = previous.map(|previous| {
                        let (height, width) = previous.dim();
                        let (parent_row, parent_col) =
                            (rescale_index(row, dim.0, height), rescale_index(col, dim.1, width));
                        (
                            previous.color_at(parent_row, parent_col),
                            previous.depth[(parent_row, parent_col)],
                        )
                    });

                    let (rgb, value) = match parent {
                        Some(parent) if !is_valid_depth(parent.1) => {
                            stats.parent_invalid += 1;
                            parent
                        }
                        _ if sparse.is_valid(row, col) => {
                            stats.sparse += 1;
                            (sparse.color_at(row, col), sparse.depth[(row, col)])
                        }
                        _ => {
                            let rgb = pixel(reference, row, col);
                            match (self.lookup(layout, (row, col), dim, rgb), parent) {
                                (Some(value), _) => {
                                    stats.grid += 1;
                                    (rgb, value)
                                }
                                (None, Some(parent)) => {
                                    stats.parent_fallback += 1;
                                    parent
                                }
                                (None, None) => {
                                    stats.invalid += 1;
                                    (rgb, INVALID_DEPTH)
                                }
                            }
                        }
                    };

                    depth_row[col] = value;
                    for c in 0..3 {
                        color_row[(col, c)] = rgb[c];
                    }
                }
                stats
            })
            .reduce(MergeStats::default, |a, b| a + b);

        trace!("slice merge: {:?}", stats);
        Ok(stats)
    }
}

fn check_channels((height, width, channels): (usize, usize, usize)) -> Result<(usize, usize)> {
    if channels < 3 {
        return Err(UpsampleError::invalid_parameter(format!(
            "color image must have 3 channels, found {channels}"
        )));
    }
    Ok((height, width))
}

#[inline]
fn pixel(image: &Array3<f32>, row: usize, col: usize) -> [f32; 3] {
    [
        image[(row, col, 0)],
        image[(row, col, 1)],
        image[(row, col, 2)],
    ]
}
