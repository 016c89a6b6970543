use std::time::Instant;

use itertools::izip;
use log::{debug, log_enabled, trace, Level};
use ndarray::Array3;
use serde_derive::{Deserialize, Serialize};

use crate::{
    bilateral::{BilateralGrid, BlurParams, RangeFeature, SplatParams},
    error::{Result, UpsampleError},
    image::{RgbdImage, SensorFrame},
    pyramid::{clamp_num_levels, coverage, ColorPyramid, ReducePolicy, RgbdPyramid},
};

/// How [`DepthUpsampler::upsample`] walks the pyramid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsampleMode {
    /// Coarse to fine, each level merging the previous level's result.
    #[default]
    Hierarchical,
    /// A single grid at full resolution, fed with the sparse samples.
    Direct,
}

/// Parameters of the [`DepthUpsampler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsampleParams {
    /// Cells of the two range axes.
    pub range_size: [usize; 2],
    /// Down sample factor of x, y and the two range axes.
    pub sigma: [f32; 4],
    /// Border cells of x, y and the two range axes.
    pub padding: [i32; 4],
    pub range_feature: RangeFeature,
    pub blur: BlurParams,
    pub reduce_policy: ReducePolicy,
    pub mode: UpsampleMode,
}

impl Default for UpsampleParams {
    fn default() -> Self {
        Self {
            range_size: [16, 1],
            sigma: [1.0; 4],
            padding: [0; 4],
            range_feature: RangeFeature::default(),
            blur: BlurParams::default(),
            reduce_policy: ReducePolicy::default(),
            mode: UpsampleMode::default(),
        }
    }
}

impl UpsampleParams {
    pub fn with_range_size(mut self, value: [usize; 2]) -> Self {
        self.range_size = value;
        self
    }

    pub fn with_sigma(mut self, value: [f32; 4]) -> Self {
        self.sigma = value;
        self
    }

    pub fn with_padding(mut self, value: [i32; 4]) -> Self {
        self.padding = value;
        self
    }

    pub fn with_range_feature(mut self, value: RangeFeature) -> Self {
        self.range_feature = value;
        self
    }

    pub fn with_blur(mut self, value: BlurParams) -> Self {
        self.blur = value;
        self
    }

    pub fn with_reduce_policy(mut self, value: ReducePolicy) -> Self {
        self.reduce_policy = value;
        self
    }

    pub fn with_mode(mut self, value: UpsampleMode) -> Self {
        self.mode = value;
        self
    }
}

/// Dense depth from a sparse RGBD image, guided by a reference color image.
///
/// Owns the pyramids, one bilateral grid per upsampled level and the results.
/// All of them are allocated by [`DepthUpsampler::setup`] and reused by every
/// frame of the same size.
///
/// # Example
///
/// ```no_run
/// use bilateral_upsample::{DepthUpsampler, UpsampleParams, SensorFrame};
/// # fn frame() -> SensorFrame { unimplemented!() }
///
/// let mut upsampler = DepthUpsampler::new(UpsampleParams::default());
/// upsampler.setup(640, 480, 3).unwrap();
/// let results = upsampler.upsample_frame(&frame()).unwrap();
/// let dense = &results[0];
/// ```
pub struct DepthUpsampler {
    params: UpsampleParams,
    /// `(width, height)` of level 0.
    dims: Option<(usize, usize)>,
    num_levels: usize,
    color_pyramid: ColorPyramid,
    rgbd_pyramid: RgbdPyramid,
    grids: Vec<BilateralGrid>,
    results: Vec<RgbdImage>,
}

impl DepthUpsampler {
    pub fn new(params: UpsampleParams) -> Self {
        let rgbd_pyramid = RgbdPyramid::new(params.reduce_policy);
        Self {
            params,
            dims: None,
            num_levels: 0,
            color_pyramid: ColorPyramid::default(),
            rgbd_pyramid,
            grids: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn params(&self) -> &UpsampleParams {
        &self.params
    }

    /// Allocates pyramids, grids and results for `width x height` inputs and
    /// `num_levels` levels (clamped to at least 1 and to the levels that keep
    /// a pixel).
    ///
    /// # Returns
    ///
    /// `true` if anything was allocated, `false` if the upsampler was already
    /// set up this way.
    pub fn setup(&mut self, width: usize, height: usize, num_levels: usize) -> Result<bool> {
        if width == 0 || height == 0 {
            return Err(UpsampleError::invalid_parameter(format!(
                "cannot upsample a {width}x{height} image"
            )));
        }
        let num_levels = clamp_num_levels(width, height, num_levels);
        if self.dims == Some((width, height)) && self.num_levels == num_levels {
            return Ok(false);
        }

        let params = &self.params;
        self.grids = (0..(num_levels - 1).max(1))
            .map(|k| {
                let mut grid = BilateralGrid::new(params.range_feature);
                grid.configure(
                    [
                        width >> k,
                        height >> k,
                        params.range_size[0],
                        params.range_size[1],
                    ],
                    params.sigma,
                    params.padding,
                );
                grid
            })
            .collect();
        self.results = (0..num_levels)
            .map(|k| RgbdImage::invalid(height >> k, width >> k))
            .collect();
        self.color_pyramid = ColorPyramid::default();
        self.rgbd_pyramid = RgbdPyramid::new(params.reduce_policy);
        self.dims = Some((width, height));
        self.num_levels = num_levels;

        debug!(
            "depth upsampler: {}x{}, {} levels, {} grids, {:?} mode",
            width,
            height,
            num_levels,
            self.grids.len(),
            self.params.mode
        );
        Ok(true)
    }

    pub fn is_configured(&self) -> bool {
        self.dims.is_some()
    }

    /// `(height, width)` of level 0.
    fn base_dim(&self) -> Result<(usize, usize)> {
        self.dims
            .map(|(width, height)| (height, width))
            .ok_or(UpsampleError::Unconfigured)
    }

    /// Rebuilds the color pyramid from the reference image.
    pub fn update_color_pyramid(&mut self, reference: &Array3<f32>) -> Result<()> {
        let base_dim = self.base_dim()?;
        let (height, width, channels) = reference.dim();
        UpsampleError::check_dims("reference image", base_dim, (height, width))?;
        if channels != 3 {
            return Err(UpsampleError::invalid_parameter(format!(
                "reference image must have 3 channels, found {channels}"
            )));
        }
        self.color_pyramid.update(reference, self.num_levels)
    }

    /// Rebuilds the RGBD pyramid from the sparse samples.
    pub fn update_rgbd_pyramid(&mut self, rgbd: &RgbdImage) -> Result<()> {
        let base_dim = self.base_dim()?;
        UpsampleError::check_dims("rgbd image", base_dim, rgbd.dim())?;
        self.rgbd_pyramid.update(rgbd, self.num_levels);
        Ok(())
    }

    /// Runs the upsampling on the current pyramids.
    ///
    /// # Returns
    ///
    /// One image per level, level 0 being the dense output.
    pub fn upsample(&mut self) -> Result<&[RgbdImage]> {
        self.upsample_at(SplatParams::default())
    }

    /// Updates both pyramids from `frame` and upsamples.
    pub fn upsample_frame(&mut self, frame: &SensorFrame) -> Result<&[RgbdImage]> {
        self.update_color_pyramid(&frame.reference)?;
        self.update_rgbd_pyramid(&frame.rgbd)?;
        let time = frame.timestamp.unwrap_or_default() as f32;
        self.upsample_at(SplatParams::default().with_time(time))
    }

    fn upsample_at(&mut self, splat: SplatParams) -> Result<&[RgbdImage]> {
        self.base_dim()?;
        if self.color_pyramid.len() != self.num_levels || self.rgbd_pyramid.len() != self.num_levels
        {
            return Err(UpsampleError::invalid_parameter(
                "both pyramids must be updated before upsampling",
            ));
        }

        let start = Instant::now();
        match self.params.mode {
            UpsampleMode::Hierarchical => self.upsample_hierarchical(splat)?,
            UpsampleMode::Direct => self.upsample_direct(splat)?,
        }
        debug!(
            "upsampled {} levels in {:?}, coverage {:?}",
            self.num_levels,
            start.elapsed(),
            coverage(&self.results)
        );
        if log_enabled!(Level::Trace) {
            for (k, sparse, result) in izip!(0.., self.rgbd_pyramid.levels(), &self.results) {
                trace!(
                    "level {}: {} sparse samples, {} valid pixels",
                    k,
                    sparse.valid_count(),
                    result.valid_count()
                );
            }
        }
        Ok(&self.results)
    }

    fn upsample_hierarchical(&mut self, splat: SplatParams) -> Result<()> {
        let num_levels = self.num_levels;
        let colors = self.color_pyramid.levels();
        let rgbd = self.rgbd_pyramid.levels();
        let blur = &self.params.blur;

        if num_levels >= 2 {
            self.results[num_levels - 1].assign_from(&rgbd[num_levels - 1]);
        }

        let coarsest = num_levels.saturating_sub(2);
        let grid = &mut self.grids[coarsest];
        grid.clear()?;
        grid.splat(&rgbd[coarsest], splat)?;
        grid.blur_and_normalize(blur)?;
        let stats = grid.slice_merge(
            &colors[coarsest],
            None,
            &rgbd[coarsest],
            &mut self.results[coarsest],
        )?;
        trace!("level {}: {:?}", coarsest, stats);

        for k in (0..coarsest).rev() {
            let (finer, coarser) = self.results.split_at_mut(k + 1);
            let previous = &coarser[0];
            let grid = &mut self.grids[k];
            grid.clear()?;
            grid.splat(previous, splat)?;
            grid.blur_and_normalize(blur)?;
            let stats = grid.slice_merge(&colors[k], Some(previous), &rgbd[k], &mut finer[k])?;
            trace!("level {}: {:?}", k, stats);
        }
        Ok(())
    }

    fn upsample_direct(&mut self, splat: SplatParams) -> Result<()> {
        let grid = &mut self.grids[0];
        grid.clear()?;
        grid.splat(&self.rgbd_pyramid.levels()[0], splat)?;
        grid.blur_and_normalize(&self.params.blur)?;
        let valid = grid.slice(&self.color_pyramid.levels()[0], &mut self.results[0])?;
        trace!("direct: {} valid pixels", valid);
        Ok(())
    }

    /// Result of `level`, `None` before setup or past the last level.
    pub fn result(&self, level: usize) -> Option<&RgbdImage> {
        self.results.get(level)
    }

    pub fn results(&self) -> &[RgbdImage] {
        &self.results
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn color_pyramid(&self) -> &ColorPyramid {
        &self.color_pyramid
    }

    pub fn rgbd_pyramid(&self) -> &RgbdPyramid {
        &self.rgbd_pyramid
    }

    pub fn grid(&self, k: usize) -> Option<&BilateralGrid> {
        self.grids.get(k)
    }

    pub fn num_grids(&self) -> usize {
        self.grids.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::{DepthUpsampler, UpsampleMode, UpsampleParams};
    use crate::{
        bilateral::{BlurParams, RangeFeature},
        error::UpsampleError,
        image::{RgbdImage, SensorFrame, INVALID_DEPTH},
        pyramid::ReducePolicy,
        unit_test::{step_edge_frame, STEP_FAR, STEP_NEAR},
    };

    fn assert_step_edge(result: &RgbdImage, sparse: &RgbdImage, keeps_samples: bool) {
        let (height, width) = result.dim();
        assert_eq!(result.valid_count(), width * height);
        for row in 0..height {
            for col in 0..width {
                if keeps_samples && sparse.is_valid(row, col) {
                    assert_eq!(result.depth[(row, col)], sparse.depth[(row, col)]);
                    assert_eq!(result.color_at(row, col), sparse.color_at(row, col));
                }
                let expected = if col < width / 2 { STEP_NEAR } else { STEP_FAR };
                assert_abs_diff_eq!(result.depth[(row, col)], expected, epsilon = 1e-4);
            }
        }
    }

    #[rstest]
    fn should_fail_before_setup(step_edge_frame: SensorFrame) {
        let mut upsampler = DepthUpsampler::new(UpsampleParams::default());
        assert!(!upsampler.is_configured());
        assert!(matches!(upsampler.upsample(), Err(UpsampleError::Unconfigured)));
        assert!(matches!(
            upsampler.update_color_pyramid(&step_edge_frame.reference),
            Err(UpsampleError::Unconfigured)
        ));
        assert!(matches!(
            upsampler.upsample_frame(&step_edge_frame),
            Err(UpsampleError::Unconfigured)
        ));
        assert!(upsampler.setup(0, 4, 2).is_err());
    }

    #[test]
    fn verify_setup_is_idempotent() {
        let mut upsampler = DepthUpsampler::new(UpsampleParams::default());
        assert!(upsampler.setup(64, 48, 3).unwrap());
        assert!(!upsampler.setup(64, 48, 3).unwrap());
        assert_eq!(upsampler.num_levels(), 3);
        assert_eq!(upsampler.num_grids(), 2);
        assert_eq!(upsampler.result(2).unwrap().dim(), (12, 16));
        assert!(upsampler.result(3).is_none());
        assert_eq!(
            upsampler.grid(1).unwrap().layout().unwrap().config.input_size,
            [32, 24, 16, 1]
        );

        assert!(upsampler.setup(64, 48, 1).unwrap());
        assert_eq!(upsampler.num_grids(), 1);
        assert_eq!(upsampler.results().len(), 1);

        // Clamped to the levels that keep a pixel.
        assert!(upsampler.setup(4, 2, 8).unwrap());
        assert_eq!(upsampler.num_levels(), 2);
        assert!(!upsampler.setup(4, 2, 5).unwrap());
    }

    #[rstest]
    fn should_reject_mismatching_frames(step_edge_frame: SensorFrame) {
        let mut upsampler = DepthUpsampler::new(UpsampleParams::default());
        upsampler.setup(16, 32, 2).unwrap();
        assert!(matches!(
            upsampler.update_color_pyramid(&step_edge_frame.reference),
            Err(UpsampleError::InvalidParameter(_))
        ));
        assert!(matches!(
            upsampler.update_rgbd_pyramid(&step_edge_frame.rgbd),
            Err(UpsampleError::InvalidParameter(_))
        ));

        upsampler.setup(32, 32, 2).unwrap();
        upsampler.update_color_pyramid(&step_edge_frame.reference).unwrap();
        // The RGBD pyramid is still missing.
        assert!(matches!(
            upsampler.upsample(),
            Err(UpsampleError::InvalidParameter(_))
        ));
    }

    #[rstest]
    #[case(3)]
    #[case(2)]
    #[case(1)]
    fn verify_hierarchical_upsample(step_edge_frame: SensorFrame, #[case] num_levels: usize) {
        let mut upsampler = DepthUpsampler::new(UpsampleParams::default());
        upsampler.setup(32, 32, num_levels).unwrap();

        let results = upsampler.upsample_frame(&step_edge_frame).unwrap();
        assert_eq!(results.len(), num_levels);
        assert_step_edge(&results[0], &step_edge_frame.rgbd, true);

        if num_levels >= 2 {
            let coarsest = upsampler.rgbd_pyramid().level(num_levels - 1).unwrap();
            assert_eq!(upsampler.result(num_levels - 1).unwrap(), coarsest);
        }
    }

    #[rstest]
    fn verify_direct_upsample(step_edge_frame: SensorFrame) {
        let params = UpsampleParams::default().with_mode(UpsampleMode::Direct);
        let mut upsampler = DepthUpsampler::new(params);
        upsampler.setup(32, 32, 3).unwrap();
        assert_eq!(upsampler.num_grids(), 2);

        upsampler.upsample_frame(&step_edge_frame).unwrap();
        assert_step_edge(upsampler.result(0).unwrap(), &step_edge_frame.rgbd, false);
        // Only level 0 is computed.
        assert_eq!(upsampler.result(1).unwrap().valid_count(), 0);
        assert_eq!(upsampler.result(2).unwrap().valid_count(), 0);
    }

    #[rstest]
    fn verify_empty_input_stays_invalid(step_edge_frame: SensorFrame) {
        let mut frame = step_edge_frame;
        frame.rgbd.invalidate();

        for mode in [UpsampleMode::Hierarchical, UpsampleMode::Direct] {
            let mut upsampler = DepthUpsampler::new(UpsampleParams::default().with_mode(mode));
            upsampler.setup(32, 32, 3).unwrap();
            let results = upsampler.upsample_frame(&frame).unwrap();
            assert!(results[0].depth.iter().all(|d| *d == INVALID_DEPTH));
        }
    }

    #[rstest]
    fn verify_results_are_reused(step_edge_frame: SensorFrame) {
        let params = UpsampleParams::default()
            .with_sigma([2.0, 2.0, 1.0, 1.0])
            .with_padding([1, 1, 0, 0])
            .with_range_feature(RangeFeature::Red)
            .with_reduce_policy(ReducePolicy::Nearest)
            .with_blur(BlurParams::default().with_spatial_passes(2));
        let mut upsampler = DepthUpsampler::new(params);
        upsampler.setup(32, 32, 3).unwrap();

        let first = upsampler.upsample_frame(&step_edge_frame).unwrap()[0].clone();
        let pointer = upsampler.result(0).unwrap().depth.as_ptr();
        let second = &upsampler.upsample_frame(&step_edge_frame).unwrap()[0];
        assert_eq!(&first, second);
        assert_eq!(upsampler.result(0).unwrap().depth.as_ptr(), pointer);
        assert_eq!(upsampler.grid(0).unwrap().layout().unwrap().grid_size, [19, 19, 16, 1]);
    }

    #[test]
    fn verify_params_from_partial_json() {
        let params: UpsampleParams =
            serde_json::from_str(r#"{"mode": "direct", "blur": {"spatial_passes": 2}}"#).unwrap();
        assert_eq!(params.mode, UpsampleMode::Direct);
        assert_eq!(params.blur.spatial_passes, 2);
        assert_eq!(params.blur.range_attenuation, 1.0e-3);
        assert_eq!(params.range_size, [16, 1]);
        assert_eq!(params.reduce_policy, ReducePolicy::Farthest);
    }
}
