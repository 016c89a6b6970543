use std::path::PathBuf;

use bilateral_upsample::{
    io::{read_color_image, read_depth_image, write_depth_image, write_depth_preview, DepthEncoding},
    pyramid::coverage,
    DepthUpsampler, RgbdImage, SensorFrame, UpsampleMode, UpsampleParams,
};
use clap::Parser;
use itertools::Itertools;
use log::info;

/// Densifies a sparse 16-bit depth image guided by a color image.
#[derive(Parser)]
#[clap(version)]
struct Args {
    /// Reference color image, at the output resolution
    reference: PathBuf,
    /// Sparse 16-bit depth image, 0 marks pixels without depth
    depth: PathBuf,
    /// Output 16-bit depth image
    output: PathBuf,
    /// Color of the depth samples, defaults to the reference image
    #[clap(long)]
    sparse_color: Option<PathBuf>,
    /// Number of pyramid levels
    #[clap(long, default_value_t = 3)]
    levels: usize,
    /// Uses a single full resolution grid instead of the pyramid
    #[clap(long, action)]
    direct: bool,
    /// JSON file with the upsampling parameters
    #[clap(long)]
    params: Option<PathBuf>,
    /// Meters per depth unit
    #[clap(long, default_value_t = 0.001)]
    depth_scale: f64,
    /// Distance of the far clip plane in meters
    #[clap(long, default_value_t = 10.0)]
    far_clip: f64,
    /// Also writes an 8-bit rendering of the result
    #[clap(long)]
    preview: Option<PathBuf>,
}

fn main() -> bilateral_upsample::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut params = match &args.params {
        Some(path) => UpsampleParams::from_json_file(path)?,
        None => UpsampleParams::default(),
    };
    if args.direct {
        params = params.with_mode(UpsampleMode::Direct);
    }
    let encoding = DepthEncoding::new(args.depth_scale, args.far_clip)?;

    let reference = read_color_image(&args.reference)?;
    let depth = read_depth_image(&args.depth, encoding)?;
    let sparse_color = match &args.sparse_color {
        Some(path) => read_color_image(path)?,
        None => reference.clone(),
    };
    let frame = SensorFrame::new(reference, RgbdImage::from_parts(sparse_color, depth)?);

    let (height, width) = frame.rgbd.dim();
    let mut upsampler = DepthUpsampler::new(params);
    upsampler.setup(width, height, args.levels)?;
    let results = upsampler.upsample_frame(&frame)?;

    info!(
        "coverage per level: {}",
        coverage(results)
            .iter()
            .map(|c| format!("{:.1}%", 100.0 * c))
            .join(", ")
    );

    write_depth_image(&args.output, &results[0].depth, encoding)?;
    if let Some(path) = &args.preview {
        write_depth_preview(path, &results[0].depth)?;
    }
    Ok(())
}
