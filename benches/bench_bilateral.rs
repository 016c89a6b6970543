use bilateral_upsample::{
    BilateralGrid, BlurParams, DepthUpsampler, RgbdImage, SensorFrame, SplatParams, UpsampleMode,
    UpsampleParams, INVALID_DEPTH,
};

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array2, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn sample_frame(width: usize, height: usize) -> SensorFrame {
    let mut rng = StdRng::seed_from_u64(5);
    let reference = Array3::from_shape_fn((height, width, 3), |(row, col, c)| {
        let t = (col as f32 / width as f32 + row as f32 / height as f32) * 0.5;
        [t, 1.0 - t, 0.5][c]
    });
    let depth = Array2::from_shape_fn((height, width), |(row, col)| {
        if rng.gen_bool(0.1) {
            0.2 + 0.5 * (row + col) as f32 / (width + height) as f32
        } else {
            INVALID_DEPTH
        }
    });
    SensorFrame::new(reference.clone(), RgbdImage::new(reference, depth))
}

fn criterion_benchmark(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let frame = sample_frame(width, height);

    let mut grid = BilateralGrid::default();
    grid.configure([width, height, 16, 1], [1.0; 4], [0; 4]);

    c.bench_function("bilateral grid splat", |b| {
        b.iter(|| {
            grid.clear().unwrap();
            grid.splat(&frame.rgbd, SplatParams::default()).unwrap();
        });
    });
    c.bench_function("bilateral grid blur and normalize", |b| {
        b.iter(|| {
            grid.clear().unwrap();
            grid.blur_and_normalize(&BlurParams::default()).unwrap();
        });
    });
    c.bench_function("bilateral slice operation", |b| {
        let mut dest = RgbdImage::invalid(height, width);
        grid.clear().unwrap();
        grid.splat(&frame.rgbd, SplatParams::default()).unwrap();
        grid.blur_and_normalize(&BlurParams::default()).unwrap();
        b.iter(|| {
            grid.slice(&frame.reference, &mut dest).unwrap();
        });
    });

    for mode in [UpsampleMode::Hierarchical, UpsampleMode::Direct] {
        let mut upsampler = DepthUpsampler::new(UpsampleParams::default().with_mode(mode));
        upsampler.setup(width, height, 3).unwrap();
        c.bench_function(&format!("depth upsample {mode:?}"), |b| {
            b.iter(|| {
                upsampler.upsample_frame(&frame).unwrap();
            });
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
