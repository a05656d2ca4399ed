//! Benchmarks for histogram construction, zscale and tiled stretching.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fitstretch::{
    stretch_image, zscale, Algorithm, Decimation, HeaderFacts, Histogram, ImageBand, PixelBuffer,
    StretchSpec, TileOptions, ZscaleParams,
};

const SIZE: usize = 2048;

/// Sky background with sparse bright sources.
fn synthetic_sky() -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(42);
    let pixels = (0..SIZE * SIZE)
        .map(|_| {
            let sky = 1000.0 + rng.random_range(-30.0..30.0);
            if rng.random_bool(0.001) {
                sky + rng.random_range(1000.0..60000.0)
            } else {
                sky
            }
        })
        .collect();
    PixelBuffer::new(SIZE, SIZE, pixels).expect("synthetic sky dimensions")
}

fn benchmarks(c: &mut Criterion) {
    let pixels = synthetic_sky();

    c.bench_function("histogram_2048", |b| {
        b.iter(|| black_box(Histogram::from_pixels(pixels.pixels())))
    });

    c.bench_function("zscale_2048", |b| {
        let params = ZscaleParams::default();
        b.iter(|| black_box(zscale(pixels.pixels(), SIZE, SIZE, f64::NAN, &params)))
    });

    let image = ImageBand::new(pixels.clone(), HeaderFacts::default());
    let options = TileOptions {
        tile_size: 512,
        decimation: Decimation::HalfFull,
        flip_vertical: true,
    };
    for algorithm in [Algorithm::Linear, Algorithm::Log, Algorithm::Asinh] {
        let spec = StretchSpec::default().with_algorithm(algorithm);
        c.bench_function(&format!("stretch_image_{algorithm}"), |b| {
            b.iter(|| black_box(stretch_image(&image.band(), &spec, &options)))
        });
    }
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
