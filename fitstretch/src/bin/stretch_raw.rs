//! Stretches a raw little-endian f32 image to an 8-bit grayscale PNG.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stretch_raw -- image.f32 2048 2048 image.png [config.yaml]
//! ```
//!
//! The optional YAML file is an [`EngineConfig`]; its `default_stretch`,
//! tiling and `log_level` settings are used.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use fitstretch::{stretch_image, EngineConfig, HeaderFacts, ImageBand, PixelBuffer, TileLayout};

struct Args {
    input: PathBuf,
    width: usize,
    height: usize,
    output: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !(4..=5).contains(&args.len()) {
        bail!("usage: stretch_raw <input.f32> <width> <height> <output.png> [config.yaml]");
    }
    Ok(Args {
        input: PathBuf::from(&args[0]),
        width: args[1].parse().context("width must be a positive integer")?,
        height: args[2].parse().context("height must be a positive integer")?,
        output: PathBuf::from(&args[3]),
        config: args.get(4).map(PathBuf::from),
    })
}

fn read_samples(path: &Path, len: usize) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() != len * 4 {
        bail!(
            "{} holds {} bytes, expected {} for {} f32 samples",
            path.display(),
            bytes.len(),
            len * 4,
            len
        );
    }
    let mut samples = vec![0f32; len];
    bytemuck::cast_slice_mut::<f32, u8>(&mut samples).copy_from_slice(&bytes);
    if cfg!(target_endian = "big") {
        for v in &mut samples {
            *v = f32::from_bits(v.to_bits().swap_bytes());
        }
    }
    Ok(samples)
}

fn write_png(path: &Path, width: usize, height: usize, gray: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(gray)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    common::log_setup::setup_logging(&config.log_level, None);

    let samples = read_samples(&args.input, args.width * args.height)?;
    let pixels = PixelBuffer::new(args.width, args.height, samples)?;
    let image = ImageBand::new(pixels, HeaderFacts::default());

    let start = Instant::now();
    let options = config.tile_options();
    let spec = config.spec_or_default(None);
    let result = stretch_image(&image.band(), &spec, &options)?;
    let Some(tiled) = result.full else {
        bail!("decimation '{}' produces no full resolution output", options.decimation);
    };
    let raster = TileLayout::new(args.width, args.height, options.tile_size)?.assemble(&tiled)?;
    tracing::info!(
        spec = %result.resolved,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "stretched {}",
        args.input.display()
    );

    write_png(&args.output, args.width, args.height, &raster)?;
    tracing::info!("wrote {}", args.output.display());
    Ok(())
}
