//! Parallel tiled stretching of whole images.
//!
//! An image is cut into square tiles (shorter at the right and bottom edges)
//! that are stretched independently with `rayon`. Outputs are the tiles'
//! row-major bytes concatenated in tile order, column of tiles by column of
//! tiles; [`TileLayout::assemble`] turns them back into a plain raster.
//! Optional half and quarter resolution outputs average the stretched bytes of
//! each tile.


use std::borrow::Cow;
use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::engine::{stretch_mask, Band, ImageMask, PreparedStretch, BLANK_SINGLE_BAND};
use crate::error::{Error, Result};
use crate::hue::{HuePreservingCompositor, PreparedThreeColor};
use crate::pixels::{PixelBuffer, Region};
use crate::range_values::StretchSpec;

pub const DEFAULT_TILE_SIZE: usize = 1024;

// ============================================================================
// Options
// ============================================================================

/// Which resolutions a tiled stretch produces.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Decimation {
    #[default]
    Full,
    Half,
    HalfFull,
    QuarterHalf,
    QuarterHalfFull,
}

impl Decimation {
    pub fn full(self) -> bool {
        matches!(
            self,
            Decimation::Full | Decimation::HalfFull | Decimation::QuarterHalfFull
        )
    }

    pub fn half(self) -> bool {
        !matches!(self, Decimation::Full)
    }

    pub fn quarter(self) -> bool {
        matches!(
            self,
            Decimation::QuarterHalf | Decimation::QuarterHalfFull
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOptions {
    pub tile_size: usize,
    pub decimation: Decimation,
    /// Reverse the row order before stretching, so the first output row is
    /// the last stored row.
    pub flip_vertical: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            decimation: Decimation::Full,
            flip_vertical: false,
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

/// One tile: its index in tile order and the pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDef {
    pub index: usize,
    pub region: Region,
}

/// Tiling of a `width` x `height` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    width: usize,
    height: usize,
    tile_size: usize,
    x_panels: usize,
    y_panels: usize,
}

impl TileLayout {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::invalid("tile size", "must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(Error::EmptyBuffer);
        }
        Ok(Self {
            width,
            height,
            tile_size,
            x_panels: width.div_ceil(tile_size),
            y_panels: height.div_ceil(tile_size),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tile_count(&self) -> usize {
        self.x_panels * self.y_panels
    }

    /// Tiles in output order: top to bottom within a column of tiles, columns
    /// left to right.
    pub fn tiles(&self) -> Vec<TileDef> {
        let mut tiles = Vec::with_capacity(self.tile_count());
        for i in 0..self.x_panels {
            for j in 0..self.y_panels {
                let x = i * self.tile_size;
                let y = j * self.tile_size;
                tiles.push(TileDef {
                    index: tiles.len(),
                    region: Region::new(
                        x,
                        y,
                        self.tile_size.min(self.width - x),
                        self.tile_size.min(self.height - y),
                    ),
                });
            }
        }
        tiles
    }

    /// Layout of the `factor`-decimated image, when tiles decimate evenly.
    pub fn decimated(&self, factor: usize) -> Option<Self> {
        if factor == 0 || self.tile_size % factor != 0 {
            return None;
        }
        Self::new(
            self.width.div_ceil(factor),
            self.height.div_ceil(factor),
            self.tile_size / factor,
        )
        .ok()
    }

    /// Row-major raster from tile-ordered bytes.
    pub fn assemble(&self, tiled: &[u8]) -> Result<Vec<u8>> {
        let expected = self.width * self.height;
        if tiled.len() != expected {
            return Err(Error::OutputSizeMismatch {
                expected,
                actual: tiled.len(),
            });
        }
        let mut raster = vec![0u8; expected];
        let mut offset = 0;
        for tile in self.tiles() {
            let region = tile.region;
            let bytes = &tiled[offset..offset + region.len()];
            for (range, row) in region.rows(self.width).zip(bytes.chunks_exact(region.width)) {
                raster[range].copy_from_slice(row);
            }
            offset += region.len();
        }
        Ok(raster)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Tile-ordered outputs of one band. Each resolution is present only when the
/// requested [`Decimation`] includes it.
#[derive(Debug, Clone, PartialEq)]
pub struct StretchedImage {
    pub full: Option<Vec<u8>>,
    pub half: Option<Vec<u8>>,
    pub quarter: Option<Vec<u8>>,
    pub resolved: StretchSpec,
}

/// Planar three-band outputs; absent bands stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StretchedRgb {
    pub bands: [Option<StretchedImage>; 3],
}

#[derive(Debug, Default)]
struct TileOutput {
    full: Option<Vec<u8>>,
    half: Option<Vec<u8>>,
    quarter: Option<Vec<u8>>,
}

impl TileOutput {
    fn from_full(bytes: Vec<u8>, region: &Region, decimation: Decimation) -> Self {
        let half = decimation
            .half()
            .then(|| decimate(&bytes, region.width, region.height, 2));
        let quarter = decimation
            .quarter()
            .then(|| decimate(&bytes, region.width, region.height, 4));
        Self {
            full: decimation.full().then_some(bytes),
            half,
            quarter,
        }
    }
}

fn concat(parts: impl Iterator<Item = Option<Vec<u8>>>) -> Option<Vec<u8>> {
    parts.reduce(|acc, part| match (acc, part) {
        (Some(mut acc), Some(part)) => {
            acc.extend_from_slice(&part);
            Some(acc)
        }
        _ => None,
    })?
}

fn merge(tiles: Vec<TileOutput>, resolved: StretchSpec) -> StretchedImage {
    let mut full = Vec::with_capacity(tiles.len());
    let mut half = Vec::with_capacity(tiles.len());
    let mut quarter = Vec::with_capacity(tiles.len());
    for tile in tiles {
        full.push(tile.full);
        half.push(tile.half);
        quarter.push(tile.quarter);
    }
    StretchedImage {
        full: concat(full.into_iter()),
        half: concat(half.into_iter()),
        quarter: concat(quarter.into_iter()),
        resolved,
    }
}

// ============================================================================
// Decimation
// ============================================================================

/// Averages `factor` x `factor` cells of a `width` x `height` byte raster.
///
/// The window around each sampled cell starts `factor / 2` cells back, except
/// at the left and top edges where it starts at the cell itself. Cells past
/// the raster edge are left out of the average.
pub fn decimate(input: &[u8], width: usize, height: usize, factor: usize) -> Vec<u8> {
    let out_width = width.div_ceil(factor);
    let out_height = height.div_ceil(factor);
    let mut out = Vec::with_capacity(out_width * out_height);
    for y in (0..height).step_by(factor) {
        let rows = window(y, factor, height);
        for x in (0..width).step_by(factor) {
            let cols = window(x, factor, width);
            let mut sum = 0u32;
            let mut count = 0u32;
            for row in rows.clone() {
                for &v in &input[row * width + cols.start..row * width + cols.end] {
                    sum += v as u32;
                    count += 1;
                }
            }
            out.push((sum / count.max(1)) as u8);
        }
    }
    out
}

fn window(index: usize, factor: usize, len: usize) -> Range<usize> {
    let half = factor / 2;
    let (start, end) = if index < half {
        (index, index + factor)
    } else {
        (index - half, index + half)
    };
    start..end.min(len)
}

// ============================================================================
// Tiled stretches
// ============================================================================

fn run_tiles<T, F>(layout: &TileLayout, what: &str, task: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&TileDef) -> Result<T> + Sync + Send,
{
    let tiles = layout.tiles();
    let start = std::time::Instant::now();
    let results = tiles.par_iter().map(task).collect::<Result<Vec<_>>>()?;
    tracing::info!(
        what,
        width = layout.width(),
        height = layout.height(),
        tiles = tiles.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "tiled stretch done"
    );
    Ok(results)
}

fn oriented(pixels: &PixelBuffer, flip: bool) -> Cow<'_, PixelBuffer> {
    if flip {
        Cow::Owned(pixels.flipped_vertical())
    } else {
        Cow::Borrowed(pixels)
    }
}

/// Stretches a whole band tile by tile.
///
/// Bounds are resolved once over the display row order, then shared by every
/// tile.
pub fn stretch_image(
    band: &Band,
    spec: &StretchSpec,
    options: &TileOptions,
) -> Result<StretchedImage> {
    let (width, height) = band.pixels.dimensions();
    let layout = TileLayout::new(width, height, options.tile_size)?;
    let pixels = oriented(band.pixels, options.flip_vertical);
    let band = Band {
        pixels: &pixels,
        ..*band
    };
    let prepared = PreparedStretch::new(&band, spec, BLANK_SINGLE_BAND)?;

    let tiles = run_tiles(&layout, "single band", |tile| {
        let mut bytes = vec![0u8; tile.region.len()];
        prepared.stretch_region(band.pixels, band.header, &tile.region, &mut bytes)?;
        Ok(TileOutput::from_full(bytes, &tile.region, options.decimation))
    })?;
    Ok(merge(tiles, prepared.resolved_spec()))
}

/// Stretches up to three bands tile by tile. Bounds and the shared intensity
/// stretch are resolved once, before the first tile; see
/// [`PreparedThreeColor::new`].
pub fn stretch_rgb_image(
    compositor: &HuePreservingCompositor,
    bands: [Option<Band>; 3],
    specs: [Option<StretchSpec>; 3],
    options: &TileOptions,
) -> Result<StretchedRgb> {
    let (width, height) = bands
        .iter()
        .flatten()
        .next()
        .map(|band| band.pixels.dimensions())
        .ok_or_else(|| Error::invalid("bands", "at least one band is required"))?;
    let layout = TileLayout::new(width, height, options.tile_size)?;

    let flipped = bands.map(|band| band.map(|band| oriented(band.pixels, options.flip_vertical)));
    let oriented_bands: [Option<Band>; 3] = std::array::from_fn(|c| {
        bands[c].zip(flipped[c].as_ref()).map(|(band, pixels)| Band {
            pixels: &**pixels,
            ..band
        })
    });

    let prepared = PreparedThreeColor::new(compositor, oriented_bands, specs)?;

    let tiles = run_tiles(&layout, "three color", |tile| {
        let len = tile.region.len();
        let (mut r, mut g, mut b) = (vec![0u8; len], vec![0u8; len], vec![0u8; len]);
        prepared.stretch_region(&tile.region, [&mut r, &mut g, &mut b])?;
        Ok([r, g, b].map(|bytes| TileOutput::from_full(bytes, &tile.region, options.decimation)))
    })?;

    let resolved = prepared.resolved_specs();
    let mut per_band: [Vec<TileOutput>; 3] = Default::default();
    for outputs in tiles {
        for (c, output) in outputs.into_iter().enumerate() {
            per_band[c].push(output);
        }
    }
    let mut per_band = per_band.into_iter();
    let bands = std::array::from_fn(|c| {
        let tiles = per_band.next().unwrap_or_default();
        resolved[c].map(|spec| merge(tiles, spec))
    });
    Ok(StretchedRgb { bands })
}

/// Renders mask codes tile by tile; see [`stretch_mask`].
pub fn stretch_mask_image(
    pixels: &PixelBuffer,
    masks: &[ImageMask],
    blank: u8,
    options: &TileOptions,
) -> Result<Vec<u8>> {
    let layout = TileLayout::new(pixels.width(), pixels.height(), options.tile_size)?;
    let oriented = oriented(pixels, options.flip_vertical);
    let tiles = run_tiles(&layout, "mask", |tile| {
        let mut bytes = vec![0u8; tile.region.len()];
        stretch_mask(&oriented, &tile.region, masks, blank, &mut bytes)?;
        Ok(bytes)
    })?;
    Ok(tiles.concat())
}

/// Interleaves three equally sized planes into RGB triplets.
pub fn interleave_rgb(red: &[u8], green: &[u8], blue: &[u8]) -> Result<Vec<u8>> {
    for plane in [green, blue] {
        if plane.len() != red.len() {
            return Err(Error::OutputSizeMismatch {
                expected: red.len(),
                actual: plane.len(),
            });
        }
    }
    let mut rgb = Vec::with_capacity(red.len() * 3);
    for ((&r, &g), &b) in red.iter().zip(green).zip(blue) {
        rgb.extend_from_slice(&[r, g, b]);
    }
    Ok(rgb)
}
