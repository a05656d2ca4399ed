//! Per-pixel stretch from data values to 8-bit display levels.
//!
//! A stretch resolves its bounds once (histogram percentiles, sigmas, zscale
//! or absolute values), builds whatever lookup the algorithm needs, then maps
//! every sample of a region. [`PreparedStretch`] keeps the prepared state so
//! tiles of one image share it.

mod asinh;
mod bounds;
mod mask;
mod tables;

#[cfg(test)]
mod tests;

pub use bounds::{lower_bound, resolve_bounds, StretchBounds};
pub use mask::{stretch_mask, ImageMask, MAX_MASKS};

pub(crate) use asinh::AsinhMapping;

use common::FloatExt;

use crate::error::Result;
use crate::histogram::{Histogram, HIST_SIZE};
use crate::pixels::{check_output_len, HeaderFacts, PixelBuffer, Region};
use crate::range_values::{Algorithm, StretchSpec, DEFAULT_BIAS, DEFAULT_CONTRAST};

use tables::{Table, MAX_LEVEL};

/// Output for blank pixels of a single-band raster.
pub const BLANK_SINGLE_BAND: u8 = 255;
/// Output for blank pixels of each channel of a three-color raster.
pub const BLANK_THREE_COLOR: u8 = 0;

// ============================================================================
// Bands
// ============================================================================

/// Borrowed view of one image plane and its statistics.
#[derive(Debug, Clone, Copy)]
pub struct Band<'a> {
    pub pixels: &'a PixelBuffer,
    pub header: &'a HeaderFacts,
    pub histogram: &'a Histogram,
}

impl<'a> Band<'a> {
    pub fn new(pixels: &'a PixelBuffer, header: &'a HeaderFacts, histogram: &'a Histogram) -> Self {
        Self {
            pixels,
            header,
            histogram,
        }
    }
}

/// Owned image plane with its histogram built from the header hints.
#[derive(Debug, Clone)]
pub struct ImageBand {
    pub pixels: PixelBuffer,
    pub header: HeaderFacts,
    pub histogram: Histogram,
}

impl ImageBand {
    pub fn new(pixels: PixelBuffer, header: HeaderFacts) -> Self {
        let histogram = Histogram::from_header(pixels.pixels(), &header);
        Self {
            pixels,
            header,
            histogram,
        }
    }

    pub fn band(&self) -> Band<'_> {
        Band::new(&self.pixels, &self.header, &self.histogram)
    }
}

// ============================================================================
// Prepared stretch
// ============================================================================

#[derive(Debug, Clone)]
enum Mapping {
    Linear { low: f64, sdiff: f64 },
    Table { table: Box<Table>, descending: bool },
    PowerLawGamma { low: f64, high: f64, inv_gamma: f64 },
    Asinh(AsinhMapping),
}

impl Mapping {
    #[inline]
    fn level(&self, v: f64) -> f64 {
        match self {
            Mapping::Linear { low, sdiff } => {
                ((v - low) * MAX_LEVEL as f64 / sdiff)
                    .round()
                    .clamp(0.0, MAX_LEVEL as f64)
            }
            Mapping::Table { table, descending } => tables::lookup(table, v, *descending) as f64,
            Mapping::PowerLawGamma {
                low,
                high,
                inv_gamma,
            } => {
                if v <= *low {
                    0.0
                } else if v >= *high {
                    MAX_LEVEL as f64
                } else {
                    let rd = (v - low).powf(*inv_gamma);
                    let range = (high - low).powf(*inv_gamma);
                    (255.0 * rd / range).trunc()
                }
            }
            Mapping::Asinh(asinh) => asinh.level(v),
        }
    }
}

/// Post-stretch bias/contrast remap of display levels.
#[derive(Debug, Clone, Copy)]
struct Remap {
    offset: f64,
    contrast: f64,
    shift: f64,
}

impl Remap {
    /// `None` for the identity remap.
    fn new(bias: f64, contrast: f64) -> Option<Self> {
        if bias.approximately_eq(DEFAULT_BIAS) && contrast.approximately_eq(DEFAULT_CONTRAST) {
            return None;
        }
        let max = MAX_LEVEL as f64;
        Some(Self {
            offset: max * (bias - 0.5) * -2.0,
            contrast,
            shift: max * (1.0 - contrast) / 2.0,
        })
    }

    #[inline]
    fn apply(&self, level: f64) -> f64 {
        (self.offset + level * self.contrast + self.shift).clamp(0.0, MAX_LEVEL as f64)
    }
}

/// Bounds and lookup state for one band, ready to map samples.
///
/// Immutable and `Sync`; tiles of one image share a single instance.
#[derive(Debug, Clone)]
pub struct PreparedStretch {
    resolved: StretchSpec,
    bounds: StretchBounds,
    mapping: Mapping,
    remap: Option<Remap>,
    blank: u8,
}

impl PreparedStretch {
    /// Validates `spec` and the header, then resolves bounds against `band`.
    pub fn new(band: &Band, spec: &StretchSpec, blank: u8) -> Result<Self> {
        spec.validate()?;
        band.header.validate()?;
        let bounds = resolve_bounds(band, spec)?;
        Self::with_bounds(spec, bounds, band.histogram, blank)
    }

    /// Prepares `spec` over bounds the caller already resolved.
    pub fn with_bounds(
        spec: &StretchSpec,
        bounds: StretchBounds,
        histogram: &Histogram,
        blank: u8,
    ) -> Result<Self> {
        spec.validate()?;
        let low = bounds.low;
        let sdiff = bounds.sdiff();
        let mut resolved = *spec;
        let mapping = match spec.algorithm() {
            Algorithm::Linear => Mapping::Linear { low, sdiff },
            Algorithm::Log => table_mapping(tables::log_table(low, sdiff)),
            Algorithm::LogLog => table_mapping(tables::log_log_table(low, sdiff)),
            Algorithm::Equalize => table_mapping(histogram.equalization_table()),
            Algorithm::Squared => table_mapping(tables::squared_table(low, sdiff)),
            Algorithm::Sqrt => table_mapping(tables::sqrt_table(low, sdiff)),
            Algorithm::PowerLawGamma => Mapping::PowerLawGamma {
                low,
                high: bounds.high,
                inv_gamma: 1.0 / spec.gamma(),
            },
            Algorithm::Asinh => {
                let asinh = AsinhMapping::new(
                    bounds,
                    spec.asinh_q(),
                    (histogram.dn_min(), histogram.dn_max()),
                );
                resolved = with_estimated_q(resolved, &asinh);
                Mapping::Asinh(asinh)
            }
        };

        tracing::debug!(
            algorithm = %spec.algorithm(),
            low = bounds.low,
            high = bounds.high,
            "prepared stretch"
        );

        Ok(Self {
            resolved,
            bounds,
            mapping,
            remap: Remap::new(spec.bias(), spec.contrast()),
            blank,
        })
    }

    /// Asinh brightness pass of the hue-preserving compositor: blank 0 and no
    /// bias/contrast remap.
    pub(crate) fn intensity(spec: &StretchSpec, asinh: AsinhMapping) -> Self {
        Self {
            resolved: with_estimated_q(*spec, &asinh),
            bounds: StretchBounds::new(f64::NAN, f64::NAN),
            mapping: Mapping::Asinh(asinh),
            remap: None,
            blank: BLANK_THREE_COLOR,
        }
    }

    /// The spec with every estimated value filled in.
    ///
    /// A finite asinh Q set by the caller is reported as given, even when the
    /// mapping clamps it to `[1e-10, 1e10]`. Feeding the resolved spec back in
    /// clamps it the same way.
    pub fn resolved_spec(&self) -> StretchSpec {
        self.resolved
    }

    pub fn bounds(&self) -> StretchBounds {
        self.bounds
    }

    pub fn blank(&self) -> u8 {
        self.blank
    }

    /// Display level of a non-blank sample.
    #[inline]
    pub fn stretch_value(&self, v: f32) -> u8 {
        self.stretch_f64(v as f64)
    }

    #[inline]
    pub(crate) fn stretch_f64(&self, v: f64) -> u8 {
        let level = self.mapping.level(v);
        match &self.remap {
            Some(remap) => remap.apply(level) as u8,
            None => level as u8,
        }
    }

    /// Maps `region` of `pixels` into `out`, writing the blank sentinel for
    /// samples `header` calls blank.
    pub fn stretch_region(
        &self,
        pixels: &PixelBuffer,
        header: &HeaderFacts,
        region: &Region,
        out: &mut [u8],
    ) -> Result<()> {
        region.validate(pixels.width(), pixels.height())?;
        check_output_len(region, out)?;

        let rows = region.rows(pixels.width());
        for (range, out_row) in rows.zip(out.chunks_exact_mut(region.width)) {
            for (&v, o) in pixels.pixels()[range].iter().zip(out_row) {
                *o = if header.is_blank(v) {
                    self.blank
                } else {
                    self.stretch_value(v)
                };
            }
        }
        Ok(())
    }
}

/// Records the Q the mapping estimated, unless the caller set a finite one.
fn with_estimated_q(spec: StretchSpec, asinh: &AsinhMapping) -> StretchSpec {
    match spec.asinh_q() {
        Some(q) if q.is_finite() => spec,
        _ => spec.with_asinh_q(Some(asinh.q())),
    }
}

fn table_mapping(table: Table) -> Mapping {
    let descending = table[MAX_LEVEL as usize] < table[0];
    Mapping::Table {
        table: Box::new(table),
        descending,
    }
}

// ============================================================================
// One-shot operations
// ============================================================================

/// Stretches `region` of `band` into `out` and returns the resolved spec.
///
/// Nothing is written unless every check passes.
pub fn stretch(
    band: &Band,
    region: &Region,
    spec: &StretchSpec,
    blank: u8,
    out: &mut [u8],
) -> Result<StretchSpec> {
    region.validate(band.pixels.width(), band.pixels.height())?;
    check_output_len(region, out)?;
    let prepared = PreparedStretch::new(band, spec, blank)?;
    prepared.stretch_region(band.pixels, band.header, region, out)?;
    Ok(prepared.resolved_spec())
}

/// Display level of every histogram bin's lower edge, for colorbars.
///
/// Returns one entry per usable bin.
pub fn hist_colors(band: &Band, spec: &StretchSpec) -> Result<Vec<u8>> {
    let prepared = PreparedStretch::new(band, spec, BLANK_THREE_COLOR)?;
    Ok((0..HIST_SIZE)
        .map(|bin| {
            let v = band.histogram.dn_from_bin(bin) as f32;
            if v.is_nan() {
                BLANK_THREE_COLOR
            } else {
                prepared.stretch_value(v)
            }
        })
        .collect())
}
