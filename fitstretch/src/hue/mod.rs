//! Three-band color stretching.
//!
//! The hue-preserving path stretches a shared intensity with asinh and scales
//! each band by its share of that intensity, so colors keep their ratios as
//! brightness changes. Without it, each band is stretched on its own.

mod cache;


pub use cache::{IntensityStats, RgbIntensityCache};

use rayon::prelude::*;

use crate::engine::{
    lower_bound, AsinhMapping, Band, PreparedStretch, StretchBounds, BLANK_THREE_COLOR,
};
use crate::error::{Error, Result};
use crate::pixels::{check_output_len, HeaderFacts, Region};
use crate::range_values::{BoundKind, StretchSpec};
use crate::zscale::zscale;

use cache::CacheKey;

/// Smallest asinh stretch width accepted.
const MIN_ASINH_STRETCH: f64 = 1e-10;
/// Channel ceiling after renormalization.
const MAX_CHANNEL: f64 = 254.0;

/// Band flux above its lower bound, NaN for blanks.
#[derive(Debug, Clone, Copy)]
struct BandExcess<'a> {
    pixels: &'a [f32],
    header: &'a HeaderFacts,
    k: f64,
    low: f64,
}

impl BandExcess<'_> {
    #[inline]
    fn at(&self, index: usize) -> f64 {
        self.header.flux(self.pixels[index]) * self.k - self.low
    }
}

/// Mean excess of the three bands clipped at zero, NaN when any band is
/// blank.
#[inline]
fn intensity(excess: [f64; 3]) -> f64 {
    if excess.iter().any(|f| f.is_nan()) {
        return f64::NAN;
    }
    ((excess[0] + excess[1] + excess[2]) / 3.0).max(0.0)
}

// ============================================================================
// Hue-preserving compositor
// ============================================================================

/// Stretches three bands so hue survives the stretch.
///
/// One compositor belongs to one RGB image: its cache assumes the band pixels
/// do not change between calls.
#[derive(Debug, Default)]
pub struct HuePreservingCompositor {
    cache: RgbIntensityCache,
}

impl HuePreservingCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &RgbIntensityCache {
        &self.cache
    }

    /// Writes `region` of each band into the matching output and returns the
    /// resolved specs, each carrying the shared Q and asinh stretch width.
    ///
    /// The first spec's zscale settings and asinh values drive the shared
    /// intensity stretch.
    pub fn stretch(
        &self,
        bands: [Band; 3],
        specs: [StretchSpec; 3],
        region: &Region,
        outs: [&mut [u8]; 3],
    ) -> Result<[StretchSpec; 3]> {
        let dimensions = check_bands(bands.iter().map(Some))?;
        check_region(region, dimensions, &outs)?;
        let prepared = self.prepare(bands, specs)?;
        prepared.stretch_region(region, outs)?;
        Ok(prepared.resolved_specs())
    }

    /// Resolves the band lower bounds and the shared intensity stretch once,
    /// so any number of regions can be written from the result.
    pub fn prepare<'a>(
        &self,
        bands: [Band<'a>; 3],
        specs: [StretchSpec; 3],
    ) -> Result<PreparedHue<'a>> {
        let dimensions = check_bands(bands.iter().map(Some))?;
        for (band, spec) in bands.iter().zip(&specs) {
            spec.validate()?;
            band.header.validate()?;
        }

        let mut excess = [BandExcess {
            pixels: bands[0].pixels.pixels(),
            header: bands[0].header,
            k: 1.0,
            low: 0.0,
        }; 3];
        for (c, (band, spec)) in bands.iter().zip(&specs).enumerate() {
            let raw_low = lower_bound(band, spec)?;
            let physical_low = raw_low * band.header.bscale + band.header.bzero;
            excess[c] = BandExcess {
                pixels: band.pixels.pixels(),
                header: band.header,
                k: spec.scaling_k(),
                low: physical_low * spec.scaling_k(),
            };
        }

        let shared = &specs[0];
        let key = cache_key(&specs, dimensions);
        let stats = self
            .cache
            .get_or_compute(&key, || intensity_stats(&excess, dimensions, shared))?;

        let use_zscale =
            shared.lower_kind() == BoundKind::Zscale || shared.asinh_stretch().is_none();
        let (slow, stretch) = match shared.asinh_stretch() {
            Some(stretch) if !use_zscale => {
                let available = stretch_available(&stats);
                let stretch = if stretch > available && available > 0.0 {
                    available
                } else {
                    stretch.max(MIN_ASINH_STRETCH)
                };
                (stats.data_low, stretch)
            }
            _ => (stats.low, stats.high - stats.low),
        };
        let asinh = AsinhMapping::new(
            StretchBounds::new(slow, slow + stretch),
            shared.asinh_q(),
            (stats.data_low, stats.data_high),
        );
        let brightness = PreparedStretch::intensity(shared, asinh);

        let q = brightness.resolved_spec().asinh_q();
        Ok(PreparedHue {
            excess,
            brightness,
            dimensions,
            resolved: specs.map(|spec| spec.with_asinh_q(q).with_asinh_stretch(Some(stretch))),
        })
    }
}

/// Hue-preserving stretch with bounds and intensity settled, shared by every
/// tile of one image.
#[derive(Debug, Clone)]
pub struct PreparedHue<'a> {
    excess: [BandExcess<'a>; 3],
    brightness: PreparedStretch,
    dimensions: (usize, usize),
    resolved: [StretchSpec; 3],
}

impl PreparedHue<'_> {
    pub fn resolved_specs(&self) -> [StretchSpec; 3] {
        self.resolved
    }

    /// Writes `region` of each band into the matching output.
    pub fn stretch_region(&self, region: &Region, outs: [&mut [u8]; 3]) -> Result<()> {
        check_region(region, self.dimensions, &outs)?;

        let [red, green, blue] = outs;
        let rows = region.rows(self.dimensions.0);
        let out_rows = red
            .chunks_exact_mut(region.width)
            .zip(green.chunks_exact_mut(region.width))
            .zip(blue.chunks_exact_mut(region.width));
        for (range, ((r, g), b)) in rows.zip(out_rows) {
            for (offset, index) in range.enumerate() {
                let rgb = compose_pixel(&self.excess, index, &self.brightness);
                r[offset] = rgb[0];
                g[offset] = rgb[1];
                b[offset] = rgb[2];
            }
        }
        Ok(())
    }
}

fn stretch_available(stats: &IntensityStats) -> f64 {
    stats.data_high - stats.data_low
}

fn compose_pixel(excess: &[BandExcess; 3], index: usize, brightness: &PreparedStretch) -> [u8; 3] {
    let f = excess.map(|band| band.at(index));
    let total = intensity(f);
    if total.is_nan() || total <= 0.0 {
        return [BLANK_THREE_COLOR; 3];
    }
    let level = brightness.stretch_f64(total) as f64;
    let mut channels = f.map(|f| if f >= 0.0 { level * f / total } else { 0.0 });
    let max = channels.iter().copied().fold(0.0, f64::max);
    if max > MAX_CHANNEL {
        let scale = MAX_CHANNEL / max;
        for channel in &mut channels {
            *channel *= scale;
        }
    }
    channels.map(|channel| channel as u8)
}

fn cache_key(specs: &[StretchSpec; 3], dimensions: (usize, usize)) -> CacheKey {
    CacheKey {
        bands: specs.map(|spec| {
            (
                spec.scaling_k().to_bits(),
                spec.lower_kind().code(),
                spec.lower_value().to_bits(),
            )
        }),
        zscale: (
            specs[0].zscale_contrast(),
            specs[0].zscale_samples(),
            specs[0].zscale_samples_per_line(),
        ),
        dimensions,
    }
}

/// Builds the full-image intensity plane and measures it.
fn intensity_stats(
    excess: &[BandExcess; 3],
    (width, height): (usize, usize),
    shared: &StretchSpec,
) -> Result<IntensityStats> {
    let plane: Vec<f32> = (0..width * height)
        .into_par_iter()
        .map(|index| intensity(excess.map(|band| band.at(index))) as f32)
        .collect();

    let (data_low, data_high) = plane
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |range: Option<(f64, f64)>, &v| {
            let v = v as f64;
            Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            })
        })
        .unwrap_or((0.0, 0.0));

    let (low, high) = match zscale(&plane, width, height, f64::NAN, &shared.zscale_params()) {
        Ok(range) => (range.z1, range.z2),
        Err(Error::EmptySample) => {
            tracing::warn!(
                width,
                height,
                "intensity zscale sample empty, falling back to data extremes"
            );
            (data_low, data_high)
        }
        Err(err) => return Err(err),
    };

    Ok(IntensityStats {
        low,
        high,
        data_low,
        data_high,
    })
}

/// Shared dimensions of the present bands, or `BandMismatch` naming the first
/// band that differs.
fn check_bands<'a>(bands: impl Iterator<Item = Option<&'a Band<'a>>>) -> Result<(usize, usize)> {
    let mut expected = None;
    for (index, band) in bands.enumerate() {
        let Some(band) = band else { continue };
        let actual = band.pixels.dimensions();
        match expected {
            None => expected = Some(actual),
            Some(expected) if expected != actual => {
                return Err(Error::BandMismatch {
                    index,
                    expected,
                    actual,
                });
            }
            Some(_) => {}
        }
    }
    expected.ok_or_else(|| Error::invalid("bands", "at least one band is required"))
}

fn check_region(region: &Region, (width, height): (usize, usize), outs: &[&mut [u8]; 3]) -> Result<()> {
    region.validate(width, height)?;
    for out in outs {
        check_output_len(region, out)?;
    }
    Ok(())
}

// ============================================================================
// Three-color dispatch
// ============================================================================

/// Three-band stretch with every band's bounds resolved, ready to write any
/// region of the image.
#[derive(Debug, Clone)]
pub enum PreparedThreeColor<'a> {
    Hue(PreparedHue<'a>),
    Independent {
        bands: [Option<Band<'a>>; 3],
        stretches: [Option<PreparedStretch>; 3],
        dimensions: (usize, usize),
    },
}

impl<'a> PreparedThreeColor<'a> {
    /// When the first present spec asks for hue preservation, all three bands
    /// are required and go through `compositor`. Otherwise each present band
    /// is prepared on its own with blank 0. A missing spec borrows the first
    /// present one.
    pub fn new(
        compositor: &HuePreservingCompositor,
        bands: [Option<Band<'a>>; 3],
        specs: [Option<StretchSpec>; 3],
    ) -> Result<Self> {
        let fallback = specs.iter().flatten().next().copied().unwrap_or_default();
        let specs = specs.map(|spec| spec.unwrap_or(fallback));

        if fallback.preserve_hue() {
            let [Some(red), Some(green), Some(blue)] = bands else {
                return Err(Error::invalid(
                    "bands",
                    "hue-preserving stretch needs all three bands",
                ));
            };
            return Ok(Self::Hue(compositor.prepare([red, green, blue], specs)?));
        }

        let dimensions = check_bands(bands.iter().map(Option::as_ref))?;
        let mut stretches = [None, None, None];
        for (c, band) in bands.iter().enumerate() {
            if let Some(band) = band {
                stretches[c] = Some(PreparedStretch::new(band, &specs[c], BLANK_THREE_COLOR)?);
            }
        }
        Ok(Self::Independent {
            bands,
            stretches,
            dimensions,
        })
    }

    /// Resolved spec of each present band.
    pub fn resolved_specs(&self) -> [Option<StretchSpec>; 3] {
        match self {
            Self::Hue(hue) => hue.resolved_specs().map(Some),
            Self::Independent { stretches, .. } => {
                std::array::from_fn(|c| stretches[c].as_ref().map(PreparedStretch::resolved_spec))
            }
        }
    }

    /// Writes `region` into planar outputs; absent bands are zero-filled.
    pub fn stretch_region(&self, region: &Region, outs: [&mut [u8]; 3]) -> Result<()> {
        let (bands, stretches, dimensions) = match self {
            Self::Hue(hue) => return hue.stretch_region(region, outs),
            Self::Independent {
                bands,
                stretches,
                dimensions,
            } => (bands, stretches, *dimensions),
        };
        check_region(region, dimensions, &outs)?;
        for (c, out) in outs.into_iter().enumerate() {
            match (&bands[c], &stretches[c]) {
                (Some(band), Some(stretch)) => {
                    stretch.stretch_region(band.pixels, band.header, region, out)?
                }
                _ => out.fill(0),
            }
        }
        Ok(())
    }
}

/// Stretches up to three bands into planar RGB outputs; see
/// [`PreparedThreeColor::new`]. Returns the resolved spec of each present
/// band.
pub fn stretch_three_color(
    compositor: &HuePreservingCompositor,
    bands: [Option<Band>; 3],
    specs: [Option<StretchSpec>; 3],
    region: &Region,
    outs: [&mut [u8]; 3],
) -> Result<[Option<StretchSpec>; 3]> {
    let dimensions = check_bands(bands.iter().map(Option::as_ref))?;
    check_region(region, dimensions, &outs)?;
    let prepared = PreparedThreeColor::new(compositor, bands, specs)?;
    prepared.stretch_region(region, outs)?;
    Ok(prepared.resolved_specs())
}
