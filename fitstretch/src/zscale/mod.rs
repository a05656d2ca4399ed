//! IRAF zscale: a display range from a sigma-clipped line fit to a sorted
//! subsample of the image.
//!
//! The arithmetic mirrors the classic `cdl_zscale` routine closely (f32 data,
//! f64 sums, the same rounding points) so ranges match historical output.

use crate::error::{Error, Result};


/// Below this many surviving pixels the fit is abandoned.
const MIN_NPIXELS: usize = 5;
/// At most this fraction of the sample may be rejected.
const MAX_REJECT: f32 = 0.5;
/// Rejection threshold in sigmas.
const KREJ: f32 = 2.5;
const MAX_ITERATIONS: usize = 5;
/// Sigma reported when fewer than two pixels remain.
const INDEF: f32 = -999.0;

/// Sampling and contrast settings for one zscale run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZscaleParams {
    /// Divides the fitted slope. Values above 1 narrow the range.
    pub contrast: f64,
    /// Desired number of sampled pixels.
    pub sample_size: usize,
    /// Desired number of pixels sampled from each line.
    pub samples_per_line: usize,
}

impl Default for ZscaleParams {
    fn default() -> Self {
        Self {
            contrast: 0.25,
            sample_size: 600,
            samples_per_line: 120,
        }
    }
}

impl ZscaleParams {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(Error::invalid("zscale sample size", "must be positive"));
        }
        if self.samples_per_line == 0 {
            return Err(Error::invalid(
                "zscale samples per line",
                "must be positive",
            ));
        }
        if !self.contrast.is_finite() {
            return Err(Error::invalid(
                "zscale contrast",
                format!("must be finite, got {}", self.contrast),
            ));
        }
        Ok(())
    }
}

/// Display range chosen by zscale. Always `z1 <= z2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZscaleRange {
    pub z1: f64,
    pub z2: f64,
}

/// Runs zscale over a `width` x `height` row-major image.
///
/// Samples equal to `blank_value` and NaN samples are left out. Fails with
/// [`Error::EmptySample`] when nothing usable is drawn, which includes images
/// a single row tall.
pub fn zscale(
    pixels: &[f32],
    width: usize,
    height: usize,
    blank_value: f64,
    params: &ZscaleParams,
) -> Result<ZscaleRange> {
    params.validate()?;
    if pixels.len() != width * height {
        return Err(Error::DimensionMismatch {
            expected: width * height,
            actual: pixels.len(),
        });
    }

    let sample = sample_image(
        pixels,
        width,
        height,
        params.sample_size,
        params.samples_per_line,
        blank_value,
    );
    let range = zscale_from_sample(sample, params.contrast)?;
    tracing::debug!(z1 = range.z1, z2 = range.z2, width, height, "zscale range");
    Ok(range)
}

/// Zscale range of an already drawn sample. NaN entries are dropped.
pub fn zscale_from_sample(mut sample: Vec<f32>, contrast: f64) -> Result<ZscaleRange> {
    sample.sort_by(|a, b| {
        a.partial_cmp(b)
            .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
    });
    let npix = sample
        .iter()
        .position(|v| v.is_nan())
        .unwrap_or(sample.len());
    if npix == 0 {
        return Err(Error::EmptySample);
    }
    sample.truncate(npix);

    let zmin = sample[0];
    let zmax = sample[npix - 1];

    let center = ((npix + 1) / 2).max(1);
    let left = center - 1;
    let median = if npix % 2 == 1 || center >= npix {
        sample[left]
    } else {
        (sample[left] + sample[left + 1]) / 2.0
    };

    let minpix = min_good_pixels(npix);
    let ngrow = ((npix as f64 * 0.01).round() as usize).max(1);
    let fit = fit_line(&sample, KREJ, ngrow, MAX_ITERATIONS);

    if fit.ngoodpix < minpix {
        return Ok(ZscaleRange {
            z1: zmin as f64,
            z2: zmax as f64,
        });
    }

    let mut zslope = fit.zslope;
    if contrast > 0.0 {
        zslope = (zslope as f64 / contrast) as f32;
    }
    let z1 = zmin.max(median - (center - 1) as f32 * zslope);
    let z2 = zmax.min(median + (npix - center) as f32 * zslope);
    Ok(ZscaleRange {
        z1: z1 as f64,
        z2: z2 as f64,
    })
}

fn min_good_pixels(npix: usize) -> usize {
    MIN_NPIXELS.max((npix as f32 * MAX_REJECT) as usize)
}

// ============================================================================
// Sampling
// ============================================================================

/// Draws an evenly spaced grid of pixels, never denser than every other pixel
/// in either direction. Blank samples come back as NaN.
pub(crate) fn sample_image(
    pixels: &[f32],
    nx: usize,
    ny: usize,
    optimal_size: usize,
    len_stdline: usize,
    blank_value: f64,
) -> Vec<f32> {
    let opt_npix_per_line = nx.min(len_stdline).max(1);
    let col_step = nx.div_ceil(opt_npix_per_line).max(2);
    let npix_per_line = nx.div_ceil(col_step).max(1);

    let min_nlines = (optimal_size / len_stdline).max(1);
    let opt_nlines = min_nlines.max(ny.min(optimal_size.div_ceil(npix_per_line)));
    let line_step = (ny / opt_nlines).max(2);
    let max_nlines = ny.div_ceil(line_step);
    let max_pix = npix_per_line * max_nlines;

    let mut sample = Vec::with_capacity(max_pix);
    // Lines are counted from one; the row used is `line - 1`.
    let mut line = line_step.div_ceil(2);
    while line < ny {
        let row_start = (line - 1) * nx;
        let row = &pixels[row_start..row_start + nx];
        sample.extend(row.iter().step_by(col_step).take(npix_per_line).map(|&v| {
            if v as f64 == blank_value {
                f32::NAN
            } else {
                v
            }
        }));
        if sample.len() > max_pix {
            break;
        }
        line += line_step;
    }
    sample
}

// ============================================================================
// Line fit
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelState {
    Good,
    /// Rejected and removed from the sums.
    Bad,
    /// Marked by a neighbour's rejection; still in the sums until its own
    /// residual is tested.
    Rejected,
}

#[derive(Debug, Clone, Copy, Default)]
struct FitSums {
    xsqr: f64,
    xz: f64,
    x: f64,
    z: f64,
}

impl FitSums {
    fn remove(&mut self, x: f32, z: f32) {
        let (x, z) = (x as f64, z as f64);
        self.xsqr -= x * x;
        self.xz -= z * x;
        self.x -= x;
        self.z -= z;
    }
}

/// Straight line through sorted samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LineFit {
    pub ngoodpix: usize,
    /// Value at the first sample.
    pub zstart: f32,
    /// Change per sample index.
    pub zslope: f32,
}

/// Iteratively fits a line to `data`, rejecting pixels more than `krej`
/// sigma off the line along with `ngrow` neighbours.
pub(crate) fn fit_line(data: &[f32], krej: f32, ngrow: usize, max_iterations: usize) -> LineFit {
    let npix = data.len();
    match npix {
        0 => {
            return LineFit {
                ngoodpix: 1,
                zstart: 0.0,
                zslope: 0.0,
            }
        }
        1 => {
            return LineFit {
                ngoodpix: 1,
                zstart: data[0],
                zslope: 0.0,
            }
        }
        _ => {}
    }

    // Pixel indices normalized to [-1, 1].
    let xscale = 2.0 / (npix - 1) as f64;
    let normx: Vec<f32> = (0..npix)
        .map(|i| (i as f64 * xscale - 1.0) as f32)
        .collect();

    let mut sums = FitSums::default();
    for (&x, &z) in normx.iter().zip(data) {
        let (x, z) = (x as f64, z as f64);
        sums.xsqr += x * x;
        sums.xz += z * x;
        sums.z += z;
    }

    let mut z0 = sums.z / npix as f64;
    let mut dz = sums.xz / sums.xsqr;
    let initial_dz = dz;

    let mut states = vec![PixelState::Good; npix];
    let mut flat = vec![0.0f32; npix];
    let mut ngoodpix = npix;
    let minpix = min_good_pixels(npix);

    for _ in 0..max_iterations {
        let last_ngoodpix = ngoodpix;

        for ((f, &z), &x) in flat.iter_mut().zip(data).zip(&normx) {
            *f = (z as f64 - (x as f64 * dz + z0)) as f32;
        }

        let sigma = good_pixel_sigma(&flat, &states);
        let threshold = sigma as f64 * krej as f64;
        ngoodpix = reject_pixels(data, &flat, &normx, &mut states, &mut sums, threshold, ngrow);

        if ngoodpix > 0 {
            let rowrat = sums.x / sums.xsqr;
            z0 = (sums.z - rowrat * sums.xz) / (ngoodpix as f64 - rowrat * sums.x);
            dz = (sums.xz - z0 * sums.x) / sums.xsqr;
        }

        if ngoodpix >= last_ngoodpix || ngoodpix < minpix {
            break;
        }
    }

    let zstart = (z0 - dz) as f32;
    let mut zslope = (dz * xscale) as f32;
    if (zslope.abs() as f64) < 0.001 {
        zslope = (initial_dz * xscale) as f32;
    }

    LineFit {
        ngoodpix,
        zstart,
        zslope,
    }
}

/// Sample standard deviation of the residuals still marked good.
fn good_pixel_sigma(flat: &[f32], states: &[PixelState]) -> f32 {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    let mut sumsq = 0.0f64;
    for (&v, _) in flat
        .iter()
        .zip(states)
        .filter(|(_, state)| **state == PixelState::Good)
    {
        n += 1;
        sum += v as f64;
        sumsq += (v * v) as f64;
    }

    if n < 2 {
        return INDEF;
    }
    let n = n as f64;
    let variance = sumsq / (n - 1.0) - (sum * sum) / (n * (n - 1.0));
    if variance < 0.0 {
        0.0
    } else {
        variance.sqrt() as f32
    }
}

/// Marks pixels whose residual exceeds `threshold` and returns the number of
/// pixels still in the fit.
fn reject_pixels(
    data: &[f32],
    flat: &[f32],
    normx: &[f32],
    states: &mut [PixelState],
    sums: &mut FitSums,
    threshold: f64,
    ngrow: usize,
) -> usize {
    let npix = data.len();
    let mut ngoodpix = npix;
    let lcut = (-threshold) as f32;
    let hcut = threshold as f32;

    for i in 0..npix {
        if states[i] == PixelState::Bad {
            ngoodpix -= 1;
            continue;
        }
        let residual = flat[i];
        if !(residual < lcut || residual > hcut) {
            continue;
        }
        for j in i.saturating_sub(ngrow)..(i + ngrow).min(npix) {
            if states[j] == PixelState::Bad {
                continue;
            }
            if j <= i {
                sums.remove(normx[j], data[j]);
                states[j] = PixelState::Bad;
                ngoodpix -= 1;
            } else {
                states[j] = PixelState::Rejected;
            }
        }
    }
    ngoodpix
}
