//! Adaptive 4096-bin histogram with IRAF-style bound correction.
//!
//! The first pass bins against the data range (or the DATAMIN/DATAMAX hints).
//! If too many samples fall outside, or the populated part of the histogram is
//! narrower than half the bins, one corrective rebuild is done with better
//! bounds. Percentile, sigma and equalization queries all walk the final bins.

use rayon::prelude::*;

use crate::pixels::HeaderFacts;


/// Number of usable bins.
pub const HIST_SIZE: usize = 4096;
/// Half the bins. A trimmed spread narrower than this triggers a rebuild.
const HALF_HIST_SIZE: usize = 2048;
/// Usable bins plus the slot that receives samples exactly at the upper bound.
const BIN_COUNT: usize = HIST_SIZE + 1;

/// Fraction of all samples allowed to fall off either end before rebuilding.
const OUTLIER_FRACTION: f64 = 0.01;
/// Population trimmed from each tail when checking the spread.
const TAIL_TRIM_FRACTION: f64 = 0.0005;
/// A bin is "large" when it holds more than this fraction of the fullest bin.
const LARGE_BIN_FRACTION: f64 = 0.4;

/// Buffers at least this long are binned in parallel.
const PARALLEL_THRESHOLD: usize = 10_000;
const CHUNKS_PER_THREAD: usize = 2;

// ============================================================================
// Binning pass
// ============================================================================

/// Result of binning every sample once against fixed bounds.
#[derive(Debug, Clone)]
struct BinPass {
    bins: Vec<u32>,
    underflow: usize,
    overflow: usize,
    /// Extremes of every binnable sample, in range or not.
    min: f64,
    max: f64,
}

impl BinPass {
    fn empty() -> Self {
        Self {
            bins: vec![0; BIN_COUNT],
            underflow: 0,
            overflow: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    #[inline]
    fn add(&mut self, value: f32, hist_min: f64, bin_size: f64, blank: f64) {
        if !is_sample(value, blank) {
            return;
        }
        let value = value as f64;
        // Truncation toward zero, so values less than one bin below hist_min
        // still land in bin 0.
        let index = ((value - hist_min) / bin_size) as i64;
        if index < 0 {
            self.underflow += 1;
        } else if index > HIST_SIZE as i64 {
            self.overflow += 1;
        } else {
            self.bins[index as usize] += 1;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self
    }

    fn run(pixels: &[f32], hist_min: f64, bin_size: f64, blank: f64) -> Self {
        if pixels.len() < PARALLEL_THRESHOLD {
            let mut pass = Self::empty();
            for &v in pixels {
                pass.add(v, hist_min, bin_size, blank);
            }
            return pass;
        }

        let num_chunks = rayon::current_num_threads() * CHUNKS_PER_THREAD;
        let chunk_size = (pixels.len() / num_chunks).max(1);
        pixels
            .par_chunks(chunk_size)
            .fold(Self::empty, |mut pass, chunk| {
                for &v in chunk {
                    pass.add(v, hist_min, bin_size, blank);
                }
                pass
            })
            .reduce(Self::empty, Self::merge)
    }

    /// Sum of the usable bins. The upper-bound slot is not included.
    fn good_pixels(&self) -> u64 {
        self.bins[..HIST_SIZE].iter().map(|&c| c as u64).sum()
    }

    /// First bin from the bottom whose cumulative count exceeds `limit`.
    fn low_sum_index(&self, limit: u64) -> Option<usize> {
        let mut sum = 0u64;
        self.bins[..HIST_SIZE].iter().position(|&c| {
            sum += c as u64;
            sum > limit
        })
    }

    /// First bin from the top (upper-bound slot included) whose cumulative
    /// count exceeds `limit`.
    fn high_sum_index(&self, limit: u64) -> Option<usize> {
        let mut sum = 0u64;
        self.bins.iter().rposition(|&c| {
            sum += c as u64;
            sum > limit
        })
    }
}

/// Finite and not equal to the blank sentinel. A NaN `blank` matches nothing.
#[inline]
fn is_sample(value: f32, blank: f64) -> bool {
    value.is_finite() && value as f64 != blank
}

/// Extremes of the non-blank finite samples, or `None` when there are none.
fn finite_range(pixels: &[f32], blank: f64) -> Option<(f64, f64)> {
    let (min, max) = if pixels.len() < PARALLEL_THRESHOLD {
        pixels
            .iter()
            .filter(|&&v| is_sample(v, blank))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    } else {
        pixels
            .par_iter()
            .filter(|&&v| is_sample(v, blank))
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)),
            )
    };
    (min <= max).then_some((min as f64, max as f64))
}

fn bin_size_for(hist_min: f64, hist_max: f64) -> f64 {
    let size = (hist_max - hist_min) / HIST_SIZE as f64;
    if size == 0.0 || !size.is_finite() {
        1.0
    } else {
        size
    }
}

// ============================================================================
// Histogram
// ============================================================================

/// Immutable histogram of one pixel buffer.
#[derive(Debug, Clone)]
pub struct Histogram {
    bins: Vec<u32>,
    hist_min: f64,
    bin_size: f64,
    iraf_min: f64,
    iraf_max: f64,
    large_bin_percent: f64,
}

impl Histogram {
    /// Builds a histogram with the bounds taken from the data itself and no
    /// blank sentinel.
    pub fn from_pixels(pixels: &[f32]) -> Self {
        Self::new(pixels, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Builds a histogram of the header's samples: blanks are skipped and the
    /// DATAMIN/DATAMAX hints seed the first pass.
    pub fn from_header(pixels: &[f32], header: &HeaderFacts) -> Self {
        Self::new(pixels, header.data_min, header.data_max, header.blank_value)
    }

    /// Builds a histogram, starting from the `data_min`/`data_max` hints
    /// unless either is NaN.
    ///
    /// NaN, infinite and `blank` samples are never binned and never count
    /// toward the extremes. A buffer without any such sample produces an empty
    /// histogram whose extremes are both zero.
    pub fn new(pixels: &[f32], data_min: f64, data_max: f64, blank: f64) -> Self {
        let (mut hist_min, mut hist_max) = if data_min.is_nan() || data_max.is_nan() {
            finite_range(pixels, blank).unwrap_or((0.0, 0.0))
        } else {
            (data_min, data_max)
        };

        let outlier_limit = pixels.len() as f64 * OUTLIER_FRACTION;
        let mut doing_redo = false;

        let (pass, bin_size) = loop {
            let bin_size = bin_size_for(hist_min, hist_max);
            let pass = BinPass::run(pixels, hist_min, bin_size, blank);

            let mut redo = pass.underflow as f64 > outlier_limit
                || pass.overflow as f64 > outlier_limit;

            if !redo && !doing_redo {
                let limit = (pass.good_pixels() as f64 * TAIL_TRIM_FRACTION) as u64;
                let max_index = pass.high_sum_index(limit).map_or(0, |i| i + 1);
                let Some(min_index) = pass.low_sum_index(limit) else {
                    break (pass, bin_size);
                };
                if (max_index as i64 - min_index as i64) < HALF_HIST_SIZE as i64 {
                    tracing::debug!(
                        min_index,
                        max_index,
                        "Histogram spread is narrow, rebuilding with trimmed bounds"
                    );
                    hist_max = max_index as f64 * bin_size + hist_min;
                    hist_min = min_index as f64 * bin_size + hist_min;
                    redo = true;
                }
            } else if !doing_redo {
                tracing::debug!(
                    underflow = pass.underflow,
                    overflow = pass.overflow,
                    "Too many samples off the histogram, rebuilding from data range"
                );
                hist_min = pass.min;
                hist_max = pass.max;
            }

            if !doing_redo && redo {
                doing_redo = true;
            } else {
                break (pass, bin_size);
            }
        };

        let (iraf_min, iraf_max) = if pass.min <= pass.max {
            (pass.min, pass.max)
        } else {
            (hist_min, hist_min)
        };

        let mut histogram = Self {
            bins: pass.bins,
            hist_min,
            bin_size,
            iraf_min,
            iraf_max,
            large_bin_percent: 0.0,
        };
        histogram.large_bin_percent = histogram.compute_large_bin_percent();
        histogram
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// All 4097 bin counts.
    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    pub fn hist_min(&self) -> f64 {
        self.hist_min
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    /// Smallest finite sample seen by the final pass.
    pub fn dn_min(&self) -> f64 {
        self.iraf_min
    }

    /// Largest finite sample seen by the final pass.
    pub fn dn_max(&self) -> f64 {
        self.iraf_max
    }

    /// Fraction of bins holding more than 40% of the fullest bin's count.
    /// High values indicate quantized data where equalization looks poor.
    pub fn large_bin_percent(&self) -> f64 {
        self.large_bin_percent
    }

    fn good_pixels(&self) -> u64 {
        self.bins[..HIST_SIZE].iter().map(|&c| c as u64).sum()
    }

    fn compute_large_bin_percent(&self) -> f64 {
        let fullest = self.bins.iter().copied().max().unwrap_or(0);
        let marker = (fullest as f64 * LARGE_BIN_FRACTION) as u32;
        let count = self.bins.iter().filter(|&&c| c > marker).count();
        count as f64 / self.bins.len() as f64
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Value below which `p` percent of the binned samples lie.
    ///
    /// `0` and `100` return the exact data extremes. Otherwise the result is a
    /// bin edge: the lower one, or the upper one when `round_up` is set.
    pub fn percentile(&self, p: f64, round_up: bool) -> f64 {
        if p == 0.0 {
            return self.iraf_min;
        }
        if p == 100.0 {
            return self.iraf_max;
        }

        let goal = (self.good_pixels() as f64 * p / 100.0) as i64;
        let mut index = 0;
        let mut sum = self.bins[0] as i64;
        while sum < goal && index < HIST_SIZE {
            index += 1;
            sum += self.bins[index] as i64;
        }

        let edge = if round_up { index + 1 } else { index };
        edge as f64 * self.bin_size + self.hist_min
    }

    /// `k` standard deviations from the median, with the deviation estimated
    /// as half the 16th-84th percentile spread.
    pub fn sigma(&self, k: f64, round_up: bool) -> f64 {
        let lev16 = self.percentile(16.0, round_up);
        let lev50 = self.percentile(50.0, round_up);
        let lev84 = self.percentile(84.0, round_up);
        lev50 + k * (lev84 - lev16) / 2.0
    }

    /// 256 ascending thresholds splitting the binned samples into 255 groups
    /// of equal population. The last entry is `f64::MAX`.
    pub fn equalization_table(&self) -> [f64; 256] {
        let mut table = [0.0; 256];
        let goodpix_255 = self.good_pixels() as f64 / 255.0;

        let mut table_index = 0;
        table[table_index] = self.hist_min;
        table_index += 1;

        let mut next_goal = goodpix_255;
        let mut hist_index = 0;
        let mut accum = 0u64;
        while hist_index < HIST_SIZE && table_index < 255 {
            if accum as f64 >= next_goal {
                table[table_index] = self.dn_from_bin(hist_index);
                table_index += 1;
                next_goal += goodpix_255;
            } else {
                accum += self.bins[hist_index] as u64;
                hist_index += 1;
            }
        }
        let tail = self.dn_from_bin(hist_index);
        for entry in &mut table[table_index..255] {
            *entry = tail;
        }
        table[255] = f64::MAX;
        table
    }

    // ------------------------------------------------------------------------
    // Bin conversions
    // ------------------------------------------------------------------------

    /// Lower edge of `bin` in data units.
    #[inline]
    pub fn dn_from_bin(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_size + self.hist_min
    }

    /// Bin holding `dn`, clamped to the usable bins.
    pub fn bin_from_dn(&self, dn: f64) -> usize {
        let bin = ((dn - self.hist_min) / self.bin_size) as i64;
        bin.clamp(0, HIST_SIZE as i64 - 1) as usize
    }

    pub fn bin_from_percentile(&self, p: f64, round_up: bool) -> usize {
        self.bin_from_dn(self.percentile(p, round_up))
    }

    pub fn bin_from_sigma(&self, k: f64, round_up: bool) -> usize {
        self.bin_from_dn(self.sigma(k, round_up))
    }

    /// Physical value of every bin's lower edge.
    pub fn mean_bin_values(&self, bscale: f64, bzero: f64) -> Vec<f64> {
        (0..self.bins.len())
            .map(|bin| self.dn_from_bin(bin) * bscale + bzero)
            .collect()
    }
}
