//! Asinh stretch with automatic softening parameter.

use super::bounds::StretchBounds;

const MIN_Q: f64 = 1e-10;
const MAX_Q: f64 = 1e10;
const SMALL_Q: f64 = 0.1;
/// Upper end of the automatic Q scan.
const Q_SCAN_LIMIT: f64 = 12.0;
const Q_SCAN_STEP: f64 = 0.1;

/// Asinh in its closed logarithmic form. Outputs must agree bit for bit with
/// historical renders, which `f64::asinh` does not promise.
#[inline]
pub(crate) fn asinh(x: f64) -> f64 {
    (x + (x * x + 1.0).sqrt()).ln()
}

/// Prepared asinh mapping from flux to a fractional display level.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AsinhMapping {
    min: f64,
    range: f64,
    q: f64,
    norm: f64,
}

impl AsinhMapping {
    /// `data_range` stands in for non-finite bounds; its upper end also
    /// drives the Q estimate when `q` is `None`.
    pub(crate) fn new(bounds: StretchBounds, q: Option<f64>, data_range: (f64, f64)) -> Self {
        let min = if bounds.low.is_finite() {
            bounds.low
        } else {
            data_range.0
        };
        let max = if bounds.high.is_finite() {
            bounds.high
        } else {
            data_range.1
        };
        let q = match q {
            Some(q) if q < MIN_Q => SMALL_Q,
            Some(q) if q > MAX_Q => MAX_Q,
            Some(q) if q.is_finite() => q,
            _ => default_q(min, max, data_range.1),
        };
        Self {
            min,
            range: max - min,
            q,
            norm: asinh(SMALL_Q * q),
        }
    }

    pub(crate) fn q(&self) -> f64 {
        self.q
    }

    /// Level in `[0, 254]`, not yet truncated.
    #[inline]
    pub(crate) fn level(&self, flux: f64) -> f64 {
        if flux <= self.min {
            return 0.0;
        }
        let level = 255.0 * SMALL_Q * asinh(self.q * (flux - self.min) / self.range) / self.norm;
        level.min(254.0)
    }
}

/// Q that makes the brightest pixel land near the top of the display range.
///
/// Scans `0.1, 0.2, ..` up to 12 and keeps the best match, rounded to one
/// decimal.
pub(crate) fn default_q(min: f64, max: f64, data_max: f64) -> f64 {
    let fact = (data_max - min) / (max - min);
    let mut best_q = SMALL_Q;
    let mut min_diff = f64::MAX;
    let mut q = SMALL_Q;
    while q <= Q_SCAN_LIMIT {
        let diff = (asinh(fact * q) - 10.0 * asinh(SMALL_Q * q)).abs();
        if diff < min_diff {
            min_diff = diff;
            best_q = q;
        }
        q += Q_SCAN_STEP;
    }
    (best_q * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asinh_matches_std() {
        for &x in &[0.0, 0.5, 1.0, 10.0, 1234.5] {
            assert!((asinh(x) - f64::asinh(x)).abs() < 1e-12, "x={}", x);
        }
    }

    #[test]
    fn test_q_clamping() {
        let bounds = StretchBounds::new(0.0, 100.0);
        assert_eq!(AsinhMapping::new(bounds, Some(1e-12), (0.0, 100.0)).q(), 0.1);
        assert_eq!(AsinhMapping::new(bounds, Some(1e12), (0.0, 100.0)).q(), 1e10);
        assert_eq!(AsinhMapping::new(bounds, Some(3.5), (0.0, 100.0)).q(), 3.5);
    }

    #[test]
    fn test_default_q_is_rounded_and_in_range() {
        let q = default_q(0.0, 100.0, 1000.0);
        assert!((0.1..=12.0).contains(&q));
        assert_eq!(q, (q * 10.0).round() / 10.0);
    }

    #[test]
    fn test_default_q_degenerate_range() {
        assert_eq!(default_q(5.0, 5.0, 5.0), 0.1);
    }

    #[test]
    fn test_level_monotone_and_bounded() {
        let mapping = AsinhMapping::new(StretchBounds::new(0.0, 100.0), Some(8.0), (0.0, 100.0));
        assert_eq!(mapping.level(-5.0), 0.0);
        assert_eq!(mapping.level(0.0), 0.0);
        let mut previous = 0.0;
        for i in 1..=200 {
            let level = mapping.level(i as f64);
            assert!(level >= previous);
            assert!(level <= 254.0);
            previous = level;
        }
        assert_eq!(mapping.level(1.0e9), 254.0);
    }

    #[test]
    fn test_non_finite_bounds_use_data_range() {
        let bounds = StretchBounds::new(f64::NAN, f64::INFINITY);
        let mapping = AsinhMapping::new(bounds, Some(1.0), (10.0, 20.0));
        assert_eq!(mapping.level(10.0), 0.0);
        assert!(mapping.level(15.0) > 0.0);
    }
}
