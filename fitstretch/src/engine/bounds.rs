//! Resolution of a spec's lower/upper bound into data values.

use crate::error::{Error, Result};
use crate::range_values::{BoundKind, StretchSpec};
use crate::zscale::{zscale, ZscaleRange};

use super::Band;

/// Data range a stretch maps onto display levels 0..=254.
///
/// `low > high` is allowed and inverts the stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchBounds {
    pub low: f64,
    pub high: f64,
}

impl StretchBounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Width of the range, or 1.0 when both ends coincide.
    #[inline]
    pub fn sdiff(&self) -> f64 {
        if self.low == self.high {
            1.0
        } else {
            self.high - self.low
        }
    }
}

/// Both bounds of `spec` for `band`. Zscale runs at most once.
pub fn resolve_bounds(band: &Band, spec: &StretchSpec) -> Result<StretchBounds> {
    let range = if spec.uses_zscale() {
        Some(zscale_range(band, spec)?)
    } else {
        None
    };
    let low = resolve(band, spec.lower_kind(), spec.lower_value(), false, range);
    let high = resolve(band, spec.upper_kind(), spec.upper_value(), true, range);
    Ok(StretchBounds::new(low, high))
}

/// Lower bound of `spec` for `band`, in stored units.
pub fn lower_bound(band: &Band, spec: &StretchSpec) -> Result<f64> {
    let range = if spec.lower_kind() == BoundKind::Zscale {
        Some(zscale_range(band, spec)?)
    } else {
        None
    };
    Ok(resolve(band, spec.lower_kind(), spec.lower_value(), false, range))
}

fn resolve(
    band: &Band,
    kind: BoundKind,
    value: f64,
    round_up: bool,
    range: Option<ZscaleRange>,
) -> f64 {
    match kind {
        BoundKind::Absolute => band.header.to_raw(value),
        BoundKind::Percentage => band.histogram.percentile(value, round_up),
        BoundKind::Sigma => band.histogram.sigma(value, round_up),
        BoundKind::Zscale => match range {
            Some(range) if round_up => range.z2,
            Some(range) => range.z1,
            None => band.histogram.dn_min(),
        },
    }
}

fn zscale_range(band: &Band, spec: &StretchSpec) -> Result<ZscaleRange> {
    let (width, height) = band.pixels.dimensions();
    match zscale(
        band.pixels.pixels(),
        width,
        height,
        band.header.blank_value,
        &spec.zscale_params(),
    ) {
        Ok(range) => Ok(range),
        Err(Error::EmptySample) => {
            let range = ZscaleRange {
                z1: band.histogram.dn_min(),
                z2: band.histogram.dn_max(),
            };
            tracing::warn!(
                width,
                height,
                z1 = range.z1,
                z2 = range.z2,
                "zscale sample empty, falling back to data extremes"
            );
            Ok(range)
        }
        Err(err) => Err(err),
    }
}
