//! Error type for the stretch engine.

use thiserror::Error;

use crate::pixels::Region;

/// Errors reported by stretch operations.
///
/// Every check runs before the first output byte is written, so a failed call
/// leaves the caller's raster untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Pixel buffer holds {actual} samples, expected {expected} (width x height)")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Pixel buffer must have non-zero width and height")]
    EmptyBuffer,

    #[error("Region {region:?} lies outside the {width}x{height} buffer")]
    RegionOutOfBounds {
        region: Region,
        width: usize,
        height: usize,
    },

    #[error("Region must have non-zero width and height")]
    EmptyRegion,

    #[error("Output raster holds {actual} bytes, region needs {expected}")]
    OutputSizeMismatch { expected: usize, actual: usize },

    #[error("Band {index} is {actual:?}, expected {expected:?} like the first band")]
    BandMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("At most 255 masks are supported, got {0}")]
    TooManyMasks(usize),

    #[error("Mask bit {0} does not fit in a 64-bit pixel code")]
    InvalidMaskBit(u32),

    #[error("Zscale sample is empty: no finite, non-blank pixels were drawn")]
    EmptySample,

    #[error("Cannot parse stretch settings from '{0}'")]
    InvalidSpecText(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
