//! In-memory pixel buffers, header facts and sub-rectangles.
//!
//! The engine never decodes image files. It receives samples that were already
//! materialized as `f32`, plus the few header keywords that affect display.

use std::ops::Range;

use crate::error::{Error, Result};


// ============================================================================
// Sample formats
// ============================================================================

/// FITS sample format (the BITPIX keyword).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitPix {
    /// 8-bit unsigned integer (BITPIX = 8)
    UInt8,
    /// 16-bit signed integer (BITPIX = 16)
    Int16,
    /// 32-bit signed integer (BITPIX = 32)
    Int32,
    /// 64-bit signed integer (BITPIX = 64)
    Int64,
    /// 32-bit floating point (BITPIX = -32)
    #[default]
    Float32,
    /// 64-bit floating point (BITPIX = -64)
    Float64,
}

impl BitPix {
    /// Convert from a FITS BITPIX integer value.
    pub fn from_fits_value(value: i32) -> Option<Self> {
        match value {
            8 => Some(BitPix::UInt8),
            16 => Some(BitPix::Int16),
            32 => Some(BitPix::Int32),
            64 => Some(BitPix::Int64),
            -32 => Some(BitPix::Float32),
            -64 => Some(BitPix::Float64),
            _ => None,
        }
    }

    /// Convert to a FITS BITPIX integer value.
    pub fn to_fits_value(self) -> i32 {
        match self {
            BitPix::UInt8 => 8,
            BitPix::Int16 => 16,
            BitPix::Int32 => 32,
            BitPix::Int64 => 64,
            BitPix::Float32 => -32,
            BitPix::Float64 => -64,
        }
    }

    pub fn is_integer(self) -> bool {
        self.to_fits_value() > 0
    }
}

/// Decoded samples in their stored numeric type.
///
/// Resolved exactly once into a [`PixelBuffer`]; every stretch path after that
/// works on `f32`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl RawSamples {
    pub fn bitpix(&self) -> BitPix {
        match self {
            RawSamples::UInt8(_) => BitPix::UInt8,
            RawSamples::Int16(_) => BitPix::Int16,
            RawSamples::Int32(_) => BitPix::Int32,
            RawSamples::Int64(_) => BitPix::Int64,
            RawSamples::Float32(_) => BitPix::Float32,
            RawSamples::Float64(_) => BitPix::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawSamples::UInt8(v) => v.len(),
            RawSamples::Int16(v) => v.len(),
            RawSamples::Int32(v) => v.len(),
            RawSamples::Int64(v) => v.len(),
            RawSamples::Float32(v) => v.len(),
            RawSamples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the samples as an `f32` buffer.
    ///
    /// Integer samples equal to `blank` (the BLANK keyword) become NaN. Float
    /// formats mark missing data with NaN already, so `blank` is ignored there.
    pub fn into_pixel_buffer(
        self,
        width: usize,
        height: usize,
        blank: Option<i64>,
    ) -> Result<PixelBuffer> {
        fn convert<T: Copy + Into<i64>>(values: Vec<T>, blank: Option<i64>) -> Vec<f32> {
            values
                .into_iter()
                .map(|v| {
                    let v: i64 = v.into();
                    if Some(v) == blank {
                        f32::NAN
                    } else {
                        v as f32
                    }
                })
                .collect()
        }

        let pixels = match self {
            RawSamples::UInt8(v) => convert(v, blank),
            RawSamples::Int16(v) => convert(v, blank),
            RawSamples::Int32(v) => convert(v, blank),
            RawSamples::Int64(v) => convert(v, blank),
            RawSamples::Float32(v) => v,
            RawSamples::Float64(v) => v.into_iter().map(|v| v as f32).collect(),
        };

        PixelBuffer::new(width, height, pixels)
    }
}

// ============================================================================
// Pixel buffer
// ============================================================================

/// Row-major `f32` samples. The first row is the first row stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyBuffer);
        }
        let expected = width * height;
        if pixels.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Result<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Returns a copy with the row order reversed, so file order (bottom row
    /// first) becomes screen order (top row first).
    pub fn flipped_vertical(&self) -> Self {
        let mut pixels = Vec::with_capacity(self.pixels.len());
        for row in self.pixels.chunks_exact(self.width).rev() {
            pixels.extend_from_slice(row);
        }
        Self {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    pub fn full_region(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }
}

// ============================================================================
// Header facts
// ============================================================================

/// The header keywords the stretch engine cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderFacts {
    /// Blank sentinel in DN. NaN when the header has none.
    pub blank_value: f64,
    pub bscale: f64,
    pub bzero: f64,
    /// DATAMIN hint. NaN when absent.
    pub data_min: f64,
    /// DATAMAX hint. NaN when absent.
    pub data_max: f64,
}

impl Default for HeaderFacts {
    fn default() -> Self {
        Self {
            blank_value: f64::NAN,
            bscale: 1.0,
            bzero: 0.0,
            data_min: f64::NAN,
            data_max: f64::NAN,
        }
    }
}

impl HeaderFacts {
    pub fn with_blank(mut self, blank_value: f64) -> Self {
        self.blank_value = blank_value;
        self
    }

    pub fn with_scaling(mut self, bscale: f64, bzero: f64) -> Self {
        self.bscale = bscale;
        self.bzero = bzero;
        self
    }

    pub fn with_data_range(mut self, data_min: f64, data_max: f64) -> Self {
        self.data_min = data_min;
        self.data_max = data_max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bscale.is_finite() || self.bscale == 0.0 {
            return Err(Error::invalid(
                "bscale",
                format!("must be finite and non-zero, got {}", self.bscale),
            ));
        }
        if !self.bzero.is_finite() {
            return Err(Error::invalid(
                "bzero",
                format!("must be finite, got {}", self.bzero),
            ));
        }
        Ok(())
    }

    /// True for NaN samples and samples equal to the blank sentinel.
    #[inline]
    pub fn is_blank(&self, value: f32) -> bool {
        value.is_nan() || value as f64 == self.blank_value
    }

    /// Physical value of a stored sample, NaN for blanks.
    #[inline]
    pub fn flux(&self, raw: f32) -> f64 {
        if self.is_blank(raw) {
            f64::NAN
        } else {
            raw as f64 * self.bscale + self.bzero
        }
    }

    /// Inverse of [`HeaderFacts::flux`]: stored value for a physical one.
    #[inline]
    pub fn to_raw(&self, physical: f64) -> f64 {
        (physical - self.bzero) / self.bscale
    }
}

// ============================================================================
// Regions
// ============================================================================

/// Sub-rectangle of a buffer, scanned row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole of `buffer`.
    pub fn full(buffer: &PixelBuffer) -> Self {
        buffer.full_region()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the region against a `width` x `height` buffer.
    pub fn validate(&self, width: usize, height: usize) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyRegion);
        }
        let fits_x = self.x.checked_add(self.width).is_some_and(|end| end <= width);
        let fits_y = self
            .y
            .checked_add(self.height)
            .is_some_and(|end| end <= height);
        if !fits_x || !fits_y {
            return Err(Error::RegionOutOfBounds {
                region: *self,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Index ranges of each region row inside a buffer `stride` samples wide.
    pub fn rows(&self, stride: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        (self.y..self.y + self.height).map(move |y| {
            let start = y * stride + self.x;
            start..start + self.width
        })
    }
}

/// Fails unless `out` holds exactly one byte per region sample.
pub(crate) fn check_output_len(region: &Region, out: &[u8]) -> Result<()> {
    if out.len() != region.len() {
        return Err(Error::OutputSizeMismatch {
            expected: region.len(),
            actual: out.len(),
        });
    }
    Ok(())
}
