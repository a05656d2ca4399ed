//! Bit-mask planes rendered as indexed overlays.

use crate::error::{Error, Result};
use crate::pixels::{check_output_len, PixelBuffer, Region};

/// Largest mask list one indexed raster can carry.
pub const MAX_MASKS: usize = 255;

/// One overlay: pixels whose integer code has `bit` set are drawn in `color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageMask {
    bit: u32,
    color: [u8; 3],
}

impl ImageMask {
    pub fn new(bit: u32, color: [u8; 3]) -> Result<Self> {
        if bit >= u64::BITS {
            return Err(Error::InvalidMaskBit(bit));
        }
        Ok(Self { bit, color })
    }

    /// One mask per set bit of `bits`, lowest bit first, all in `color`.
    pub fn from_bits(bits: u64, color: [u8; 3]) -> Vec<Self> {
        (0..u64::BITS)
            .filter(|bit| (bits >> bit) & 1 == 1)
            .map(|bit| Self { bit, color })
            .collect()
    }

    pub fn bit(&self) -> u32 {
        self.bit
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    #[inline]
    pub fn is_set(&self, code: i64) -> bool {
        ((code as u64) >> self.bit) & 1 == 1
    }
}

/// Maps mask codes in `region` to indexes into `masks`.
///
/// Each output byte is the index of the first mask whose bit is set in the
/// truncated sample, `masks.len()` when none is, and `blank` for NaN. Returns
/// the number of pixels written at each index `0..=masks.len()`.
pub fn stretch_mask(
    pixels: &PixelBuffer,
    region: &Region,
    masks: &[ImageMask],
    blank: u8,
    out: &mut [u8],
) -> Result<Vec<u64>> {
    if masks.len() > MAX_MASKS {
        return Err(Error::TooManyMasks(masks.len()));
    }
    region.validate(pixels.width(), pixels.height())?;
    check_output_len(region, out)?;

    let transparent = masks.len();
    let mut counts = vec![0u64; transparent + 1];
    let rows = region.rows(pixels.width());
    for (range, out_row) in rows.zip(out.chunks_exact_mut(region.width)) {
        for (&v, o) in pixels.pixels()[range].iter().zip(out_row) {
            if v.is_nan() {
                *o = blank;
                continue;
            }
            let code = v.trunc() as i64;
            let index = masks
                .iter()
                .position(|mask| mask.is_set(code))
                .unwrap_or(transparent);
            counts[index] += 1;
            *o = index as u8;
        }
    }
    Ok(counts)
}
