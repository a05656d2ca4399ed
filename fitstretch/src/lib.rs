//! Fitstretch - display stretching for astronomical images.
//!
//! Turns floating-point pixel samples into 8-bit display levels:
//! - Adaptive 4096-bin histograms with percentile and sigma queries
//! - IRAF zscale range estimation
//! - Linear, log, log-log, equalize, squared, sqrt, asinh and power-law gamma
//!   stretches with a bias/contrast remap
//! - Hue-preserving three-band color composition
//! - Parallel tiled stretching with half and quarter resolution outputs
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fitstretch::{stretch, HeaderFacts, ImageBand, PixelBuffer, StretchSpec, BLANK_SINGLE_BAND};
//!
//! let pixels = PixelBuffer::new(width, height, samples)?;
//! let image = ImageBand::new(pixels, HeaderFacts::default().with_blank(-32768.0));
//!
//! // Zscale bounds, asinh stretch
//! let spec: StretchSpec = "91,1.0,91,1.0,NaN,2.0,50,25,600,120,0,NaN,1.0".parse()?;
//! let region = image.pixels.full_region();
//! let mut out = vec![0u8; region.len()];
//! let resolved = stretch(&image.band(), &region, &spec, BLANK_SINGLE_BAND, &mut out)?;
//!
//! // The estimated asinh Q is carried by the resolved spec.
//! println!("{resolved}");
//! ```

pub mod config;
pub mod engine;
mod error;
pub mod histogram;
pub mod hue;
pub mod pixels;
pub mod range_values;
pub mod tiles;
pub mod zscale;

pub mod prelude;

// ============================================================================
// Errors
// ============================================================================

pub use error::{Error, Result};

// ============================================================================
// Pixel data
// ============================================================================

pub use pixels::{BitPix, HeaderFacts, PixelBuffer, RawSamples, Region};

// ============================================================================
// Statistics
// ============================================================================

pub use histogram::{Histogram, HIST_SIZE};
pub use zscale::{zscale, zscale_from_sample, ZscaleParams, ZscaleRange};

// ============================================================================
// Stretching
// ============================================================================

pub use engine::{
    hist_colors, lower_bound, resolve_bounds, stretch, stretch_mask, Band, ImageBand, ImageMask,
    PreparedStretch, StretchBounds, BLANK_SINGLE_BAND, BLANK_THREE_COLOR, MAX_MASKS,
};
pub use range_values::{Algorithm, BoundKind, StretchSpec};

// ============================================================================
// Color
// ============================================================================

pub use hue::{
    stretch_three_color, HuePreservingCompositor, IntensityStats, PreparedHue, PreparedThreeColor,
    RgbIntensityCache,
};

// ============================================================================
// Tiling and configuration
// ============================================================================

pub use config::EngineConfig;
pub use tiles::{
    decimate, interleave_rgb, stretch_image, stretch_mask_image, stretch_rgb_image, Decimation,
    StretchedImage, StretchedRgb, TileDef, TileLayout, TileOptions,
};
