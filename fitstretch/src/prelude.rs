//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use fitstretch::prelude::*;
//! ```

// Pixel data
pub use crate::{HeaderFacts, PixelBuffer, Region};

// Stretching - main API
pub use crate::{
    stretch, Algorithm, Band, BoundKind, ImageBand, PreparedStretch, StretchSpec,
    BLANK_SINGLE_BAND, BLANK_THREE_COLOR,
};

// Color and tiling
pub use crate::{
    stretch_image, stretch_rgb_image, stretch_three_color, EngineConfig, HuePreservingCompositor,
    TileOptions,
};

pub use crate::{Error, Result};
