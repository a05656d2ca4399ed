//! Stretch settings for one band and their canonical text form.
//!
//! The text form is a comma-separated list of 13 fields that other tools
//! persist and exchange, so its field order and number formatting are fixed:
//!
//! ```text
//! lowerKind,lowerValue,upperKind,upperValue,asinhQ,gamma,algorithm,
//! zscaleContrast,zscaleSamples,zscaleSamplesPerLine,preserveHue,asinhStretch,scalingK
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};
use crate::zscale::ZscaleParams;

#[cfg(test)]
mod tests;

// ============================================================================
// Enums
// ============================================================================

/// How a stretch bound is derived from the data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum BoundKind {
    /// Percentile of the histogram.
    #[default]
    Percentage,
    /// Physical value, converted back to stored units with BSCALE/BZERO.
    Absolute,
    /// Multiple of the histogram sigma around the median.
    Sigma,
    /// IRAF zscale range. The numeric bound value is ignored.
    Zscale,
}

impl BoundKind {
    /// Code used in the text form.
    pub fn code(self) -> i32 {
        match self {
            BoundKind::Percentage => 88,
            BoundKind::Absolute => 90,
            BoundKind::Zscale => 91,
            BoundKind::Sigma => 92,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            88 => Some(BoundKind::Percentage),
            90 => Some(BoundKind::Absolute),
            91 => Some(BoundKind::Zscale),
            92 => Some(BoundKind::Sigma),
            _ => None,
        }
    }
}

/// Pixel mapping from `[low, high]` to display levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Linear,
    Log,
    LogLog,
    /// Histogram equalization.
    Equalize,
    Squared,
    Sqrt,
    Asinh,
    PowerLawGamma,
}

impl Algorithm {
    /// Code used in the text form.
    pub fn code(self) -> i32 {
        match self {
            Algorithm::Linear => 44,
            Algorithm::Log => 45,
            Algorithm::LogLog => 46,
            Algorithm::Equalize => 47,
            Algorithm::Squared => 48,
            Algorithm::Sqrt => 49,
            Algorithm::Asinh => 50,
            Algorithm::PowerLawGamma => 51,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            44 => Some(Algorithm::Linear),
            45 => Some(Algorithm::Log),
            46 => Some(Algorithm::LogLog),
            47 => Some(Algorithm::Equalize),
            48 => Some(Algorithm::Squared),
            49 => Some(Algorithm::Sqrt),
            50 => Some(Algorithm::Asinh),
            51 => Some(Algorithm::PowerLawGamma),
            _ => None,
        }
    }

    /// Algorithms that map through a 256-entry threshold table.
    pub fn uses_table(self) -> bool {
        matches!(
            self,
            Algorithm::Log
                | Algorithm::LogLog
                | Algorithm::Equalize
                | Algorithm::Squared
                | Algorithm::Sqrt
        )
    }
}

// ============================================================================
// StretchSpec
// ============================================================================

pub const DEFAULT_BIAS: f64 = 0.5;
pub const DEFAULT_CONTRAST: f64 = 1.0;

/// Field count of the current text form.
const FIELD_COUNT: usize = 13;
/// Older writers stopped after the zscale settings.
const LEGACY_FIELD_COUNT: usize = 10;
/// Current form plus bias and contrast.
const EXTENDED_FIELD_COUNT: usize = 15;

/// Immutable stretch settings for one band.
///
/// Setting `preserve_hue` forces [`Algorithm::Asinh`]; every constructor,
/// setter and the parser keep that true. `asinh_q` and `asinh_stretch` may be
/// unset, in which case a stretch call estimates them and hands back a
/// resolved copy with the values filled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StretchSpec {
    lower_kind: BoundKind,
    lower_value: f64,
    upper_kind: BoundKind,
    upper_value: f64,
    asinh_q: Option<f64>,
    gamma: f64,
    algorithm: Algorithm,
    zscale_contrast: i32,
    zscale_samples: i32,
    zscale_samples_per_line: i32,
    preserve_hue: bool,
    asinh_stretch: Option<f64>,
    scaling_k: f64,
    bias: f64,
    contrast: f64,
}

impl Default for StretchSpec {
    /// Linear stretch between the 1st and 99th percentiles.
    fn default() -> Self {
        Self {
            lower_kind: BoundKind::Percentage,
            lower_value: 1.0,
            upper_kind: BoundKind::Percentage,
            upper_value: 99.0,
            asinh_q: None,
            gamma: 2.0,
            algorithm: Algorithm::Linear,
            zscale_contrast: 25,
            zscale_samples: 600,
            zscale_samples_per_line: 120,
            preserve_hue: false,
            asinh_stretch: None,
            scaling_k: 1.0,
            bias: DEFAULT_BIAS,
            contrast: DEFAULT_CONTRAST,
        }
    }
}

impl StretchSpec {
    pub fn new(
        lower_kind: BoundKind,
        lower_value: f64,
        upper_kind: BoundKind,
        upper_value: f64,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            lower_kind,
            lower_value,
            upper_kind,
            upper_value,
            algorithm,
            ..Self::default()
        }
    }

    /// Zscale bounds with the given algorithm.
    pub fn zscale(algorithm: Algorithm) -> Self {
        Self::new(BoundKind::Zscale, 1.0, BoundKind::Zscale, 1.0, algorithm)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn lower_kind(&self) -> BoundKind {
        self.lower_kind
    }

    pub fn lower_value(&self) -> f64 {
        self.lower_value
    }

    pub fn upper_kind(&self) -> BoundKind {
        self.upper_kind
    }

    pub fn upper_value(&self) -> f64 {
        self.upper_value
    }

    pub fn asinh_q(&self) -> Option<f64> {
        self.asinh_q
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Zscale contrast in percent.
    pub fn zscale_contrast(&self) -> i32 {
        self.zscale_contrast
    }

    pub fn zscale_samples(&self) -> i32 {
        self.zscale_samples
    }

    pub fn zscale_samples_per_line(&self) -> i32 {
        self.zscale_samples_per_line
    }

    pub fn preserve_hue(&self) -> bool {
        self.preserve_hue
    }

    pub fn asinh_stretch(&self) -> Option<f64> {
        self.asinh_stretch
    }

    pub fn scaling_k(&self) -> f64 {
        self.scaling_k
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    /// Zscale estimator settings. The stored contrast is a percentage.
    pub fn zscale_params(&self) -> ZscaleParams {
        ZscaleParams {
            contrast: self.zscale_contrast as f64 / 100.0,
            sample_size: self.zscale_samples.max(0) as usize,
            samples_per_line: self.zscale_samples_per_line.max(0) as usize,
        }
    }

    pub fn uses_zscale(&self) -> bool {
        self.lower_kind == BoundKind::Zscale || self.upper_kind == BoundKind::Zscale
    }

    // ------------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------------

    pub fn with_lower(mut self, kind: BoundKind, value: f64) -> Self {
        self.lower_kind = kind;
        self.lower_value = value;
        self
    }

    pub fn with_upper(mut self, kind: BoundKind, value: f64) -> Self {
        self.upper_kind = kind;
        self.upper_value = value;
        self
    }

    /// Ignored while hue preservation is on.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = if self.preserve_hue {
            Algorithm::Asinh
        } else {
            algorithm
        };
        self
    }

    pub fn with_asinh_q(mut self, q: Option<f64>) -> Self {
        self.asinh_q = q;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// `contrast` is a percentage; `samples` and `samples_per_line` size the
    /// pixel sample.
    pub fn with_zscale(mut self, contrast: i32, samples: i32, samples_per_line: i32) -> Self {
        self.zscale_contrast = contrast;
        self.zscale_samples = samples;
        self.zscale_samples_per_line = samples_per_line;
        self
    }

    pub fn with_preserve_hue(mut self, preserve_hue: bool) -> Self {
        self.preserve_hue = preserve_hue;
        if preserve_hue {
            self.algorithm = Algorithm::Asinh;
        }
        self
    }

    pub fn with_asinh_stretch(mut self, stretch: Option<f64>) -> Self {
        self.asinh_stretch = stretch;
        self
    }

    pub fn with_scaling_k(mut self, k: f64) -> Self {
        self.scaling_k = k;
        self
    }

    pub fn with_bias_contrast(mut self, bias: f64, contrast: f64) -> Self {
        self.bias = bias;
        self.contrast = contrast;
        self
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Rejects values no stretch can proceed with. Unset asinh values are
    /// fine; they get estimated.
    pub fn validate(&self) -> Result<()> {
        if self.lower_kind != BoundKind::Zscale && !self.lower_value.is_finite() {
            return Err(Error::invalid(
                "lower value",
                format!("must be finite, got {}", self.lower_value),
            ));
        }
        if self.upper_kind != BoundKind::Zscale && !self.upper_value.is_finite() {
            return Err(Error::invalid(
                "upper value",
                format!("must be finite, got {}", self.upper_value),
            ));
        }
        if self.algorithm == Algorithm::PowerLawGamma
            && !(self.gamma.is_finite() && self.gamma > 0.0)
        {
            return Err(Error::invalid(
                "gamma",
                format!("must be finite and positive, got {}", self.gamma),
            ));
        }
        if let Some(q) = self.asinh_q {
            if !q.is_finite() {
                return Err(Error::invalid("asinh Q", format!("must be finite, got {}", q)));
            }
        }
        if let Some(stretch) = self.asinh_stretch {
            if stretch.is_infinite() {
                return Err(Error::invalid(
                    "asinh stretch",
                    format!("must be finite, got {}", stretch),
                ));
            }
        }
        if !self.scaling_k.is_finite() {
            return Err(Error::invalid(
                "scaling K",
                format!("must be finite, got {}", self.scaling_k),
            ));
        }
        if !self.bias.is_finite() || !self.contrast.is_finite() {
            return Err(Error::invalid(
                "bias/contrast",
                format!("must be finite, got {}/{}", self.bias, self.contrast),
            ));
        }
        if self.uses_zscale() || self.preserve_hue {
            self.zscale_params().validate()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Text form
    // ------------------------------------------------------------------------

    /// Canonical text form. Bias and contrast are appended only when they
    /// differ from their defaults, so the common form stays 13 fields.
    pub fn serialize(&self) -> String {
        let mut fields = vec![
            self.lower_kind.code().to_string(),
            format_double(self.lower_value),
            self.upper_kind.code().to_string(),
            format_double(self.upper_value),
            format_optional(self.asinh_q),
            format_double(self.gamma),
            self.algorithm.code().to_string(),
            self.zscale_contrast.to_string(),
            self.zscale_samples.to_string(),
            self.zscale_samples_per_line.to_string(),
            u8::from(self.preserve_hue).to_string(),
            format_optional(self.asinh_stretch),
            format_double(self.scaling_k),
        ];
        if self.bias != DEFAULT_BIAS || self.contrast != DEFAULT_CONTRAST {
            fields.push(format_double(self.bias));
            fields.push(format_double(self.contrast));
        }
        fields.join(",")
    }

    /// Parses the text form. Accepts the 10-field legacy form, the 13-field
    /// form and the 15-field form with bias and contrast.
    ///
    /// Returns `None` for anything unparseable rather than falling back to a
    /// default.
    pub fn parse(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        if !matches!(
            tokens.len(),
            LEGACY_FIELD_COUNT | FIELD_COUNT | EXTENDED_FIELD_COUNT
        ) {
            return None;
        }

        let mut spec = Self {
            lower_kind: BoundKind::from_code(tokens[0].parse().ok()?)?,
            lower_value: tokens[1].parse().ok()?,
            upper_kind: BoundKind::from_code(tokens[2].parse().ok()?)?,
            upper_value: tokens[3].parse().ok()?,
            asinh_q: parse_optional(tokens[4])?,
            gamma: tokens[5].parse().ok()?,
            algorithm: Algorithm::from_code(tokens[6].parse().ok()?)?,
            zscale_contrast: tokens[7].parse().ok()?,
            zscale_samples: tokens[8].parse().ok()?,
            zscale_samples_per_line: tokens[9].parse().ok()?,
            ..Self::default()
        };

        if tokens.len() >= FIELD_COUNT {
            let hue: i32 = tokens[10].parse().ok()?;
            spec.asinh_stretch = parse_optional(tokens[11])?;
            spec.scaling_k = tokens[12].parse().ok()?;
            spec = spec.with_preserve_hue(hue != 0);
        }
        if tokens.len() == EXTENDED_FIELD_COUNT {
            spec.bias = tokens[13].parse().ok()?;
            spec.contrast = tokens[14].parse().ok()?;
        }
        Some(spec)
    }
}

impl fmt::Display for StretchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for StretchSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidSpecText(s.to_string()))
    }
}

impl TryFrom<String> for StretchSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StretchSpec> for String {
    fn from(spec: StretchSpec) -> Self {
        spec.serialize()
    }
}

// ============================================================================
// Number formatting
// ============================================================================

/// Formats a double the way `java.lang.Double.toString` does: plain decimal
/// with at least one fractional digit in [1e-3, 1e7), otherwise computerized
/// scientific notation such as `1.0E-4`.
fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let magnitude = value.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let text = value.to_string();
        return if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        };
    }

    let text = format!("{:e}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            format!("{}E{}", mantissa, exponent)
        }
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => text,
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), format_double)
}

/// `NaN` means unset. Returns `None` when the token is not a number.
fn parse_optional(token: &str) -> Option<Option<f64>> {
    let value: f64 = token.parse().ok()?;
    Some((!value.is_nan()).then_some(value))
}
