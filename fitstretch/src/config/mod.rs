//! Engine configuration, usually loaded from a YAML file.
//!
//! ```yaml
//! tile_size: 512
//! decimation: half_full
//! flip_vertical: true
//! default_stretch: "91,1.0,91,1.0,NaN,2.0,45,25,600,120,0,NaN,1.0"
//! log_level: debug
//! ```
//!
//! Every field is optional. The stretch uses the same comma-separated text
//! form that [`StretchSpec`] serializes to.

#[cfg(test)]
mod tests;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::range_values::StretchSpec;
use crate::tiles::{Decimation, TileOptions, DEFAULT_TILE_SIZE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge length of stretch tiles in pixels.
    pub tile_size: usize,
    pub decimation: Decimation,
    pub flip_vertical: bool,
    /// Stretch used when a caller supplies none.
    pub default_stretch: StretchSpec,
    /// Base `tracing` filter level for the command line tool.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            decimation: Decimation::Full,
            flip_vertical: false,
            default_stretch: StretchSpec::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(text).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::Config("tile_size must be positive".to_string()));
        }
        self.default_stretch
            .validate()
            .map_err(|err| Error::Config(format!("default_stretch: {err}")))
    }

    /// `spec`, or the configured default when there is none.
    pub fn spec_or_default(&self, spec: Option<&StretchSpec>) -> StretchSpec {
        spec.copied().unwrap_or(self.default_stretch)
    }

    pub fn tile_options(&self) -> TileOptions {
        TileOptions {
            tile_size: self.tile_size,
            decimation: self.decimation,
            flip_vertical: self.flip_vertical,
        }
    }
}
