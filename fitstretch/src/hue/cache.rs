//! Full-image intensity statistics shared by successive hue-preserving
//! stretches of one RGB image.

use parking_lot::RwLock;

use crate::error::Result;

/// Statistics of the derived intensity plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    /// Zscale range of the intensity.
    pub low: f64,
    pub high: f64,
    /// Extremes of the finite intensities.
    pub data_low: f64,
    pub data_high: f64,
}

/// Identifies the inputs the statistics were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    /// Per band: scaling K bits, lower bound kind code, lower value bits.
    pub bands: [(u64, i32, u64); 3],
    /// Zscale contrast, sample count and samples per line of the shared spec.
    pub zscale: (i32, i32, i32),
    pub dimensions: (usize, usize),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: CacheKey,
    stats: IntensityStats,
}

/// Last computed [`IntensityStats`], replaced as a whole when the key
/// changes. Empty until the first three-band stretch.
#[derive(Debug, Default)]
pub struct RgbIntensityCache {
    entry: RwLock<Option<Entry>>,
}

impl RgbIntensityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics from the most recent stretch, if any.
    pub fn stats(&self) -> Option<IntensityStats> {
        self.entry.read().map(|entry| entry.stats)
    }

    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }

    /// Cached statistics for `key`, running `compute` under the write lock on
    /// a miss. Concurrent callers with the same key compute once.
    pub(crate) fn get_or_compute(
        &self,
        key: &CacheKey,
        compute: impl FnOnce() -> Result<IntensityStats>,
    ) -> Result<IntensityStats> {
        if let Some(entry) = self.entry.read().filter(|entry| entry.key == *key) {
            return Ok(entry.stats);
        }

        let mut guard = self.entry.write();
        if let Some(entry) = guard.filter(|entry| entry.key == *key) {
            return Ok(entry.stats);
        }
        let stats = compute()?;
        tracing::debug!(
            low = stats.low,
            high = stats.high,
            data_low = stats.data_low,
            data_high = stats.data_high,
            "recomputed rgb intensity statistics"
        );
        *guard = Some(Entry { key: *key, stats });
        Ok(stats)
    }
}
