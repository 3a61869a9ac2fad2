//! Configuration for zonal statistics.

use serde::{Deserialize, Serialize};

/// Default pixel ceiling per reduction, matching the remote engine's
/// `maxPixels` default.
pub const DEFAULT_MAX_PIXELS: u64 = 1_000_000_000;

/// Configuration for the zonal statistics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonalConfig {
    /// Most pixels a single backend reduction may touch.
    pub max_pixels: u64,

    /// Split oversized ROI windows into tiles instead of failing.
    pub tile_oversized: bool,

    /// Number of tiles reduced concurrently.
    pub tile_concurrency: usize,
}

impl Default for ZonalConfig {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            tile_oversized: true,
            tile_concurrency: 4,
        }
    }
}

impl ZonalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override fields from `LANDCOVER_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LANDCOVER_MAX_PIXELS") {
            if let Ok(max) = val.parse() {
                self.max_pixels = max;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_TILE_OVERSIZED") {
            self.tile_oversized = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("LANDCOVER_TILE_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.tile_concurrency = n;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pixels == 0 {
            return Err("compute.max_pixels must be > 0".to_string());
        }

        if self.tile_concurrency == 0 {
            return Err("compute.tile_concurrency must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ZonalConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.tile_oversized);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let config = ZonalConfig {
            max_pixels: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
