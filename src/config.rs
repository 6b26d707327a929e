//! Cache configuration.
//!
//! Fixed for the lifetime of a cache: set at construction, never
//! renegotiated. Every field has a default, so a JSON file only needs the
//! values it overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::entities::CacheError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Loads allowed in flight at once (also the loader thread count)
    pub max_concurrent_loads: usize,
    /// Entries kept before LRU eviction of ready ones
    pub max_cache_size: usize,
    /// Buffer ahead of the playhead considered "ready"
    pub min_buffer_seconds: f64,
    /// Quiet period before idle fill starts
    pub idle_delay_ms: u64,
    /// Gap between two background submissions during idle fill
    pub idle_spacing_ms: u64,
    pub preload_ahead: usize,
    pub preload_behind: usize,
    /// Readiness poll period
    pub buffer_check_interval_ms: u64,
    /// Upper bound on a readiness wait
    pub buffer_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: 6,
            max_cache_size: 20,
            min_buffer_seconds: 0.5,
            idle_delay_ms: 500,
            idle_spacing_ms: 500,
            preload_ahead: 4,
            preload_behind: 2,
            buffer_check_interval_ms: 30,
            buffer_timeout_ms: 1500,
        }
    }
}

impl CacheConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn idle_spacing(&self) -> Duration {
        Duration::from_millis(self.idle_spacing_ms)
    }

    pub fn buffer_check_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_check_interval_ms)
    }

    pub fn buffer_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_concurrent_loads == 0 {
            return Err(CacheError::InvalidConfig("max_concurrent_loads must be at least 1".into()));
        }
        if self.max_cache_size == 0 {
            return Err(CacheError::InvalidConfig("max_cache_size must be at least 1".into()));
        }
        if self.buffer_check_interval_ms == 0 {
            return Err(CacheError::InvalidConfig("buffer_check_interval_ms must be positive".into()));
        }
        if !self.min_buffer_seconds.is_finite() || self.min_buffer_seconds < 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "min_buffer_seconds must be a non-negative number, got {}",
                self.min_buffer_seconds
            )));
        }
        Ok(())
    }

    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: CacheConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_timeout(), Duration::from_millis(1500));
        assert_eq!(config.idle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "max_cache_size": 3, "preload_ahead": 1 }"#).unwrap();
        assert_eq!(config.max_cache_size, 3);
        assert_eq!(config.preload_ahead, 1);
        assert_eq!(config.max_concurrent_loads, 6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CacheConfig { max_concurrent_loads: 0, ..Default::default() };
        assert!(config.validate().is_err());

        config.max_concurrent_loads = 1;
        config.min_buffer_seconds = f64::NAN;
        assert!(config.validate().is_err());

        config.min_buffer_seconds = 0.0;
        config.buffer_check_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join(format!("reelcache-config-{}.json", std::process::id()));
        let config = CacheConfig { max_cache_size: 7, ..Default::default() };
        config.save(&path).unwrap();
        assert_eq!(CacheConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_file(&path);
    }
}
