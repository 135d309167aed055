//! Cache configuration.
//!
//! Controls the cache-aside layer via the `[cache]` table of `timetable.toml`.

use std::time::Duration;

use super::keys::VolatilityClass;

// Default values for cache configuration
const DEFAULT_CATALOG_TTL_SECS: u64 = 60 * 60 * 24 * 7 * 3;
const DEFAULT_SCHEDULE_TTL_SECS: u64 = 60 * 60 * 24 * 3;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup goes straight to the producer.
    pub enabled: bool,
    /// TTL for long-lived catalog entries.
    pub catalog_ttl: Duration,
    /// TTL for volatile schedule entries.
    pub schedule_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            schedule_ttl: Duration::from_secs(DEFAULT_SCHEDULE_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            catalog_ttl: settings.catalog_ttl,
            schedule_ttl: settings.schedule_ttl,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, class: VolatilityClass) -> Duration {
        match class {
            VolatilityClass::Catalog => self.catalog_ttl,
            VolatilityClass::Schedule => self.schedule_ttl,
        }
    }
}
