//! Memory manager tunables.
//!
//! Defaults live in `DEFAULT_*` constants; `MemoryConfig::from_env` overlays
//! `MEMORY_*` environment variables, falling back to the default for any
//! variable that is missing or fails to parse.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_GC_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MONITORING_INTERVAL_MS: u64 = 10_000;
const DEFAULT_INACTIVITY_THRESHOLD_MS: u64 = 300_000;
const DEFAULT_LOW_MEMORY_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("gc interval must be non-zero when garbage collection is enabled")]
    ZeroGcInterval,
    #[error("monitoring interval must be non-zero when resource monitoring is enabled")]
    ZeroMonitoringInterval,
    #[error("inactivity threshold must be non-zero")]
    ZeroInactivityThreshold,
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MemoryConfig {
    /// Serve objects from per-canvas pools.
    pub enable_object_pooling: bool,
    /// Run the periodic inactivity sweep.
    pub enable_garbage_collection: bool,
    /// Period of the background sweep.
    pub gc_interval: Duration,
    /// Refresh the stats snapshot on a timer.
    pub enable_resource_monitoring: bool,
    /// Period of the stats refresh.
    pub monitoring_interval: Duration,
    /// Idle time after which a tracked object is stale.
    pub inactivity_threshold: Duration,
    /// Non-forced sweeps are skipped while the probe reports less than this.
    pub low_memory_threshold_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enable_object_pooling: true,
            enable_garbage_collection: true,
            gc_interval: Duration::from_millis(DEFAULT_GC_INTERVAL_MS),
            enable_resource_monitoring: true,
            monitoring_interval: Duration::from_millis(DEFAULT_MONITORING_INTERVAL_MS),
            inactivity_threshold: Duration::from_millis(DEFAULT_INACTIVITY_THRESHOLD_MS),
            low_memory_threshold_bytes: DEFAULT_LOW_MEMORY_THRESHOLD_BYTES,
        }
    }
}

impl MemoryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enable_object_pooling: env_parse("MEMORY_ENABLE_OBJECT_POOLING", true),
            enable_garbage_collection: env_parse("MEMORY_ENABLE_GC", true),
            gc_interval: Duration::from_millis(env_parse("MEMORY_GC_INTERVAL_MS", DEFAULT_GC_INTERVAL_MS)),
            enable_resource_monitoring: env_parse("MEMORY_ENABLE_MONITORING", true),
            monitoring_interval: Duration::from_millis(env_parse(
                "MEMORY_MONITORING_INTERVAL_MS",
                DEFAULT_MONITORING_INTERVAL_MS,
            )),
            inactivity_threshold: Duration::from_millis(env_parse(
                "MEMORY_INACTIVITY_THRESHOLD_MS",
                DEFAULT_INACTIVITY_THRESHOLD_MS,
            )),
            low_memory_threshold_bytes: env_parse(
                "MEMORY_LOW_MEMORY_THRESHOLD_BYTES",
                DEFAULT_LOW_MEMORY_THRESHOLD_BYTES,
            ),
        }
    }

    /// Reject settings the timers cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first zero interval found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_garbage_collection && self.gc_interval.is_zero() {
            return Err(ConfigError::ZeroGcInterval);
        }
        if self.enable_resource_monitoring && self.monitoring_interval.is_zero() {
            return Err(ConfigError::ZeroMonitoringInterval);
        }
        if self.inactivity_threshold.is_zero() {
            return Err(ConfigError::ZeroInactivityThreshold);
        }
        Ok(())
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
