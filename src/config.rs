//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::strategy::RefetchStrategy;

// Default values for cache configuration
const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_LOG_CAPACITY: usize = 256;

/// Tunables shared by the engine and the client.
///
/// Deserializable so it can sit inside an application's settings file; every
/// field has a default, so a partial (or empty) table is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remove entries past their expiry instant on access.
    ///
    /// The sweep runs eagerly at the start of `fetch`, `invalidate`, and
    /// `snapshot`; expiry is never enforced by a background timer.
    pub auto_expire: bool,
    /// Capacity of each per-key broadcast channel.
    ///
    /// Subscribers that fall further behind than this observe a lag error
    /// and skip ahead.
    pub channel_capacity: usize,
    /// Capacity of the inspection log ring buffer.
    pub log_capacity: usize,
    /// Strategy applied when a query names none.
    pub default_strategy: RefetchStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            auto_expire: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_capacity: DEFAULT_LOG_CAPACITY,
            default_strategy: RefetchStrategy::default(),
        }
    }
}

impl CacheConfig {
    /// Returns the channel capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn channel_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.channel_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the log capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn log_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.log_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
