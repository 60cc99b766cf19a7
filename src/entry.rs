//! Cache entry with freshness metadata.

use std::time::{Duration, Instant};

/// A cached value together with the instants that govern its freshness.
///
/// Staleness and expiry are independent: a stale value is still displayable
/// but due for a refresh, an expired value must be treated as absent.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The last successfully fetched or manually written value.
    pub data: T,
    /// When the value was captured.
    pub fetched_at: Instant,
    /// Instant after which the value is due for a refresh (`None` = never stale).
    pub stale_at: Option<Instant>,
    /// Instant after which the value must be evicted (`None` = never expires).
    pub expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    /// Create an entry captured now.
    ///
    /// `stale_after` and `expire_after` are offsets from the capture instant.
    /// The pair is expected to satisfy `stale_after <= expire_after` when both
    /// are given; a violating pair is stored as supplied.
    pub fn new(data: T, stale_after: Option<Duration>, expire_after: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            data,
            fetched_at: now,
            stale_at: stale_after.map(|offset| now + offset),
            expires_at: expire_after.map(|offset| now + offset),
        }
    }

    /// Whether the entry is due for a refresh at `now`.
    ///
    /// An entry whose `stale_at` equals `now` is already due, so a zero
    /// offset marks the value stale from the moment it is written.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        self.stale_at.is_some_and(|at| now >= at)
    }

    /// Whether the entry must be treated as absent at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Time since the value was captured.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}
