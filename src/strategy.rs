//! Refetch strategies.
//!
//! A strategy is pure policy: three derived boolean facets describing whether
//! a fetch is forced, whether stale data may be shown, and whether a stale
//! result schedules background revalidation. Only the last facet is consulted
//! by [`QueryClient::query`](crate::QueryClient::query) itself; the other two
//! are advisory surface for consumers to branch on.

use serde::{Deserialize, Serialize};

/// Policy controlling how a query treats cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefetchStrategy {
    /// Always go to the network, never show cached data.
    AlwaysFetch,
    /// Show stale data immediately and refresh it in the background.
    StaleWhileRevalidate,
    /// Show stale data and leave it at that.
    StaleOnly,
    /// Fetch only when nothing is cached.
    FetchIfEmpty,
    /// Never fetch; serve whatever the cache holds.
    CacheOnly,
}

impl RefetchStrategy {
    /// Whether this strategy demands an immediate fetch regardless of cache state.
    pub fn forces_fetch(&self) -> bool {
        matches!(self, Self::AlwaysFetch)
    }

    /// Whether stale data may be displayed under this strategy.
    pub fn allows_stale(&self) -> bool {
        matches!(
            self,
            Self::StaleWhileRevalidate | Self::StaleOnly | Self::CacheOnly
        )
    }

    /// Whether a stale result schedules a fire-and-forget refresh.
    pub fn revalidates_in_background(&self) -> bool {
        matches!(self, Self::StaleWhileRevalidate)
    }
}

impl Default for RefetchStrategy {
    fn default() -> Self {
        Self::StaleWhileRevalidate
    }
}
