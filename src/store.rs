//! Entry storage: the persistence contract and the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::entry::CacheEntry;
use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "store::memory";

/// Failure classes a storage backend may surface.
///
/// The in-memory backend is infallible; these exist for external key-value
/// backends substituted behind [`EntryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored payload could not be decoded: {0}")]
    Codec(String),
}

impl StoreError {
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Persistence contract for cache entries, polymorphic over the backing medium.
///
/// Any conforming backend may be substituted without changing engine behavior
/// beyond latency and persistence characteristics.
#[async_trait]
pub trait EntryStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Replace the entry for `key` with a value captured now.
    ///
    /// `stale_after`/`expire_after` become the entry's stale and expiry
    /// instants; an unset offset leaves the corresponding instant unset.
    async fn write(
        &self,
        key: &str,
        data: T,
        stale_after: Option<Duration>,
        expire_after: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Current entry for `key`, if any.
    ///
    /// Implementations may evict lazily here; the in-memory one does not.
    async fn read(&self, key: &str) -> Result<Option<CacheEntry<T>>, StoreError>;

    /// Delete the entry for `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Keys currently held, for the expiry sweep and introspection.
    ///
    /// Backends that cannot enumerate cheaply keep the default and stay
    /// opaque to both.
    async fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Unbounded in-memory store.
///
/// No capacity bound, no lazy eviction (expiry is driven externally by the
/// engine's sweep), no ordering guarantees between keys, no cross-instance
/// sharing.
pub struct MemoryStore<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> EntryStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn write(
        &self,
        key: &str,
        data: T,
        stale_after: Option<Duration>,
        expire_after: Option<Duration>,
    ) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "write").insert(
            key.to_string(),
            CacheEntry::new(data, stale_after, expire_after),
        );
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<CacheEntry<T>>, StoreError> {
        Ok(rw_read(&self.entries, SOURCE, "read").get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "remove").remove(key);
        Ok(())
    }

    async fn keys(&self) -> Vec<String> {
        rw_read(&self.entries, SOURCE, "keys")
            .keys()
            .cloned()
            .collect()
    }
}
