//! Cache engine: the TTL/staleness state machine and per-key broadcast.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use metrics::counter;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::lock::{rw_read, rw_write};
use crate::result::{FetchError, QueryResult};
use crate::store::{EntryStore, MemoryStore, StoreError};

const SOURCE: &str = "engine";

const METRIC_HIT: &str = "freshet_cache_hit_total";
const METRIC_FETCH: &str = "freshet_cache_fetch_total";
const METRIC_STALE_FALLBACK: &str = "freshet_cache_stale_fallback_total";
const METRIC_SWEPT: &str = "freshet_cache_swept_total";

/// Key-addressed, time-aware cache with per-key broadcast notification.
///
/// Staleness is evaluated lazily at read time from two independent instants
/// rather than via a background timer, so correctness does not depend on any
/// scheduler firing; the trade-off is that a key with no readers never
/// refreshes on its own.
///
/// Concurrent `fetch` calls for one key are not coalesced: both may observe
/// a stale or absent entry and both invoke their operation, last writer wins.
pub struct CacheEngine<T> {
    config: CacheConfig,
    store: Arc<dyn EntryStore<T>>,
    channels: RwLock<HashMap<String, broadcast::Sender<QueryResult<T>>>>,
}

impl<T> CacheEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Engine backed by a fresh [`MemoryStore`].
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Engine over a caller-supplied backend.
    pub fn with_store(config: CacheConfig, store: Arc<dyn EntryStore<T>>) -> Self {
        Self {
            config,
            store,
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Serve `key` from cache or run `op`, per the staleness state machine.
    ///
    /// A present, non-stale entry is returned without invoking `op`. A stale
    /// or absent entry invokes `op`; on success the value is persisted with
    /// the given offsets, on failure the previous value (when one exists) is
    /// served flagged stale alongside the error. Failures never propagate
    /// past this boundary; they land in the result's `error` field. Every
    /// outcome is broadcast to the key's watchers.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        op: F,
        stale_after: Option<Duration>,
        expire_after: Option<Duration>,
    ) -> QueryResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if self.config.auto_expire {
            self.sweep_expired().await;
        }

        let previous = match self.store.read(key).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, error = %err, "store read failed");
                let result = QueryResult::failed(FetchError::new(err));
                self.broadcast(key, result.clone());
                return result;
            }
        };

        let now = Instant::now();
        let is_stale = previous.as_ref().is_some_and(|entry| entry.is_stale_at(now));

        if !is_stale {
            if let Some(entry) = &previous {
                debug!(key, outcome = "hit", "serving cached value");
                counter!(METRIC_HIT).increment(1);
                let result = QueryResult::fresh(entry.data.clone());
                self.broadcast(key, result.clone());
                return result;
            }
        }

        let outcome = if previous.is_some() { "refresh" } else { "miss" };
        debug!(key, outcome, "invoking fetch operation");
        counter!(METRIC_FETCH).increment(1);

        let result = match op().await {
            Ok(data) => {
                if let Err(err) = self
                    .store
                    .write(key, data.clone(), stale_after, expire_after)
                    .await
                {
                    warn!(key, error = %err, "store write failed; serving unpersisted value");
                }
                QueryResult::fresh(data)
            }
            Err(error) => match previous {
                Some(entry) => {
                    debug!(key, outcome = "stale_fallback", error = %error, "fetch failed, serving previous value");
                    counter!(METRIC_STALE_FALLBACK).increment(1);
                    QueryResult::stale_fallback(entry.data, error)
                }
                None => {
                    debug!(key, outcome = "error", error = %error, "fetch failed with nothing cached");
                    QueryResult::failed(error)
                }
            },
        };

        self.broadcast(key, result.clone());
        result
    }

    /// Remove the stored entry and notify watchers that the key is empty.
    ///
    /// Broadcasts `{data: None, is_stale: true}` whether or not an entry
    /// existed, which forces the next `fetch` to treat the key as absent.
    /// Idempotent.
    pub async fn invalidate(&self, key: &str) -> Result<(), StoreError> {
        if self.config.auto_expire {
            self.sweep_expired().await;
        }

        let removed = self.store.remove(key).await;
        debug!(key, outcome = "invalidated", "entry removed");
        self.broadcast(key, QueryResult::invalidated());
        removed
    }

    /// Subscribe to result broadcasts for `key`.
    ///
    /// The channel is created on first use and shared by every watcher of
    /// the key. There is no replay: a new subscriber only sees events
    /// emitted after it joins.
    pub fn watch(&self, key: &str) -> broadcast::Receiver<QueryResult<T>> {
        if let Some(tx) = rw_read(&self.channels, SOURCE, "watch").get(key) {
            return tx.subscribe();
        }

        let mut channels = rw_write(&self.channels, SOURCE, "watch");
        channels
            .entry(key.to_string())
            .or_insert_with(|| {
                broadcast::channel(self.config.channel_capacity_non_zero().get()).0
            })
            .subscribe()
    }

    /// Push a value to watchers without touching the store.
    ///
    /// Purpose-built for optimistic UI updates. Because the store is not
    /// written, a later `fetch` is unaffected; callers that need the value
    /// to survive a refetch decision must also write the store themselves.
    pub fn set_data(&self, key: &str, data: T, is_stale: bool) {
        debug!(key, outcome = "manual", "broadcasting caller-supplied value");
        self.broadcast(
            key,
            QueryResult {
                data: Some(data),
                error: None,
                is_stale,
            },
        );
    }

    /// Render every enumerable entry with its current staleness.
    ///
    /// Introspection snapshot for tooling. Only reflects keys the backend
    /// can enumerate; backends without `keys` support stay opaque.
    pub async fn snapshot(&self) -> HashMap<String, QueryResult<T>> {
        if self.config.auto_expire {
            self.sweep_expired().await;
        }

        let now = Instant::now();
        let mut states = HashMap::new();
        for key in self.store.keys().await {
            if let Ok(Some(entry)) = self.store.read(&key).await {
                let is_stale = entry.is_stale_at(now);
                states.insert(
                    key,
                    QueryResult {
                        data: Some(entry.data),
                        error: None,
                        is_stale,
                    },
                );
            }
        }
        states
    }

    /// Drop every per-key channel; watchers observe `Closed`.
    ///
    /// The store is left intact.
    pub fn close(&self) {
        rw_write(&self.channels, SOURCE, "close").clear();
    }

    /// Remove every enumerable entry whose expiry instant has passed.
    async fn sweep_expired(&self) {
        let now = Instant::now();
        let mut swept = 0u64;
        for key in self.store.keys().await {
            let expired = matches!(
                self.store.read(&key).await,
                Ok(Some(entry)) if entry.is_expired_at(now)
            );
            if expired {
                if let Err(err) = self.store.remove(&key).await {
                    warn!(key = %key, error = %err, "failed to remove expired entry");
                } else {
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            debug!(swept, "expired entries removed");
            counter!(METRIC_SWEPT).increment(swept);
        }
    }

    /// Send a result to the key's watchers, if any channel exists.
    fn broadcast(&self, key: &str, result: QueryResult<T>) {
        if let Some(tx) = rw_read(&self.channels, SOURCE, "broadcast").get(key) {
            // send only fails when nobody is subscribed, which is fine
            let _ = tx.send(result);
        }
    }
}
