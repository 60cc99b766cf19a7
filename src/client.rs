//! Query client: strategy-aware orchestration over one cache engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::engine::CacheEngine;
use crate::hooks::{HookContext, HookOp, QueryHook};
use crate::lock::{rw_read, rw_write};
use crate::result::{FetchError, QueryResult, QueryState};
use crate::store::{EntryStore, StoreError};
use crate::strategy::RefetchStrategy;

const SOURCE: &str = "client";

/// Per-call knobs for [`QueryClient::query`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Offset after which the fetched value counts as stale.
    pub stale_after: Option<Duration>,
    /// Offset after which the fetched value must be evicted.
    pub expire_after: Option<Duration>,
    /// Strategy override; the client default applies when unset.
    pub strategy: Option<RefetchStrategy>,
}

struct StateChannel<T> {
    tx: broadcast::Sender<QueryState<T>>,
    forwarder: JoinHandle<()>,
}

/// Orchestration layer over one [`CacheEngine`].
///
/// Adds an explicit loading flag on top of the engine's result broadcasts,
/// resolves the refetch strategy, and schedules fire-and-forget background
/// revalidation for stale results. Requires a running Tokio runtime: state
/// forwarding and revalidation are spawned tasks.
pub struct QueryClient<T> {
    engine: Arc<CacheEngine<T>>,
    states: RwLock<HashMap<String, StateChannel<T>>>,
    default_strategy: RwLock<RefetchStrategy>,
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl<T> QueryClient<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Client over an engine backed by a fresh in-memory store.
    pub fn new(config: CacheConfig) -> Self {
        let default_strategy = config.default_strategy;
        Self {
            engine: Arc::new(CacheEngine::new(config)),
            states: RwLock::new(HashMap::new()),
            default_strategy: RwLock::new(default_strategy),
            hooks: Vec::new(),
        }
    }

    /// Client over an engine with a caller-supplied store backend.
    pub fn with_store(config: CacheConfig, store: Arc<dyn EntryStore<T>>) -> Self {
        let default_strategy = config.default_strategy;
        Self {
            engine: Arc::new(CacheEngine::with_store(config, store)),
            states: RwLock::new(HashMap::new()),
            default_strategy: RwLock::new(default_strategy),
            hooks: Vec::new(),
        }
    }

    /// Register an observer invoked around `query` and `invalidate`.
    ///
    /// Hooks run in registration order.
    pub fn add_hook(&mut self, hook: Arc<dyn QueryHook>) {
        self.hooks.push(hook);
    }

    /// The owned engine, for direct `watch`/`set_data`/`snapshot` access.
    pub fn engine(&self) -> &Arc<CacheEngine<T>> {
        &self.engine
    }

    /// Resolve `key` through the cache, reporting progress on its state channel.
    ///
    /// Watchers first see a transient loading snapshot, then the settled
    /// outcome. The result is also returned directly, independent of the
    /// state broadcasts. If the outcome is a stale fallback and the effective
    /// strategy revalidates in the background, the same operation is re-run
    /// fire-and-forget; its outcome reaches observers purely through the
    /// broadcast path.
    pub async fn query<F, Fut>(&self, key: &str, op: F, options: QueryOptions) -> QueryResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send,
    {
        let strategy = options
            .strategy
            .unwrap_or_else(|| *rw_read(&self.default_strategy, SOURCE, "query"));

        let ctx = HookContext {
            key,
            op: HookOp::Query,
        };
        for hook in &self.hooks {
            hook.before(&ctx);
        }

        self.broadcast_state(key, QueryState::loading(key));

        let result = self
            .engine
            .fetch(key, &op, options.stale_after, options.expire_after)
            .await;

        self.broadcast_state(key, QueryState::settled(key, result.clone()));
        for hook in &self.hooks {
            hook.after(&ctx, result.error.as_ref());
        }

        if result.is_stale && strategy.revalidates_in_background() {
            debug!(key, strategy = ?strategy, "scheduling background revalidation");
            let engine = Arc::clone(&self.engine);
            let key = key.to_string();
            let stale_after = options.stale_after;
            let expire_after = options.expire_after;
            tokio::spawn(async move {
                // failure was already surfaced once through the foreground
                // result; the retry reports only via the broadcast path
                let _ = engine.fetch(&key, op, stale_after, expire_after).await;
            });
        }

        result
    }

    /// Remove the stored entry for `key` and notify watchers.
    pub async fn invalidate(&self, key: &str) -> Result<(), StoreError> {
        let ctx = HookContext {
            key,
            op: HookOp::Invalidate,
        };
        for hook in &self.hooks {
            hook.before(&ctx);
        }

        let removed = self.engine.invalidate(key).await;

        for hook in &self.hooks {
            hook.after(&ctx, None);
        }
        removed
    }

    /// Subscribe to state broadcasts for `key`.
    ///
    /// The channel is created once per key; on first use the client
    /// subscribes to the engine's result channel and republishes every
    /// result as a settled state. Later calls share the channel without
    /// re-subscribing.
    pub fn watch(&self, key: &str) -> broadcast::Receiver<QueryState<T>> {
        if let Some(channel) = rw_read(&self.states, SOURCE, "watch").get(key) {
            return channel.tx.subscribe();
        }

        let mut states = rw_write(&self.states, SOURCE, "watch");
        // another caller may have created the channel between the locks
        if let Some(channel) = states.get(key) {
            return channel.tx.subscribe();
        }

        let (tx, rx) =
            broadcast::channel(self.engine.config().channel_capacity_non_zero().get());
        let forwarder = self.spawn_forwarder(key, tx.clone());
        states.insert(key.to_string(), StateChannel { tx, forwarder });
        rx
    }

    /// Replace the strategy used when a query names none.
    pub fn set_default_strategy(&self, strategy: RefetchStrategy) {
        *rw_write(&self.default_strategy, SOURCE, "set_default_strategy") = strategy;
    }

    pub fn default_strategy(&self) -> RefetchStrategy {
        *rw_read(&self.default_strategy, SOURCE, "default_strategy")
    }

    /// Close every state channel, stop the forwarders, and close the engine.
    ///
    /// The engine's store is left intact.
    pub fn close(&self) {
        let mut states = rw_write(&self.states, SOURCE, "close");
        for (_, channel) in states.drain() {
            channel.forwarder.abort();
        }
        drop(states);
        self.engine.close();
    }

    fn spawn_forwarder(&self, key: &str, tx: broadcast::Sender<QueryState<T>>) -> JoinHandle<()> {
        let mut results = self.engine.watch(key);
        let key = key.to_string();
        tokio::spawn(async move {
            loop {
                match results.recv().await {
                    Ok(result) => {
                        let _ = tx.send(QueryState::settled(key.as_str(), result));
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(key = %key, missed, "state forwarder lagged behind result channel");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn broadcast_state(&self, key: &str, state: QueryState<T>) {
        if let Some(channel) = rw_read(&self.states, SOURCE, "broadcast_state").get(key) {
            let _ = channel.tx.send(state);
        }
    }
}
