//! Freshet: a key-addressed, time-aware cache with reactive change
//! notification.
//!
//! Freshet sits between an application's data-fetching calls and its
//! presentation layer. For a logical query identified by an opaque string
//! key it answers: do we have fresh data, stale data, or nothing, and
//! should we go fetch? Every answer is broadcast to all watchers of that
//! key, so multiple observers stay synchronized.
//!
//! - [`CacheEngine`] owns the entry store and implements the TTL/staleness
//!   decision, the stale-data fallback on fetch failure, auto-expiry, and
//!   the per-key result broadcast.
//! - [`QueryClient`] layers loading states, [`RefetchStrategy`] resolution,
//!   and background revalidation on top of one engine.
//! - [`EntryStore`] is the pluggable persistence seam; [`MemoryStore`] is
//!   the in-process default.
//!
//! ```
//! use std::time::Duration;
//!
//! use freshet::{CacheConfig, FetchError, QueryClient, QueryOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
//!
//! let result = client
//!     .query(
//!         "greeting",
//!         || async { Ok::<_, FetchError>("hello".to_string()) },
//!         QueryOptions {
//!             stale_after: Some(Duration::from_secs(1)),
//!             ..Default::default()
//!         },
//!     )
//!     .await;
//!
//! assert_eq!(result.data.as_deref(), Some("hello"));
//! assert!(!result.is_stale);
//! # }
//! ```

mod client;
mod config;
mod engine;
mod entry;
mod hooks;
mod lock;
mod log;
mod result;
mod store;
mod strategy;

pub use client::{QueryClient, QueryOptions};
pub use config::CacheConfig;
pub use engine::CacheEngine;
pub use entry::CacheEntry;
pub use hooks::{HookContext, HookOp, LoggingHook, QueryHook};
pub use log::{LogBuffer, LogLevel, LogRecord};
pub use result::{FetchError, QueryResult, QueryState};
pub use store::{EntryStore, MemoryStore, StoreError};
pub use strategy::RefetchStrategy;
