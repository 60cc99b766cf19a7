//! Orchestration behavior of the query client: state broadcasts, strategy
//! resolution, background revalidation, hooks.

use std::future::{Ready, ready};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use freshet::{
    CacheConfig, FetchError, LogBuffer, LogLevel, LoggingHook, QueryClient, QueryOptions,
    RefetchStrategy,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;

fn counted(value: String, calls: Arc<AtomicUsize>) -> impl Fn() -> Ready<Result<String, FetchError>> {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        ready(Ok(value.clone()))
    }
}

fn failing(calls: Arc<AtomicUsize>) -> impl Fn() -> Ready<Result<String, FetchError>> {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        ready(Err(FetchError::msg("backend unreachable")))
    }
}

fn stale_zero() -> QueryOptions {
    QueryOptions {
        stale_after: Some(Duration::ZERO),
        ..Default::default()
    }
}

#[tokio::test]
async fn query_broadcasts_loading_then_settled() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut rx = client.watch("k");

    let result = client
        .query(
            "k",
            counted("hello".to_string(), calls.clone()),
            QueryOptions {
                stale_after: Some(Duration::from_secs(1)),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(result.data.as_deref(), Some("hello"));

    let first = rx.recv().await.unwrap();
    assert!(first.is_loading);
    assert!(first.data.is_none());
    assert!(first.error.is_none());
    assert_eq!(first.key, "k");

    // The settled outcome arrives both directly and via the engine-result
    // forwarder; order between the two is unobservable.
    for _ in 0..2 {
        let settled = rx.recv().await.unwrap();
        assert!(!settled.is_loading);
        assert_eq!(settled.data.as_deref(), Some("hello"));
        assert!(!settled.is_stale);
    }
}

#[tokio::test]
async fn query_returns_result_without_any_watcher() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let result = client
        .query("k", counted("hello".to_string(), calls.clone()), QueryOptions::default())
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.data.as_deref(), Some("hello"));
}

#[tokio::test]
async fn stale_fallback_triggers_background_revalidation() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let seed = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let _ = client.query("k", counted("A".to_string(), seed.clone()), stale_zero()).await;

    let result = client
        .query(
            "k",
            failing(failures.clone()),
            QueryOptions {
                stale_after: Some(Duration::ZERO),
                strategy: Some(RefetchStrategy::StaleWhileRevalidate),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.data.as_deref(), Some("A"));
    assert!(result.is_stale);
    assert!(result.error.is_some());

    // The background pass re-invokes the same operation; its failure is
    // swallowed.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(failures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_only_strategy_skips_background_revalidation() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let seed = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let _ = client.query("k", counted("A".to_string(), seed.clone()), stale_zero()).await;

    let result = client
        .query(
            "k",
            failing(failures.clone()),
            QueryOptions {
                stale_after: Some(Duration::ZERO),
                strategy: Some(RefetchStrategy::StaleOnly),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_stale);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_background_revalidation_reaches_watchers() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let seed = Arc::new(AtomicUsize::new(0));

    let _ = client.query("k", counted("A".to_string(), seed.clone()), stale_zero()).await;

    let mut rx = client.watch("k");

    // Fails on the first call, succeeds on the retry
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = {
        let attempts = Arc::clone(&attempts);
        move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            ready(if attempt == 0 {
                Err(FetchError::msg("transient outage"))
            } else {
                Ok("B".to_string())
            })
        }
    };

    let result = client
        .query(
            "k",
            flaky,
            QueryOptions {
                stale_after: Some(Duration::ZERO),
                strategy: Some(RefetchStrategy::StaleWhileRevalidate),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(result.data.as_deref(), Some("A"));
    assert!(result.is_stale);

    // loading, then the stale fallback twice (direct + forwarded), then the
    // background success through the broadcast path
    let first = rx.recv().await.unwrap();
    assert!(first.is_loading);
    for _ in 0..2 {
        let fallback = rx.recv().await.unwrap();
        assert_eq!(fallback.data.as_deref(), Some("A"));
        assert!(fallback.is_stale);
    }
    let revalidated = rx.recv().await.unwrap();
    assert_eq!(revalidated.data.as_deref(), Some("B"));
    assert!(!revalidated.is_stale);
    assert!(revalidated.error.is_none());
}

#[tokio::test]
async fn invalidate_forces_next_query_to_refetch() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));

    let _ = client
        .query(
            "k",
            counted("A".to_string(), a_calls.clone()),
            QueryOptions {
                stale_after: Some(Duration::from_secs(60)),
                ..Default::default()
            },
        )
        .await;

    client.invalidate("k").await.unwrap();

    let result = client
        .query("k", counted("B".to_string(), b_calls.clone()), QueryOptions::default())
        .await;

    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.data.as_deref(), Some("B"));
}

#[tokio::test]
async fn default_strategy_applies_when_query_names_none() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    client.set_default_strategy(RefetchStrategy::StaleOnly);

    let seed = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let _ = client.query("k", counted("A".to_string(), seed.clone()), stale_zero()).await;
    let _ = client.query("k", failing(failures.clone()), stale_zero()).await;

    sleep(Duration::from_millis(100)).await;
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logging_hook_records_query_and_invalidate() {
    let config = CacheConfig::default();
    let buffer = Arc::new(LogBuffer::new(config.log_capacity));
    let mut client: QueryClient<String> = QueryClient::new(config);
    client.add_hook(Arc::new(LoggingHook::new(buffer.clone())));

    let calls = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let _ = client
        .query("k", counted("v".to_string(), calls.clone()), QueryOptions::default())
        .await;
    client.invalidate("k").await.unwrap();
    let _ = client.query("k", failing(failures.clone()), QueryOptions::default()).await;

    let lines = buffer.snapshot();
    let messages: Vec<&str> = lines.iter().map(|line| line.message.as_str()).collect();

    assert!(messages.iter().any(|m| m.contains("query started")));
    assert!(messages.iter().any(|m| m.contains("settled")));
    assert!(messages.iter().any(|m| m.contains("invalidated")));
    assert!(
        lines
            .iter()
            .any(|line| line.level == LogLevel::Error && line.message.contains("failed"))
    );
}

#[tokio::test]
async fn manual_set_data_is_invisible_to_subsequent_queries() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let mut rx = client.watch("k");

    client.engine().set_data("k", "optimistic".to_string(), false);

    // Watchers see the pushed value through the forwarder
    let pushed = rx.recv().await.unwrap();
    assert_eq!(pushed.data.as_deref(), Some("optimistic"));
    assert!(!pushed.is_loading);

    // The store was never written, so the query still fetches
    let calls = Arc::new(AtomicUsize::new(0));
    let result = client
        .query("k", counted("fetched".to_string(), calls.clone()), QueryOptions::default())
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.data.as_deref(), Some("fetched"));
}

#[tokio::test]
async fn close_disconnects_state_watchers() {
    let client: QueryClient<String> = QueryClient::new(CacheConfig::default());
    let mut rx = client.watch("k");

    client.close();

    assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
}
