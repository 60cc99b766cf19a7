//! Result and state snapshots flowing through the notification channels.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Opaque, cloneable error produced by a user-supplied fetch operation.
///
/// Wraps the original error in an `Arc` so a single failure can fan out to
/// every subscriber of a broadcast channel.
#[derive(Debug, Clone)]
pub struct FetchError(Arc<dyn StdError + Send + Sync>);

impl FetchError {
    /// Wrap an arbitrary error value.
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Build an error from a bare message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(MessageError(message.into())))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl StdError for FetchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let inner: &(dyn StdError + 'static) = self.0.as_ref();
        Some(inner)
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

/// Outcome snapshot of one fetch decision for a key.
///
/// `data` and `error` are independently optional: a result can carry stale
/// data and an error at the same time, which is how a failed refresh keeps
/// the last known value visible.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    pub is_stale: bool,
}

impl<T> QueryResult<T> {
    /// A value served fresh, either straight from cache or just fetched.
    pub fn fresh(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            is_stale: false,
        }
    }

    /// The previous value served because a refresh failed.
    pub fn stale_fallback(data: T, error: FetchError) -> Self {
        Self {
            data: Some(data),
            error: Some(error),
            is_stale: true,
        }
    }

    /// A failure with nothing cached to fall back on.
    pub fn failed(error: FetchError) -> Self {
        Self {
            data: None,
            error: Some(error),
            is_stale: false,
        }
    }

    /// The key was explicitly emptied.
    pub fn invalidated() -> Self {
        Self {
            data: None,
            error: None,
            is_stale: true,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// One notification on a client state channel.
///
/// Superset of [`QueryResult`]: adds the key it belongs to and an explicit
/// in-flight flag. While `is_loading` is set the snapshot is transient and
/// `data`/`error` do not yet reflect the outcome of the running request.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub key: String,
    pub is_loading: bool,
    pub data: Option<T>,
    pub error: Option<FetchError>,
    pub is_stale: bool,
}

impl<T> QueryState<T> {
    /// Transient snapshot marking a request in flight for `key`.
    pub fn loading(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_loading: true,
            data: None,
            error: None,
            is_stale: false,
        }
    }

    /// Settled snapshot carrying the fields of a finished result.
    pub fn settled(key: impl Into<String>, result: QueryResult<T>) -> Self {
        Self {
            key: key.into(),
            is_loading: false,
            data: result.data,
            error: result.error,
            is_stale: result.is_stale,
        }
    }
}
