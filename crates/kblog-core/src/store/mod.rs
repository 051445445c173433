//! Ephemeral state store: key/value with per-key expiry and atomic increment.
//!
//! Revocation entries, permission caches, login counters, lockout flags and
//! rate counters all live behind [`EphemeralStore`]. Components hold an
//! `Arc<dyn EphemeralStore>` so the backend can be swapped, and wrap it in
//! [`TimedStore`] so no call can hang a request.

pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;

/// Errors raised by an ephemeral store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the configured bound.
    #[error("store call timed out")]
    Timeout,

    /// A value had an unexpected shape (e.g. `incr` on a non-integer).
    #[error("corrupt value at {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` with the given time-to-live, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically increments an integer value, creating it at 1 (without expiry) when absent.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Sets the TTL of an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;
}

/// Runs a store future under a deadline, mapping elapsed deadlines to [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// Decorator that bounds every call on the inner store.
pub struct TimedStore {
    inner: Arc<dyn EphemeralStore>,
    limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn EphemeralStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl EphemeralStore for TimedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        with_timeout(self.limit, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        with_timeout(self.limit, self.inner.set(key, value, ttl)).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        with_timeout(self.limit, self.inner.exists(key)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        with_timeout(self.limit, self.inner.delete(key)).await
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        with_timeout(self.limit, self.inner.incr(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        with_timeout(self.limit, self.inner.expire(key, ttl)).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        with_timeout(self.limit, self.inner.ttl(key)).await
    }
}

/// Store double whose every call fails, plus one whose writes fail while reads succeed.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct FailingStore;

    #[async_trait]
    impl EphemeralStore for FailingStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn exists(&self, _key: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn incr(&self, _key: &str) -> StoreResult<i64> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> StoreResult<bool> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn ttl(&self, _key: &str) -> StoreResult<KeyTtl> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    /// Reads pass through; `set` and `delete` fail.
    pub struct ReadOnlyStore(pub Arc<dyn EphemeralStore>);

    #[async_trait]
    impl EphemeralStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.0.get(key).await
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.0.exists(key).await
        }
        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        async fn incr(&self, key: &str) -> StoreResult<i64> {
            self.0.incr(key).await
        }
        async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
            self.0.expire(key, ttl).await
        }
        async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
            self.0.ttl(key).await
        }
    }
}
