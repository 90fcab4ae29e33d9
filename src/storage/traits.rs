//! Storage adapter trait definition.

use crate::core::error::StorageResult;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Raw key/value persistence with optional expiry.
///
/// Adapters know nothing about circuit semantics; the
/// [`CircuitStateRepository`](crate::CircuitStateRepository) decides which
/// keys and bytes they see.
///
/// # Contract
///
/// - A missing key is not an error: `read` returns `Ok(None)` and `exists`
///   returns `Ok(false)`.
/// - `write`, `delete` and `clear` may be called redundantly; deleting a
///   missing key succeeds.
/// - Decorators return their wrapped adapter from [`inner`](Self::inner);
///   [`root_adapter`] follows that chain to the innermost backend.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use durable_breaker::storage::StorageAdapter;
/// use durable_breaker::core::StorageResult;
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct RedisAdapter {
///     // connection pool, prefix, ...
/// }
///
/// #[async_trait]
/// impl StorageAdapter for RedisAdapter {
///     fn name(&self) -> &str {
///         "redis"
///     }
///
///     async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
///         todo!()
///     }
///
///     async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
///         todo!()
///     }
///
///     async fn delete(&self, key: &str) -> StorageResult<()> {
///         todo!()
///     }
///
///     async fn clear(&self) -> StorageResult<()> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait StorageAdapter: Send + Sync + Debug {
    /// Returns a stable, human-readable name for this adapter.
    fn name(&self) -> &str;

    /// Reads the value stored under `key`.
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// With a `ttl`, the value reads as absent once it has elapsed.
    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()>;

    /// Returns `true` if a live value is stored under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key).await?.is_some())
    }

    /// Removes the value stored under `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Removes every value managed by this adapter.
    async fn clear(&self) -> StorageResult<()>;

    /// Returns the wrapped adapter if this adapter is a decorator.
    fn inner(&self) -> Option<&dyn StorageAdapter> {
        None
    }
}

/// A shareable adapter handle.
pub type ArcStorageAdapter = Arc<dyn StorageAdapter>;

/// Follows [`StorageAdapter::inner`] down to the innermost adapter.
pub fn root_adapter(adapter: &dyn StorageAdapter) -> &dyn StorageAdapter {
    let mut current = adapter;
    while let Some(inner) = current.inner() {
        current = inner;
    }
    current
}

/// Returns the epoch second at which a value written at `now` with `ttl`
/// expires.
///
/// Partial seconds round up, so a sub-second TTL lives at least one second.
/// TTLs too large for an `i64` saturate.
pub(crate) fn expiry_deadline(now: i64, ttl: Duration) -> i64 {
    let secs = if ttl.subsec_nanos() > 0 {
        ttl.as_secs().saturating_add(1)
    } else {
        ttl.as_secs()
    };
    now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))
}

#[async_trait]
impl<T: StorageAdapter + ?Sized> StorageAdapter for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> StorageResult<()> {
        (**self).clear().await
    }

    fn inner(&self) -> Option<&dyn StorageAdapter> {
        (**self).inner()
    }
}

/// An adapter that accepts every write and stores nothing.
///
/// Useful when a breaker should run without persistence.
#[derive(Debug, Default)]
pub struct NullStorageAdapter;

impl NullStorageAdapter {
    /// Creates a new null adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageAdapter for NullStorageAdapter {
    fn name(&self) -> &str {
        "null"
    }

    async fn read(&self, _key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn write(&self, key: &str, _value: &[u8], _ttl: Option<Duration>) -> StorageResult<()> {
        tracing::trace!(key = %key, "Null storage adapter: value not actually stored");
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        Ok(())
    }
}
