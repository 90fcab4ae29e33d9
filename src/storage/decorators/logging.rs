//! Structured logging decorator.

use crate::core::error::{StorageOperation, StorageResult};
use crate::storage::traits::{root_adapter, StorageAdapter};

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::Level;

// `tracing` macros need the level at compile time.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == Level::INFO {
            tracing::info!($($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

/// Operation-specific facts attached to a success entry.
#[derive(Debug, Default, Clone, Copy)]
struct Facts {
    value_len: Option<usize>,
    found: Option<bool>,
    exists: Option<bool>,
    ttl_secs: Option<u64>,
}

/// Logs every operation of the wrapped adapter through `tracing`.
///
/// Successful calls are logged at the success level (default `DEBUG`) with
/// the adapter name, key, duration and operation-specific facts. Failures
/// are logged at the error level (default `ERROR`) and the original error is
/// returned unchanged.
#[derive(Debug)]
pub struct LoggingStorageDecorator<A: StorageAdapter> {
    inner: A,
    success_level: Level,
    error_level: Level,
}

impl<A: StorageAdapter> LoggingStorageDecorator<A> {
    /// Wraps `inner` with default log levels.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            success_level: Level::DEBUG,
            error_level: Level::ERROR,
        }
    }

    /// Sets the level used for successful operations.
    pub fn with_success_level(mut self, level: Level) -> Self {
        self.success_level = level;
        self
    }

    /// Sets the level used for failed operations.
    pub fn with_error_level(mut self, level: Level) -> Self {
        self.error_level = level;
        self
    }

    /// Returns the wrapped adapter.
    pub fn inner_adapter(&self) -> &A {
        &self.inner
    }

    /// Returns the innermost adapter of the decorator chain.
    pub fn root(&self) -> &dyn StorageAdapter {
        root_adapter(&self.inner)
    }

    async fn observe<T, Fut>(
        &self,
        operation: StorageOperation,
        key: &str,
        call: Fut,
        facts: impl FnOnce(&T) -> Facts + Send,
    ) -> StorageResult<T>
    where
        Fut: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let result = call.await;
        let duration_ms = duration_ms(started.elapsed());

        match &result {
            Ok(value) => {
                let facts = facts(value);
                event_at!(
                    self.success_level,
                    adapter = %self.inner.name(),
                    operation = %operation,
                    key = %key,
                    duration_ms,
                    value_len = ?facts.value_len,
                    found = ?facts.found,
                    exists = ?facts.exists,
                    ttl_secs = ?facts.ttl_secs,
                    "Storage operation succeeded"
                );
            }
            Err(e) => {
                event_at!(
                    self.error_level,
                    adapter = %self.inner.name(),
                    operation = %operation,
                    key = %key,
                    duration_ms,
                    error = %e,
                    "Storage operation failed"
                );
            }
        }

        result
    }
}

fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[async_trait]
impl<A: StorageAdapter> StorageAdapter for LoggingStorageDecorator<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.observe(
            StorageOperation::Read,
            key,
            self.inner.read(key),
            |value: &Option<Vec<u8>>| Facts {
                value_len: value.as_ref().map(Vec::len),
                found: Some(value.is_some()),
                ..Facts::default()
            },
        )
        .await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let value_len = value.len();
        self.observe(
            StorageOperation::Write,
            key,
            self.inner.write(key, value, ttl),
            move |_: &()| Facts {
                value_len: Some(value_len),
                ttl_secs: ttl.map(|t| t.as_secs()),
                ..Facts::default()
            },
        )
        .await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.observe(
            StorageOperation::Exists,
            key,
            self.inner.exists(key),
            |exists: &bool| Facts {
                exists: Some(*exists),
                ..Facts::default()
            },
        )
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.observe(StorageOperation::Delete, key, self.inner.delete(key), |_: &()| {
            Facts::default()
        })
        .await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.observe(StorageOperation::Clear, "", self.inner.clear(), |_: &()| {
            Facts::default()
        })
        .await
    }

    fn inner(&self) -> Option<&dyn StorageAdapter> {
        Some(&self.inner)
    }
}
