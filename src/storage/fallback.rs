//! Priority chain of storage adapters.

use crate::core::error::{AdapterFailure, StorageError, StorageOperation, StorageResult};
use crate::storage::traits::{ArcStorageAdapter, StorageAdapter};

use async_trait::async_trait;
use std::time::Duration;

/// Composes several adapters into a high-availability chain.
///
/// - **Reads** go to adapters in priority order; the first adapter that
///   answers without error wins, even when its answer is "not found".
/// - **Writes, deletes and clears** are broadcast to every adapter. The call
///   succeeds if at least one adapter succeeds.
/// - **Exists** is `true` if any adapter reports the key.
///
/// Only when every adapter fails is an
/// [`AllAdaptersFailed`](StorageError::AllAdaptersFailed) error raised.
/// Broadcasts are not transactional: a partial outage leaves the failing
/// adapters stale until the next successful write.
#[derive(Debug)]
pub struct FallbackStorageAdapter {
    name: String,
    adapters: Vec<ArcStorageAdapter>,
}

impl FallbackStorageAdapter {
    /// Creates a chain from adapters listed highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] if `adapters` is empty.
    pub fn new(adapters: impl IntoIterator<Item = ArcStorageAdapter>) -> StorageResult<Self> {
        let adapters: Vec<_> = adapters.into_iter().collect();
        if adapters.is_empty() {
            return Err(StorageError::configuration(
                "fallback storage requires at least one adapter",
            ));
        }

        let name = format!(
            "fallback({})",
            adapters
                .iter()
                .map(|a| a.name())
                .collect::<Vec<_>>()
                .join(",")
        );

        Ok(Self { name, adapters })
    }

    /// Returns the adapters in priority order.
    pub fn adapters(&self) -> &[ArcStorageAdapter] {
        &self.adapters
    }

    fn aggregate(operation: StorageOperation, failures: Vec<AdapterFailure>) -> StorageError {
        tracing::error!(
            operation = %operation,
            failed = failures.len(),
            "All storage adapters failed"
        );
        StorageError::AllAdaptersFailed {
            operation,
            failures,
        }
    }

    fn log_partial_failure(operation: StorageOperation, adapter: &str, error: &StorageError) {
        tracing::warn!(
            operation = %operation,
            adapter = %adapter,
            error = %error,
            "Storage adapter failed, continuing with remaining adapters"
        );
    }
}

#[async_trait]
impl StorageAdapter for FallbackStorageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            match adapter.read(key).await {
                Ok(value) => {
                    if !failures.is_empty() {
                        tracing::info!(
                            adapter = %adapter.name(),
                            skipped = failures.len(),
                            "Read served by lower-priority adapter"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    Self::log_partial_failure(StorageOperation::Read, adapter.name(), &error);
                    failures.push(AdapterFailure {
                        adapter: adapter.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(Self::aggregate(StorageOperation::Read, failures))
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            if let Err(error) = adapter.write(key, value, ttl).await {
                Self::log_partial_failure(StorageOperation::Write, adapter.name(), &error);
                failures.push(AdapterFailure {
                    adapter: adapter.name().to_string(),
                    error,
                });
            }
        }

        if failures.len() == self.adapters.len() {
            return Err(Self::aggregate(StorageOperation::Write, failures));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            match adapter.exists(key).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) => {
                    Self::log_partial_failure(StorageOperation::Exists, adapter.name(), &error);
                    failures.push(AdapterFailure {
                        adapter: adapter.name().to_string(),
                        error,
                    });
                }
            }
        }

        if failures.len() == self.adapters.len() {
            return Err(Self::aggregate(StorageOperation::Exists, failures));
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            if let Err(error) = adapter.delete(key).await {
                Self::log_partial_failure(StorageOperation::Delete, adapter.name(), &error);
                failures.push(AdapterFailure {
                    adapter: adapter.name().to_string(),
                    error,
                });
            }
        }

        if failures.len() == self.adapters.len() {
            return Err(Self::aggregate(StorageOperation::Delete, failures));
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            if let Err(error) = adapter.clear().await {
                Self::log_partial_failure(StorageOperation::Clear, adapter.name(), &error);
                failures.push(AdapterFailure {
                    adapter: adapter.name().to_string(),
                    error,
                });
            }
        }

        if failures.len() == self.adapters.len() {
            return Err(Self::aggregate(StorageOperation::Clear, failures));
        }
        Ok(())
    }
}
