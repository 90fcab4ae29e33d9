//! Metrics decorator and collectors.

use crate::core::error::{StorageOperation, StorageResult};
use crate::storage::traits::{root_adapter, StorageAdapter};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One measured storage operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSample {
    /// The operation performed.
    pub operation: StorageOperation,
    /// Name of the adapter that performed it.
    pub adapter: String,
    /// Wall-clock duration of the call.
    pub duration: Duration,
    /// Whether the call returned `Ok`.
    pub success: bool,
    /// Operation-specific tags such as `value_size` or `has_ttl`.
    pub tags: BTreeMap<String, String>,
}

/// Receives samples from [`MetricsStorageDecorator`].
pub trait MetricsCollector: Send + Sync + Debug {
    /// Records one sample.
    fn record(&self, sample: OperationSample);
}

/// Keeps every sample in memory for inspection.
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    samples: Mutex<Vec<OperationSample>>,
}

impl InMemoryMetricsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded sample.
    pub fn samples(&self) -> Vec<OperationSample> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the samples recorded for `operation`.
    pub fn samples_for(&self, operation: StorageOperation) -> Vec<OperationSample> {
        self.samples()
            .into_iter()
            .filter(|s| s.operation == operation)
            .collect()
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn record(&self, sample: OperationSample) {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sample);
    }
}

/// Forwards samples to the [`metrics`] crate facade.
///
/// - `storage_operations_total` (counter) labelled by `operation`,
///   `adapter` and `success`
/// - `storage_operation_duration_seconds` (histogram) labelled by
///   `operation` and `adapter`
#[cfg(feature = "metrics-facade")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsFacadeCollector;

#[cfg(feature = "metrics-facade")]
impl MetricsCollector for MetricsFacadeCollector {
    fn record(&self, sample: OperationSample) {
        let success = if sample.success { "true" } else { "false" };
        metrics::counter!(
            "storage_operations_total",
            "operation" => sample.operation.as_str(),
            "adapter" => sample.adapter.clone(),
            "success" => success
        )
        .increment(1);
        metrics::histogram!(
            "storage_operation_duration_seconds",
            "operation" => sample.operation.as_str(),
            "adapter" => sample.adapter
        )
        .record(sample.duration.as_secs_f64());
    }
}

/// Records the sample when dropped, so failures and cancellations are
/// measured as well as successes.
struct SampleGuard<'a> {
    collector: &'a dyn MetricsCollector,
    operation: StorageOperation,
    adapter: &'a str,
    started: Instant,
    success: bool,
    tags: BTreeMap<String, String>,
}

impl<'a> SampleGuard<'a> {
    fn new(collector: &'a dyn MetricsCollector, operation: StorageOperation, adapter: &'a str) -> Self {
        Self {
            collector,
            operation,
            adapter,
            started: Instant::now(),
            success: false,
            tags: BTreeMap::new(),
        }
    }

    fn tag(&mut self, key: &str, value: impl ToString) {
        self.tags.insert(key.to_string(), value.to_string());
    }
}

impl Drop for SampleGuard<'_> {
    fn drop(&mut self) {
        self.collector.record(OperationSample {
            operation: self.operation,
            adapter: self.adapter.to_string(),
            duration: self.started.elapsed(),
            success: self.success,
            tags: std::mem::take(&mut self.tags),
        });
    }
}

/// Records a sample for every operation of the wrapped adapter.
#[derive(Debug)]
pub struct MetricsStorageDecorator<A: StorageAdapter> {
    inner: A,
    collector: Arc<dyn MetricsCollector>,
}

impl<A: StorageAdapter> MetricsStorageDecorator<A> {
    /// Wraps `inner`, reporting to `collector`.
    pub fn new(inner: A, collector: Arc<dyn MetricsCollector>) -> Self {
        Self { inner, collector }
    }

    /// Returns the wrapped adapter.
    pub fn inner_adapter(&self) -> &A {
        &self.inner
    }

    /// Returns the innermost adapter of the decorator chain.
    pub fn root(&self) -> &dyn StorageAdapter {
        root_adapter(&self.inner)
    }

    async fn measure<T, Fut>(
        &self,
        operation: StorageOperation,
        call: Fut,
        before: impl FnOnce(&mut SampleGuard<'_>) + Send,
        after: impl FnOnce(&T, &mut SampleGuard<'_>) + Send,
    ) -> StorageResult<T>
    where
        Fut: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let mut guard = SampleGuard::new(self.collector.as_ref(), operation, self.inner.name());
        before(&mut guard);

        let result = call.await;
        if let Ok(value) = &result {
            guard.success = true;
            after(value, &mut guard);
        }
        result
    }
}

#[async_trait]
impl<A: StorageAdapter> StorageAdapter for MetricsStorageDecorator<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.measure(
            StorageOperation::Read,
            self.inner.read(key),
            |_| {},
            |value: &Option<Vec<u8>>, guard| {
                guard.tag("hit", value.is_some());
                if let Some(value) = value {
                    guard.tag("value_size", value.len());
                }
            },
        )
        .await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let value_size = value.len();
        self.measure(
            StorageOperation::Write,
            self.inner.write(key, value, ttl),
            move |guard| {
                guard.tag("value_size", value_size);
                guard.tag("has_ttl", ttl.is_some());
            },
            |_: &(), _| {},
        )
        .await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.measure(
            StorageOperation::Exists,
            self.inner.exists(key),
            |_| {},
            |exists: &bool, guard| guard.tag("exists", exists),
        )
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.measure(
            StorageOperation::Delete,
            self.inner.delete(key),
            |_| {},
            |_: &(), _| {},
        )
        .await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.measure(
            StorageOperation::Clear,
            self.inner.clear(),
            |_| {},
            |_: &(), _| {},
        )
        .await
    }

    fn inner(&self) -> Option<&dyn StorageAdapter> {
        Some(&self.inner)
    }
}
