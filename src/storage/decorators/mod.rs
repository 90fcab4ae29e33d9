//! Transparent wrappers adding cross-cutting behavior to any adapter.
//!
//! Each decorator exclusively owns one inner adapter and implements
//! [`StorageAdapter`](crate::storage::StorageAdapter) itself, so decorators
//! stack into a linear chain:
//!
//! ```rust,ignore
//! use durable_breaker::storage::decorators::*;
//! use durable_breaker::storage::FileStorageAdapter;
//! use std::sync::Arc;
//!
//! let file = FileStorageAdapter::new("/var/lib/app/breakers")?;
//! let adapter = LoggingStorageDecorator::new(
//!     MetricsStorageDecorator::new(
//!         RetryStorageDecorator::new(file, RetryConfig::default()),
//!         Arc::new(InMemoryMetricsCollector::new()),
//!     ),
//! );
//! assert_eq!(adapter.root().name(), "file");
//! ```

mod logging;
mod metrics;
mod retry;

pub use self::logging::LoggingStorageDecorator;
#[cfg(feature = "metrics-facade")]
pub use self::metrics::MetricsFacadeCollector;
pub use self::metrics::{
    InMemoryMetricsCollector, MetricsCollector, MetricsStorageDecorator, OperationSample,
};
pub use self::retry::{RetryConfig, RetryStorageDecorator};
