//! # durable-breaker
//!
//! A circuit breaker whose decisions survive process restarts and whose
//! persistence keeps working while individual storage backends fail.
//!
//! ## Overview
//!
//! The crate is made of two halves:
//!
//! - A **breaker engine** that tracks failures of an unreliable dependency,
//!   stops calling it once a threshold is crossed and periodically retries
//!   for recovery.
//! - A **persistence layer** that stores the breaker's state through a
//!   pluggable [`StorageAdapter`], optionally decorated with logging,
//!   metrics and retries, and optionally chained for high availability.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use durable_breaker::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = FileStorageAdapter::new("/var/lib/myapp/breakers")?;
//!     let repository = CircuitStateRepository::new(Arc::new(adapter));
//!
//!     let breaker = CircuitBreaker::builder("payments-api")
//!         .config(CircuitBreakerConfig::default().with_failure_threshold(3))
//!         .repository(repository)
//!         .build()
//!         .await?;
//!
//!     let response = breaker
//!         .call(|| async { call_payments_api().await })
//!         .await;
//!
//!     match response {
//!         Ok(body) => println!("{body}"),
//!         Err(e) if e.is_circuit_open() => println!("payments unavailable, try later"),
//!         Err(e) => println!("payments failed: {e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: state value object, errors, clock and storage key hashing
//! - **Storage**: adapters (memory, file, fallback chain) and decorators
//! - **Repository**: maps service keys to hashed storage keys and
//!   serializes [`CircuitState`] values
//! - **Circuit Breaker**: the closed/open/half-open state machine
//! - **Audit**: lifecycle signals emitted by the breaker
//! - **Manager**: an explicit per-process registry of breakers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod circuit_breaker;
pub mod core;
pub mod manager;
pub mod repository;
pub mod storage;

pub use crate::core::{
    storage_key, CircuitBreakerError, CircuitState, CircuitStatus, Clock, ManualClock,
    StorageError, StorageOperation, SystemClock,
};

pub use crate::audit::{BreakerEvent, BreakerEventKind, EventSink, TracingEventSink};
pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig};
pub use crate::manager::BreakerRegistry;
pub use crate::repository::{CircuitStateRepository, JsonStateSerializer, StateSerializer};
pub use crate::storage::{
    FallbackStorageAdapter, FileStorageAdapter, InMemoryStorageAdapter, StorageAdapter,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use durable_breaker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audit::{BreakerEvent, BreakerEventKind, EventSink, TracingEventSink};
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    pub use crate::core::{
        CircuitBreakerError, CircuitState, CircuitStatus, Clock, StorageError, SystemClock,
    };
    pub use crate::manager::BreakerRegistry;
    pub use crate::repository::CircuitStateRepository;
    pub use crate::storage::decorators::{
        LoggingStorageDecorator, MetricsStorageDecorator, RetryConfig, RetryStorageDecorator,
    };
    pub use crate::storage::{
        FallbackStorageAdapter, FileStorageAdapter, InMemoryStorageAdapter, StorageAdapter,
    };
}
