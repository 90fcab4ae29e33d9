//! Core types for the durable-breaker library.
//!
//! - [`state`] - The `CircuitState` value object and `CircuitStatus`
//! - [`error`] - Structured error types
//! - [`clock`] - Injectable time sources
//! - [`hasher`] - SHA-256 storage key derivation

pub mod clock;
pub mod error;
pub mod hasher;
pub mod state;

pub use clock::{ArcClock, Clock, ManualClock, SystemClock};
pub use error::{
    AdapterFailure, CircuitBreakerError, StorageError, StorageOperation, StorageResult,
};
pub use hasher::{storage_key, STORAGE_KEY_PREFIX};
pub use state::{CircuitState, CircuitStatus};
