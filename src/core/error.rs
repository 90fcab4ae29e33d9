//! Error types for the durable-breaker library.
//!
//! Storage failures and breaker rejections are kept in separate types so a
//! caller can always tell "the dependency failed" from "the breaker refused
//! to call it" from "the breaker could not persist its state".

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The storage operation that produced an error or a metrics sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// `read(key)`
    Read,
    /// `write(key, value, ttl)`
    Write,
    /// `exists(key)`
    Exists,
    /// `delete(key)`
    Delete,
    /// `clear()`
    Clear,
}

impl StorageOperation {
    /// Returns the lowercase name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Exists => "exists",
            Self::Delete => "delete",
            Self::Clear => "clear",
        }
    }

    /// Returns `true` for operations that mutate the store.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Write | Self::Delete | Self::Clear)
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single adapter's failure inside an aggregate error.
#[derive(Debug)]
pub struct AdapterFailure {
    /// Name of the adapter that failed.
    pub adapter: String,
    /// The error it raised.
    pub error: StorageError,
}

/// The error type for storage adapters, serializers and the repository.
///
/// A missing key is never an error: reads return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading from the backend failed.
    #[error("adapter '{adapter}' failed to read '{key}': {reason}")]
    ReadFailed {
        /// Adapter that failed.
        adapter: String,
        /// Storage key involved.
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Writing, deleting or clearing failed.
    #[error("adapter '{adapter}' failed to {operation} '{key}': {reason}")]
    WriteFailed {
        /// Adapter that failed.
        adapter: String,
        /// Operation that failed.
        operation: StorageOperation,
        /// Storage key involved (empty for `clear`).
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The backend refused access.
    #[error("adapter '{adapter}' was denied permission to {operation} '{key}'")]
    PermissionDenied {
        /// Adapter that failed.
        adapter: String,
        /// Operation that failed.
        operation: StorageOperation,
        /// Storage key involved.
        key: String,
    },

    /// The backend ran out of space.
    #[error("adapter '{adapter}' is out of space writing '{key}'")]
    DiskFull {
        /// Adapter that failed.
        adapter: String,
        /// Storage key involved.
        key: String,
    },

    /// Stored data could not be decoded.
    #[error("stored data for '{key}' is corrupted: {reason}")]
    Corrupted {
        /// Storage key or service key whose payload is corrupt.
        key: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The key cannot be mapped onto the backend.
    #[error("invalid storage key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Every adapter of a fallback chain failed.
    #[error("all adapters failed for {operation}: {}", format_failures(.failures))]
    AllAdaptersFailed {
        /// Operation that failed.
        operation: StorageOperation,
        /// One entry per adapter, in chain order.
        failures: Vec<AdapterFailure>,
    },

    /// The storage stack was configured incorrectly.
    #[error("storage configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

fn format_failures(failures: &[AdapterFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.adapter, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl StorageError {
    /// Classifies an I/O error raised by a filesystem-backed adapter.
    ///
    /// `NotFound` is not handled here; callers turn it into `Ok(None)` or
    /// a successful no-op before reaching this point.
    pub fn from_io(
        adapter: impl Into<String>,
        operation: StorageOperation,
        key: impl Into<String>,
        error: &std::io::Error,
    ) -> Self {
        let adapter = adapter.into();
        let key = key.into();

        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                adapter,
                operation,
                key,
            };
        }

        // ENOSPC
        if operation.is_mutation() && error.raw_os_error() == Some(28) {
            return Self::DiskFull { adapter, key };
        }

        match operation {
            StorageOperation::Read | StorageOperation::Exists => Self::ReadFailed {
                adapter,
                key,
                reason: error.to_string(),
            },
            _ => Self::WriteFailed {
                adapter,
                operation,
                key,
                reason: error.to_string(),
            },
        }
    }

    /// Creates a `ReadFailed` error.
    pub fn read_failed(
        adapter: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReadFailed {
            adapter: adapter.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `WriteFailed` error.
    pub fn write_failed(
        adapter: impl Into<String>,
        operation: StorageOperation,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::WriteFailed {
            adapter: adapter.into(),
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Corrupted` error.
    pub fn corrupted(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error was raised while reading.
    pub fn is_read_error(&self) -> bool {
        match self {
            Self::ReadFailed { .. } | Self::Corrupted { .. } => true,
            Self::PermissionDenied { operation, .. } => !operation.is_mutation(),
            Self::AllAdaptersFailed { operation, .. } => !operation.is_mutation(),
            _ => false,
        }
    }

    /// Returns `true` if this error was raised while writing, deleting or clearing.
    pub fn is_write_error(&self) -> bool {
        match self {
            Self::WriteFailed { .. } | Self::DiskFull { .. } => true,
            Self::PermissionDenied { operation, .. } => operation.is_mutation(),
            Self::AllAdaptersFailed { operation, .. } => operation.is_mutation(),
            _ => false,
        }
    }

    /// Returns `true` if the backend was reachable but the stored data is bad.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    /// Returns `true` if this error aggregates failures from several adapters.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::AllAdaptersFailed { .. })
    }
}

/// The error returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
///
/// `CircuitOpen` means the operation was never attempted, which is always
/// distinguishable from `Operation`, the operation's own failure.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker rejected the call without invoking the operation.
    #[error("circuit breaker open for service '{service}'")]
    CircuitOpen {
        /// Service key of the breaker.
        service: String,
        /// Time left until the breaker will admit a trial call, if known.
        retry_after: Option<Duration>,
    },

    /// The wrapped operation failed.
    #[error("operation failed: {0}")]
    Operation(#[source] E),

    /// The breaker could not persist or load its state.
    #[error("circuit state persistence failed: {0}")]
    Storage(#[from] StorageError),

    /// The wrapped operation failed and the resulting state could not be
    /// persisted. The in-memory state moved on; storage did not.
    #[error("operation failed: {error}; circuit state persistence failed: {storage}")]
    OperationUnpersisted {
        /// The operation's own error.
        #[source]
        error: E,
        /// The error raised while saving the new state.
        storage: StorageError,
    },
}

impl<E> CircuitBreakerError<E> {
    /// Returns `true` if the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if the wrapped operation itself failed.
    pub fn is_operation_error(&self) -> bool {
        matches!(
            self,
            Self::Operation(_) | Self::OperationUnpersisted { .. }
        )
    }

    /// Returns `true` if persisting the breaker state failed.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::OperationUnpersisted { .. })
    }

    /// Returns the persistence error, if persisting failed.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(e) | Self::OperationUnpersisted { storage: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Returns the operation's own error, if that is what failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) | Self::OperationUnpersisted { error: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// A specialized `Result` type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
