//! Encoding of [`CircuitState`] values for storage.

use crate::core::error::{StorageError, StorageResult};
use crate::core::state::{CircuitState, CircuitStatus};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Converts circuit states to and from bytes.
pub trait StateSerializer: Send + Sync + Debug {
    /// Encodes a state.
    fn serialize(&self, state: &CircuitState) -> StorageResult<Vec<u8>>;

    /// Decodes a state previously stored for `service_key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the payload cannot be decoded.
    fn deserialize(&self, service_key: &str, bytes: &[u8]) -> StorageResult<CircuitState>;
}

/// The stored record. The service key is not part of it: it is implied by
/// the storage key the record lives under.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    state: CircuitStatus,
    failure_count: u32,
    success_count: u32,
    /// `0` means no failure has been recorded.
    last_failure_time: i64,
}

/// Encodes states as compact JSON objects.
///
/// ```json
/// {"state":"half-open","failure_count":3,"success_count":1,"last_failure_time":1700000000}
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStateSerializer;

impl JsonStateSerializer {
    /// Creates a new JSON serializer.
    pub fn new() -> Self {
        Self
    }
}

impl StateSerializer for JsonStateSerializer {
    fn serialize(&self, state: &CircuitState) -> StorageResult<Vec<u8>> {
        let record = StateRecord {
            state: state.status(),
            failure_count: state.failure_count(),
            success_count: state.success_count(),
            last_failure_time: state.last_failure_time().unwrap_or(0),
        };

        serde_json::to_vec(&record).map_err(|e| {
            StorageError::configuration(format!(
                "failed to serialize state for '{}': {}",
                state.service_key(),
                e
            ))
        })
    }

    fn deserialize(&self, service_key: &str, bytes: &[u8]) -> StorageResult<CircuitState> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| StorageError::corrupted(service_key, format!("invalid JSON: {}", e)))?;

        if !value.is_object() {
            return Err(StorageError::corrupted(
                service_key,
                "expected a JSON object",
            ));
        }

        let record: StateRecord = serde_json::from_value(value)
            .map_err(|e| StorageError::corrupted(service_key, e.to_string()))?;

        let last_failure_time = match record.last_failure_time {
            0 => None,
            t => Some(t),
        };

        Ok(CircuitState::from_parts(
            service_key,
            record.state,
            record.failure_count,
            record.success_count,
            last_failure_time,
        ))
    }
}
