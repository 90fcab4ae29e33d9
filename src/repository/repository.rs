//! Domain-level persistence of circuit states.

use crate::core::error::StorageResult;
use crate::core::hasher::storage_key;
use crate::core::state::CircuitState;
use crate::repository::serializer::{JsonStateSerializer, StateSerializer};
use crate::storage::{ArcStorageAdapter, NullStorageAdapter};

use std::sync::Arc;
use std::time::Duration;

/// Stores [`CircuitState`] values through a storage adapter.
///
/// Service keys are hashed with [`storage_key`] before they reach the
/// adapter. Adapter failures surface as the adapter's own errors, while
/// undecodable payloads surface as
/// [`StorageError::Corrupted`](crate::StorageError::Corrupted).
#[derive(Debug, Clone)]
pub struct CircuitStateRepository {
    adapter: ArcStorageAdapter,
    serializer: Arc<dyn StateSerializer>,
    ttl: Option<Duration>,
}

impl CircuitStateRepository {
    /// Creates a repository using JSON encoding.
    pub fn new(adapter: ArcStorageAdapter) -> Self {
        Self {
            adapter,
            serializer: Arc::new(JsonStateSerializer),
            ttl: None,
        }
    }

    /// Creates a repository that persists nothing.
    pub fn in_memory_only() -> Self {
        Self::new(Arc::new(NullStorageAdapter::new()))
    }

    /// Sets the serializer.
    pub fn with_serializer(mut self, serializer: Arc<dyn StateSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Sets a TTL applied to every saved state.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns the underlying adapter.
    pub fn adapter(&self) -> &ArcStorageAdapter {
        &self.adapter
    }

    /// Loads the state persisted for `service_key`.
    pub async fn find(&self, service_key: &str) -> StorageResult<Option<CircuitState>> {
        let key = storage_key(service_key);
        match self.adapter.read(&key).await? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(service_key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Persists `state` under its service key.
    pub async fn save(&self, state: &CircuitState) -> StorageResult<()> {
        let key = storage_key(state.service_key());
        let bytes = self.serializer.serialize(state)?;
        self.adapter.write(&key, &bytes, self.ttl).await
    }

    /// Removes the state persisted for `service_key`.
    pub async fn delete(&self, service_key: &str) -> StorageResult<()> {
        self.adapter.delete(&storage_key(service_key)).await
    }

    /// Returns `true` if a state is persisted for `service_key`.
    pub async fn exists(&self, service_key: &str) -> StorageResult<bool> {
        self.adapter.exists(&storage_key(service_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StorageError;
    use crate::core::state::CircuitStatus;
    use crate::storage::testing::FailingStorageAdapter;
    use crate::storage::{InMemoryStorageAdapter, StorageAdapter};

    #[tokio::test]
    async fn test_save_find_delete() {
        let memory = Arc::new(InMemoryStorageAdapter::new());
        let repository = CircuitStateRepository::new(memory.clone());

        assert_eq!(repository.find("payments").await.unwrap(), None);
        assert!(!repository.exists("payments").await.unwrap());

        let state = CircuitState::from_parts("payments", CircuitStatus::Open, 3, 0, Some(99));
        repository.save(&state).await.unwrap();

        assert_eq!(repository.find("payments").await.unwrap(), Some(state));
        assert!(repository.exists("payments").await.unwrap());

        repository.delete("payments").await.unwrap();
        assert_eq!(repository.find("payments").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_uses_hashed_storage_key() {
        let memory = Arc::new(InMemoryStorageAdapter::new());
        let repository = CircuitStateRepository::new(memory.clone());

        repository
            .save(&CircuitState::closed("../weird key/"))
            .await
            .unwrap();

        assert!(memory.exists(&storage_key("../weird key/")).await.unwrap());
        assert!(!memory.exists("../weird key/").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_distinguishable() {
        let memory = Arc::new(InMemoryStorageAdapter::new());
        memory
            .write(&storage_key("svc"), b"{garbage", None)
            .await
            .unwrap();
        let repository = CircuitStateRepository::new(memory);

        let err = repository.find("svc").await.unwrap_err();
        assert!(err.is_corruption());
    }

    #[tokio::test]
    async fn test_adapter_failure_is_not_corruption() {
        let repository =
            CircuitStateRepository::new(Arc::new(FailingStorageAdapter::new("down")));

        let err = repository.find("svc").await.unwrap_err();
        assert!(matches!(err, StorageError::ReadFailed { .. }));
        assert!(!err.is_corruption());

        let err = repository
            .save(&CircuitState::closed("svc"))
            .await
            .unwrap_err();
        assert!(err.is_write_error());
    }

    #[tokio::test]
    async fn test_in_memory_only_persists_nothing() {
        let repository = CircuitStateRepository::in_memory_only();
        repository.save(&CircuitState::closed("svc")).await.unwrap();
        assert_eq!(repository.find("svc").await.unwrap(), None);
    }
}
