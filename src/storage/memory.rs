//! In-process storage adapter.

use crate::core::clock::{ArcClock, SystemClock};
use crate::core::error::StorageResult;
use crate::storage::traits::{expiry_deadline, StorageAdapter};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// Stores values in a process-local map.
///
/// Nothing survives a restart, so on its own this adapter only suits tests
/// and single-run tools. As the first tier of a
/// [`FallbackStorageAdapter`](crate::FallbackStorageAdapter) it gives fast
/// reads in front of a durable backend.
#[derive(Debug)]
pub struct InMemoryStorageAdapter {
    name: String,
    entries: RwLock<HashMap<String, Entry>>,
    clock: ArcClock,
}

impl InMemoryStorageAdapter {
    /// Creates an empty adapter using the system clock for TTLs.
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            entries: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the adapter name reported in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the clock used to evaluate TTLs.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Returns `true` if no live entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStorageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        let expires_at = ttl.map(|ttl| expiry_deadline(self.clock.now(), ttl));
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_vec(),
                    expires_at,
                },
            );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let adapter = InMemoryStorageAdapter::new();

        adapter.write("a", b"one", None).await.unwrap();
        assert_eq!(adapter.read("a").await.unwrap(), Some(b"one".to_vec()));
        assert!(adapter.exists("a").await.unwrap());

        adapter.write("a", b"two", None).await.unwrap();
        assert_eq!(adapter.read("a").await.unwrap(), Some(b"two".to_vec()));

        adapter.delete("a").await.unwrap();
        assert_eq!(adapter.read("a").await.unwrap(), None);

        // Deleting again is fine.
        adapter.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_ttl_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let adapter = InMemoryStorageAdapter::new().with_clock(clock.clone());

        adapter
            .write("k", b"v", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        clock.advance(9);
        assert!(adapter.exists("k").await.unwrap());

        clock.advance(1);
        assert_eq!(adapter.read("k").await.unwrap(), None);
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_memory_large_and_sub_second_ttls() {
        let clock = Arc::new(ManualClock::new(1_000));
        let adapter = InMemoryStorageAdapter::new().with_clock(clock.clone());

        adapter
            .write("forever", b"v", Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();
        adapter
            .write("brief", b"v", Some(Duration::from_millis(500)))
            .await
            .unwrap();
        assert_eq!(adapter.read("forever").await.unwrap(), Some(b"v".to_vec()));
        assert!(adapter.exists("brief").await.unwrap());

        clock.advance(1);
        assert!(!adapter.exists("brief").await.unwrap());
        assert_eq!(adapter.read("forever").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_clear() {
        let adapter = InMemoryStorageAdapter::new().with_name("tier-1");
        adapter.write("a", b"1", None).await.unwrap();
        adapter.write("b", b"2", None).await.unwrap();
        assert_eq!(adapter.len(), 2);

        adapter.clear().await.unwrap();
        assert!(adapter.is_empty());
        assert_eq!(adapter.name(), "tier-1");
    }
}
