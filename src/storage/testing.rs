//! Test doubles for storage adapters.

use crate::core::error::{StorageError, StorageOperation, StorageResult};
use crate::storage::memory::InMemoryStorageAdapter;
use crate::storage::traits::StorageAdapter;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Fails the first `failures` calls, then behaves like an in-memory adapter.
#[derive(Debug)]
pub(crate) struct FailingStorageAdapter {
    name: String,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
    backing: InMemoryStorageAdapter,
}

impl FailingStorageAdapter {
    /// An adapter that fails every call.
    pub(crate) fn new(name: &str) -> Self {
        Self::failing_times(name, u32::MAX)
    }

    /// An adapter that fails `failures` calls before recovering.
    pub(crate) fn failing_times(name: &str, failures: u32) -> Self {
        Self {
            name: name.to_string(),
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            backing: InMemoryStorageAdapter::new(),
        }
    }

    /// Makes the next `failures` calls fail.
    pub(crate) fn fail_next(&self, failures: u32) {
        self.remaining_failures.store(failures, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: StorageOperation, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if !failing {
            return Ok(());
        }
        Err(match operation {
            StorageOperation::Read | StorageOperation::Exists => {
                StorageError::read_failed(&self.name, key, "simulated outage")
            }
            _ => StorageError::write_failed(&self.name, operation, key, "simulated outage"),
        })
    }
}

#[async_trait]
impl StorageAdapter for FailingStorageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check(StorageOperation::Read, key)?;
        self.backing.read(key).await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        self.check(StorageOperation::Write, key)?;
        self.backing.write(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.check(StorageOperation::Exists, key)?;
        self.backing.exists(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check(StorageOperation::Delete, key)?;
        self.backing.delete(key).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.check(StorageOperation::Clear, "")?;
        self.backing.clear().await
    }
}
