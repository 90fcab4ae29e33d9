//! Filesystem-based storage adapter.

use crate::core::clock::{ArcClock, SystemClock};
use crate::core::error::{StorageError, StorageOperation, StorageResult};
use crate::storage::traits::{expiry_deadline, StorageAdapter};

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const ADAPTER_NAME: &str = "file";
const HEADER_LEN: usize = 8;
const TEMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

/// Configuration for [`FileStorageAdapter`].
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Directory holding one file per key.
    pub root: PathBuf,

    /// Extension of data files, without the leading dot.
    pub extension: String,

    /// Temp files older than this are treated as leftovers of a crashed write.
    pub max_temp_age: Duration,
}

impl FileStorageConfig {
    /// Creates a configuration rooted at `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "cbstate".to_string(),
            max_temp_age: Duration::from_secs(3600),
        }
    }

    /// Sets the data file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the age after which temp files are swept.
    pub fn with_max_temp_age(mut self, age: Duration) -> Self {
        self.max_temp_age = age;
        self
    }
}

/// Stores one file per key under a root directory.
///
/// Writes never expose a partially written file: the payload goes to a
/// uniquely named temp file in the same directory, is synced, and is then
/// renamed over the destination while an advisory lock on the key is held.
/// Readers keep seeing the previous file until the rename lands.
///
/// # Directory Structure
///
/// ```text
/// root/
/// ├── {key}.cbstate             # [8-byte big-endian expiry][payload]
/// ├── .{key}.lock               # advisory lock serializing writers, never removed
/// └── .{key}.{random}.tmp       # in-flight write
/// ```
///
/// An expiry of `0` means the value never expires.
#[derive(Debug)]
pub struct FileStorageAdapter {
    config: FileStorageConfig,
    clock: ArcClock,
}

impl FileStorageAdapter {
    /// Creates an adapter rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::with_config(FileStorageConfig::new(root))
    }

    /// Creates an adapter from a full configuration.
    pub fn with_config(config: FileStorageConfig) -> StorageResult<Self> {
        fs::create_dir_all(&config.root).map_err(|e| {
            StorageError::configuration(format!(
                "failed to create storage directory {}: {}",
                config.root.display(),
                e
            ))
        })?;

        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Sets the clock used to evaluate TTLs.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FileStorageConfig {
        &self.config
    }

    /// Returns the data file path for `key`.
    pub fn data_path(&self, key: &str) -> PathBuf {
        data_path(&self.config, key)
    }

    /// Removes temp files older than the configured maximum age.
    ///
    /// Returns the number of files removed. Files that vanish or cannot be
    /// inspected mid-sweep are skipped.
    pub async fn cleanup_orphans(&self) -> StorageResult<usize> {
        let config = self.config.clone();
        run_blocking(StorageOperation::Clear, "", move || sweep_orphans(&config)).await
    }
}

#[async_trait]
impl StorageAdapter for FileStorageAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let config = self.config.clone();
        let owned_key = key.to_string();
        let now = self.clock.now();

        run_blocking(StorageOperation::Read, key, move || {
            read_blocking(&config, &owned_key, now)
        })
        .await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        validate_key(key)?;
        let config = self.config.clone();
        let owned_key = key.to_string();
        let value = value.to_vec();
        let expires_at = ttl
            .map(|ttl| expiry_deadline(self.clock.now(), ttl))
            .unwrap_or(0);

        run_blocking(StorageOperation::Write, key, move || {
            write_blocking(&config, &owned_key, &value, expires_at)?;

            if let Err(e) = sweep_orphans(&config) {
                tracing::debug!(error = %e, "Orphan temp file sweep failed");
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let config = self.config.clone();
        let owned_key = key.to_string();

        run_blocking(StorageOperation::Delete, key, move || {
            delete_blocking(&config, &owned_key)
        })
        .await
    }

    async fn clear(&self) -> StorageResult<()> {
        let config = self.config.clone();
        run_blocking(StorageOperation::Clear, "", move || clear_blocking(&config)).await
    }
}

fn data_path(config: &FileStorageConfig, key: &str) -> PathBuf {
    config.root.join(format!("{}.{}", key, config.extension))
}

fn lock_path(config: &FileStorageConfig, key: &str) -> PathBuf {
    config.root.join(format!(".{}{}", key, LOCK_SUFFIX))
}

fn validate_key(key: &str) -> StorageResult<()> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.starts_with('.') {
        Some("key starts with '.'")
    } else if key.contains(['/', '\\', '\0']) {
        Some("key contains a path separator or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

async fn run_blocking<T, F>(operation: StorageOperation, key: &str, f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            let reason = format!("background task failed: {}", e);
            Err(match operation {
                StorageOperation::Read | StorageOperation::Exists => {
                    StorageError::read_failed(ADAPTER_NAME, key, reason)
                }
                _ => StorageError::write_failed(ADAPTER_NAME, operation, key, reason),
            })
        }
    }
}

fn read_blocking(config: &FileStorageConfig, key: &str, now: i64) -> StorageResult<Option<Vec<u8>>> {
    let path = data_path(config, key);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::from_io(
                ADAPTER_NAME,
                StorageOperation::Read,
                key,
                &e,
            ))
        }
    };

    if bytes.len() < HEADER_LEN {
        return Err(StorageError::corrupted(
            key,
            format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            ),
        ));
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes[..HEADER_LEN]);
    let expires_at = i64::from_be_bytes(header);

    if expires_at != 0 && expires_at <= now {
        if let Err(e) = fs::remove_file(&path) {
            tracing::debug!(key = %key, error = %e, "Failed to remove expired file");
        }
        return Ok(None);
    }

    Ok(Some(bytes[HEADER_LEN..].to_vec()))
}

fn write_blocking(
    config: &FileStorageConfig,
    key: &str,
    value: &[u8],
    expires_at: i64,
) -> StorageResult<()> {
    let io_err = |e: &std::io::Error| {
        StorageError::from_io(ADAPTER_NAME, StorageOperation::Write, key, e)
    };

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", key))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(&config.root)
        .map_err(|e| io_err(&e))?;

    temp.write_all(&expires_at.to_be_bytes())
        .map_err(|e| io_err(&e))?;
    temp.write_all(value).map_err(|e| io_err(&e))?;
    temp.as_file().sync_all().map_err(|e| io_err(&e))?;

    let lock = OpenOptions::new()
        .create(true)
        .write(true)
        .open(lock_path(config, key))
        .map_err(|e| io_err(&e))?;
    FileExt::lock_exclusive(&lock).map_err(|e| io_err(&e))?;

    // A failed persist hands the temp file back; dropping it removes it.
    let result = temp.persist(data_path(config, key)).map(|_| ()).map_err(|e| {
        StorageError::write_failed(
            ADAPTER_NAME,
            StorageOperation::Write,
            key,
            format!("atomic rename failed: {}", e.error),
        )
    });

    if let Err(e) = FileExt::unlock(&lock) {
        tracing::debug!(key = %key, error = %e, "Failed to release file lock");
    }

    result
}

fn delete_blocking(config: &FileStorageConfig, key: &str) -> StorageResult<()> {
    let io_err =
        |e: &std::io::Error| StorageError::from_io(ADAPTER_NAME, StorageOperation::Delete, key, e);

    let lock_file = lock_path(config, key);
    let lock = match OpenOptions::new().write(true).open(&lock_file) {
        Ok(lock) => {
            FileExt::lock_exclusive(&lock).map_err(|e| io_err(&e))?;
            Some(lock)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(io_err(&e)),
    };

    let result = match fs::remove_file(data_path(config, key)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&e)),
    };

    if let Some(lock) = lock {
        let _ = FileExt::unlock(&lock);
    }

    result
}

/// Deletes every data file under its key lock, then sweeps aged temp files.
///
/// Lock files stay: another process may hold one, and unlinking it would let
/// the next writer lock a fresh inode alongside it.
fn clear_blocking(config: &FileStorageConfig) -> StorageResult<()> {
    let data_suffix = format!(".{}", config.extension);

    let entries = fs::read_dir(&config.root).map_err(|e| {
        StorageError::from_io(ADAPTER_NAME, StorageOperation::Clear, "", &e)
    })?;
    let keys: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let key = name.strip_suffix(&data_suffix)?;
            (!key.is_empty() && !key.starts_with('.')).then(|| key.to_string())
        })
        .collect();

    for key in &keys {
        delete_blocking(config, key)?;
    }
    let swept = sweep_orphans(config)?;

    tracing::debug!(
        root = %config.root.display(),
        removed = keys.len(),
        swept,
        "Cleared file storage"
    );
    Ok(())
}

fn sweep_orphans(config: &FileStorageConfig) -> StorageResult<usize> {
    let entries = fs::read_dir(&config.root).map_err(|e| {
        StorageError::from_io(ADAPTER_NAME, StorageOperation::Clear, "", &e)
    })?;
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let is_temp = file_name
            .to_str()
            .map(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX))
            .unwrap_or(false);
        if !is_temp {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);

        if age >= config.max_temp_age && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        tracing::info!(root = %config.root.display(), removed, "Removed orphaned temp files");
    }
    Ok(removed)
}
