//! Raw key/value persistence for circuit state.
//!
//! This module provides the [`StorageAdapter`] abstraction and its
//! implementations:
//!
//! - [`InMemoryStorageAdapter`] - process-local map with TTL support
//! - [`FileStorageAdapter`] - atomic, lock-protected files on disk
//! - [`FallbackStorageAdapter`] - priority chain over several adapters
//! - [`NullStorageAdapter`] - stores nothing
//! - [`decorators`] - logging, metrics and retry wrappers

pub mod decorators;
mod fallback;
mod filesystem;
mod memory;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use fallback::FallbackStorageAdapter;
pub use filesystem::{FileStorageAdapter, FileStorageConfig};
pub use memory::InMemoryStorageAdapter;
pub use traits::{root_adapter, ArcStorageAdapter, NullStorageAdapter, StorageAdapter};
