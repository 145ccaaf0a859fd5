//! Storage backends for resource instances.
//!
//! A [`StorageBackend`] hands out one isolated [`StorageArea`] per resource
//! instance. Areas expose flat key/value primitives and can be removed as a
//! whole. Two implementations are provided:
//! - [`FsBackend`]: a uniquely-named directory per area
//! - [`MemoryBackend`]: a process-local map per area, for hermetic tests
//!
//! Capability clients only talk to these traits, so both backends are
//! interchangeable without changing client-visible behavior.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use sim_runtime_common::{SimError, StorageBackendKind, StorageConfig};

pub mod fs;
pub mod memory;

pub use fs::{FsArea, FsBackend};
pub use memory::{MemoryArea, MemoryBackend};

/// Allocates isolated storage areas.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Allocate a fresh area for `resource_id`.
    ///
    /// The returned area never collides with any other area, including areas
    /// allocated by other backends running concurrently.
    async fn allocate(&self, resource_id: &str) -> Result<Arc<dyn StorageArea>, SimError>;
}

/// Key/value primitives over one resource's storage area.
///
/// Keys are passed through unchanged; callers validate them first.
#[async_trait]
pub trait StorageArea: Send + Sync + fmt::Debug {
    /// Human-readable location of the area (directory path, area name).
    fn location(&self) -> String;

    /// Write `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), SimError>;

    /// Read the value under `key`, or `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SimError>;

    /// Enumerate the keys currently present, in no particular order.
    async fn list(&self) -> Result<Vec<String>, SimError>;

    /// Remove `key`. Returns whether it was present.
    async fn remove(&self, key: &str) -> Result<bool, SimError>;

    /// Whether `key` is present.
    async fn contains(&self, key: &str) -> Result<bool, SimError>;

    /// Remove the whole area. Removing an already-removed area succeeds.
    async fn destroy(&self) -> Result<(), SimError>;
}

/// Build the backend selected by `config`.
pub fn backend_from_config(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match config.backend {
        StorageBackendKind::Filesystem => Arc::new(FsBackend::from_config(config)),
        StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_config() {
        let config = StorageConfig::default();
        assert_eq!(backend_from_config(&config).name(), "filesystem");

        let config = StorageConfig {
            backend: StorageBackendKind::Memory,
            ..Default::default()
        };
        assert_eq!(backend_from_config(&config).name(), "memory");
    }
}
