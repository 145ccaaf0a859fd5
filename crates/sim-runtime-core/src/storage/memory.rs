//! In-memory storage.
//!
//! Substitutes for [`FsBackend`](super::FsBackend) in tests: same primitive
//! contract, no filesystem access, and the backend can report how many areas
//! are still alive.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;
use uuid::Uuid;

use sim_runtime_common::SimError;

use super::{StorageArea, StorageBackend};

/// Allocates process-local areas.
///
/// Cloning shares the set of live areas.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    live: Arc<DashSet<String>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated areas that have not been destroyed.
    pub fn live_areas(&self) -> usize {
        self.live.len()
    }

    /// Whether the area named `location` is still alive.
    pub fn is_live(&self, location: &str) -> bool {
        self.live.contains(location)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn allocate(&self, resource_id: &str) -> Result<Arc<dyn StorageArea>, SimError> {
        let name = format!("memory://{resource_id}/{}", Uuid::new_v4().simple());
        self.live.insert(name.clone());

        debug!(resource_id, area = %name, "Allocated in-memory storage area");

        Ok(Arc::new(MemoryArea {
            name,
            entries: DashMap::new(),
            destroyed: AtomicBool::new(false),
            live: Arc::clone(&self.live),
        }))
    }
}

/// A map holding one resource's objects.
#[derive(Debug)]
pub struct MemoryArea {
    name: String,
    entries: DashMap<String, Vec<u8>>,
    destroyed: AtomicBool,
    live: Arc<DashSet<String>>,
}

impl MemoryArea {
    fn ensure_live(&self, operation: &'static str) -> Result<(), SimError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(SimError::backend_io(
                operation,
                self.name.clone(),
                io::Error::new(io::ErrorKind::NotFound, "storage area has been removed"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    fn location(&self) -> String {
        self.name.clone()
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), SimError> {
        self.ensure_live("write")?;
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SimError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn list(&self) -> Result<Vec<String>, SimError> {
        self.ensure_live("list")?;
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    async fn remove(&self, key: &str) -> Result<bool, SimError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool, SimError> {
        Ok(self.entries.contains_key(key))
    }

    async fn destroy(&self) -> Result<(), SimError> {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            self.entries.clear();
            self.live.remove(&self.name);
            debug!(area = %self.name, "Removed in-memory storage area");
        }
        Ok(())
    }
}
