//! Configuration structures for the sim-runtime.
//!
//! This module defines configuration options for various components:
//! - [`SimulatorConfig`]: Top-level configuration containing all settings
//! - [`TraceConfig`]: Activity tracing (verbosity, retained records)
//! - [`StorageConfig`]: Which storage backend resources are allocated from

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::SimError;

/// Top-level simulator configuration.
///
/// Each simulator instance carries its own copy, so two simulations in the
/// same process can run with different settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulatorConfig {
    /// Activity tracing configuration.
    #[serde(default)]
    pub trace: TraceConfig,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl SimulatorConfig {
    /// Check the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.trace.capacity == 0 {
            return Err(SimError::invalid_config("trace.capacity must be at least 1"));
        }

        let prefix = &self.storage.dir_prefix;
        if prefix.is_empty() {
            return Err(SimError::invalid_config("storage.dir_prefix must not be empty"));
        }
        if prefix.contains(['/', '\\']) || prefix == "." || prefix == ".." {
            return Err(SimError::invalid_config(format!(
                "storage.dir_prefix {prefix:?} must be a plain directory name"
            )));
        }

        Ok(())
    }
}

/// Activity tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceConfig {
    /// Emit every finished activity to the `tracing` subscriber.
    ///
    /// Records are always kept in memory; this only controls the extra
    /// diagnostic output.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum number of activity records kept in memory.
    ///
    /// The oldest records are dropped first once the limit is reached.
    #[serde(default = "defaults::trace_capacity")]
    pub capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            capacity: defaults::trace_capacity(),
        }
    }
}

/// The kind of storage backend used for resource areas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// A uniquely-named temporary directory per resource.
    #[default]
    Filesystem,
    /// A process-local map per resource. Nothing touches the disk.
    Memory,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend implementation.
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Parent directory for filesystem areas.
    ///
    /// Defaults to the OS temporary directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Name prefix of each filesystem area directory.
    #[serde(default = "defaults::dir_prefix")]
    pub dir_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            root_dir: None,
            dir_prefix: defaults::dir_prefix(),
        }
    }
}

impl StorageConfig {
    /// Directory under which filesystem areas are created.
    pub fn root_dir(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn trace_capacity() -> usize {
        10_000
    }

    pub fn dir_prefix() -> String {
        "wing-sim-".to_string()
    }
}
