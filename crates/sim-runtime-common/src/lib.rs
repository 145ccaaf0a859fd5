//! Common types, errors, and configuration for sim-runtime.
//!
//! This crate provides shared functionality used across the sim-runtime workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for simulator settings
//! - The simulation file model (resolved resource graph)

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{SimulatorConfig, StorageBackendKind, StorageConfig, TraceConfig};
pub use config_file::{ConfigFileError, ResourceEntry, ResourceMetadata, SimulationFile};
pub use error::SimError;
