//! Core simulation runtime for sim-runtime.
//!
//! This crate provides the resource-agnostic building blocks:
//! - [`StorageBackend`] / [`StorageArea`]: Isolated key/value storage per resource
//! - [`TraceContext`] / [`Traced`]: Transparent activity instrumentation
//! - [`Lifecycle`] / [`LifecycleHandle`]: The init/cleanup contract and state machine
//! - [`Orchestrator`]: Drives every resource instance through its lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Orchestrator                        │
//! │  (Owns every instance, drives init / cleanup)           │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        ResourceInstance (Lifecycle + handle)            │
//! │  Built from a ResourceContext:                          │
//! │  - LifecycleHandle (state shared with the client)       │
//! │  - Traced (scoped instrumentation)                      │
//! │  - StorageBackend (area allocation)                     │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     StorageArea                         │
//! │  (Exclusively owned by one instance)                    │
//! │  - temp directory, or in-memory map                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod lifecycle;
pub mod orchestrator;
pub mod storage;
pub mod trace;

pub use context::ResourceContext;
pub use lifecycle::{Lifecycle, LifecycleHandle, LifecycleState};
pub use orchestrator::{CleanupReport, Orchestrator, ResourceInstance};
pub use storage::{
    FsBackend, MemoryBackend, StorageArea, StorageBackend, backend_from_config,
};
pub use trace::{Activity, ActivityOutcome, TraceContext, TraceMetadata, TraceRecord, Traced};
