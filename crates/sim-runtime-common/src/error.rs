//! Error types for the sim-runtime.
//!
//! Every fallible operation in the workspace returns [`SimError`]. The
//! variants follow the failure taxonomy of the simulator:
//! - lookups of absent keys ([`SimError::NotFound`])
//! - environmental storage failures ([`SimError::BackendIo`])
//! - fatal bring-up failures ([`SimError::InitializationFailed`])
//! - best-effort teardown failures ([`SimError::CleanupFailed`])

use std::io;

use thiserror::Error;

/// Top-level simulator errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// The requested key is not present in the resource's storage.
    #[error("Object not found: {key} (resource: {resource_id})")]
    NotFound {
        /// The resource that was queried.
        resource_id: String,
        /// The key that was not found.
        key: String,
    },

    /// The storage backend failed for environmental reasons.
    #[error("Storage {operation} failed at {location}: {source}")]
    BackendIo {
        /// The primitive that failed (e.g. "write", "allocate").
        operation: &'static str,
        /// Where the failure happened (area path or key).
        location: String,
        /// The underlying I/O error, surfaced unchanged.
        #[source]
        source: io::Error,
    },

    /// Seeding initial state failed while initializing a resource.
    #[error("Initialization of {resource_id} failed: {source}")]
    InitializationFailed {
        /// The resource whose `init` failed.
        resource_id: String,
        /// The error raised by the seed write.
        #[source]
        source: Box<SimError>,
    },

    /// Removing a resource's storage failed during cleanup.
    #[error("Cleanup of {resource_id} failed: {source}")]
    CleanupFailed {
        /// The resource whose `cleanup` failed.
        resource_id: String,
        /// The error raised by the removal.
        #[source]
        source: Box<SimError>,
    },

    /// One or more resources failed to clean up.
    #[error("Cleanup failed for {count} resource(s): {summary}")]
    CleanupAggregate {
        /// Number of failing resources.
        count: usize,
        /// Comma-separated list of failing resource ids.
        summary: String,
    },

    /// An operation was attempted in a lifecycle state that does not allow it.
    #[error("Resource {resource_id} cannot {operation} while {state}")]
    InvalidState {
        /// The resource the operation targeted.
        resource_id: String,
        /// The lifecycle state the resource was in.
        state: String,
        /// The attempted operation or transition.
        operation: String,
    },

    /// The key cannot be used as an object name.
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The stored value could not be decoded as requested.
    #[error("Invalid value for {key} (resource: {resource_id}): {reason}")]
    InvalidValue {
        /// The resource that holds the value.
        resource_id: String,
        /// The key of the value.
        key: String,
        /// Description of the decoding failure.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two resources in the graph share an id.
    #[error("Duplicate resource: {resource_id}")]
    DuplicateResource {
        /// The duplicated id.
        resource_id: String,
    },

    /// No resource with this id exists in the simulation.
    #[error("Resource not found: {resource_id}")]
    ResourceNotFound {
        /// The id that was looked up.
        resource_id: String,
    },

    /// The graph references a resource type the simulator does not know.
    #[error("Unknown resource type: {type_tag}")]
    UnknownResourceType {
        /// The unrecognized type tag.
        type_tag: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl SimError {
    /// Create a new `NotFound` error.
    pub fn not_found(resource_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource_id: resource_id.into(),
            key: key.into(),
        }
    }

    /// Create a new `BackendIo` error.
    pub fn backend_io(operation: &'static str, location: impl Into<String>, source: io::Error) -> Self {
        Self::BackendIo {
            operation,
            location: location.into(),
            source,
        }
    }

    /// Wrap an error raised while seeding a resource.
    pub fn initialization_failed(resource_id: impl Into<String>, source: SimError) -> Self {
        Self::InitializationFailed {
            resource_id: resource_id.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised while tearing a resource down.
    pub fn cleanup_failed(resource_id: impl Into<String>, source: SimError) -> Self {
        Self::CleanupFailed {
            resource_id: resource_id.into(),
            source: Box::new(source),
        }
    }

    /// Create a new `InvalidState` error.
    pub fn invalid_state(
        resource_id: impl Into<String>,
        state: impl ToString,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            resource_id: resource_id.into(),
            state: state.to_string(),
            operation: operation.into(),
        }
    }

    /// Create a new `InvalidKey` error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error means a key was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this error came from the storage backend.
    ///
    /// Wrapped lifecycle failures are inspected recursively.
    pub fn is_backend_io(&self) -> bool {
        match self {
            Self::BackendIo { .. } => true,
            Self::InitializationFailed { source, .. } | Self::CleanupFailed { source, .. } => {
                source.is_backend_io()
            }
            _ => false,
        }
    }

    /// Returns `true` if this error is fatal to runtime bring-up.
    pub fn is_initialization_failure(&self) -> bool {
        matches!(self, Self::InitializationFailed { .. })
    }

    /// Returns `true` if this error was raised by an operation outside `Ready`.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}
