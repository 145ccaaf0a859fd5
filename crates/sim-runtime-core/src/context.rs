//! Capabilities handed to a resource at construction.

use std::sync::Arc;

use crate::lifecycle::LifecycleHandle;
use crate::storage::StorageBackend;
use crate::trace::{TraceContext, TraceMetadata, Traced};

/// Everything a resource needs from the simulator.
///
/// Passed explicitly to each resource constructor: the lifecycle handle the
/// orchestrator drives, a [`Traced`] helper for instrumenting client calls,
/// and the backend to allocate storage from.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    lifecycle: LifecycleHandle,
    traced: Traced,
    backend: Arc<dyn StorageBackend>,
}

impl ResourceContext {
    /// Build the context for resource `id` of type `type_tag`.
    pub fn new(
        id: impl Into<String>,
        type_tag: impl Into<String>,
        metadata: Option<TraceMetadata>,
        trace: &TraceContext,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        let id = id.into();
        Self {
            traced: Traced::new(trace.clone(), id.clone(), type_tag, metadata),
            lifecycle: LifecycleHandle::new(id),
            backend,
        }
    }

    /// Id of the resource.
    pub fn resource_id(&self) -> &str {
        self.lifecycle.resource_id()
    }

    /// Lifecycle handle shared with the orchestrator.
    pub fn lifecycle(&self) -> &LifecycleHandle {
        &self.lifecycle
    }

    /// Scoped instrumentation for this resource.
    pub fn traced(&self) -> &Traced {
        &self.traced
    }

    /// Backend to allocate storage from.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }
}
