//! Resource lifecycle orchestration.
//!
//! The [`Orchestrator`] owns every resource instance of a simulation and
//! drives it through `init` and `cleanup`:
//!
//! 1. Instances are registered before bring-up
//! 2. [`Orchestrator::initialize_all`] initializes them in registration order;
//!    the first failure tears everything down and is returned unchanged
//! 3. [`Orchestrator::cleanup_all`] tears them down in reverse order, never
//!    stopping at a failure, and reports failures as a [`CleanupReport`]

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use sim_runtime_common::SimError;

use crate::lifecycle::{Lifecycle, LifecycleHandle, LifecycleState};

/// One managed resource instance.
#[derive(Clone)]
pub struct ResourceInstance {
    type_tag: String,
    lifecycle: LifecycleHandle,
    resource: Arc<dyn Lifecycle>,
}

impl ResourceInstance {
    /// Wrap a resource and the lifecycle handle it was constructed with.
    pub fn new(
        type_tag: impl Into<String>,
        lifecycle: LifecycleHandle,
        resource: Arc<dyn Lifecycle>,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            lifecycle,
            resource,
        }
    }

    /// Stable id within the graph.
    pub fn id(&self) -> &str {
        self.lifecycle.resource_id()
    }

    /// Resource type tag.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }
}

impl fmt::Debug for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceInstance")
            .field("id", &self.id())
            .field("type_tag", &self.type_tag)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Outcome of tearing down every instance.
#[derive(Debug, Default)]
pub struct CleanupReport {
    attempted: usize,
    failures: Vec<SimError>,
}

impl CleanupReport {
    /// Returns `true` if every cleanup succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of instances whose `cleanup` was called.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// The collected `CleanupFailed` errors, in teardown order.
    pub fn failures(&self) -> &[SimError] {
        &self.failures
    }

    /// Ids of the instances that failed to clean up.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                SimError::CleanupFailed { resource_id, .. } => Some(resource_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Collapse the report into a single result.
    pub fn into_result(self) -> Result<(), SimError> {
        if self.is_clean() {
            return Ok(());
        }
        Err(SimError::CleanupAggregate {
            count: self.failures.len(),
            summary: self.failed_ids().join(", "),
        })
    }
}

/// Owns a set of resource instances and their lifecycle transitions.
#[derive(Default)]
pub struct Orchestrator {
    instances: Vec<ResourceInstance>,
    started: bool,
}

impl Orchestrator {
    /// Create an empty orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the managed set.
    ///
    /// # Errors
    ///
    /// Returns an error if bring-up has already started or the id is taken.
    pub fn register(&mut self, instance: ResourceInstance) -> Result<(), SimError> {
        if self.started {
            return Err(SimError::invalid_state(
                instance.id(),
                "orchestrator started",
                "register",
            ));
        }
        if self.instances.iter().any(|i| i.id() == instance.id()) {
            return Err(SimError::DuplicateResource {
                resource_id: instance.id().to_string(),
            });
        }

        debug!(resource_id = instance.id(), type_tag = instance.type_tag(), "Resource registered");
        self.instances.push(instance);
        Ok(())
    }

    /// Initialize every instance in registration order.
    ///
    /// On the first failure the failing instance is marked `Failed`, every
    /// instance is cleaned up, and the original error is returned.
    #[instrument(skip(self), fields(resources = self.instances.len()))]
    pub async fn initialize_all(&mut self) -> Result<(), SimError> {
        if self.started {
            return Err(SimError::invalid_state("orchestrator", "started", "initialize"));
        }
        self.started = true;

        for instance in &self.instances {
            if let Err(err) = Self::initialize(instance).await {
                error!(resource_id = instance.id(), error = %err, "Resource initialization failed");

                let report = self.cleanup_all().await;
                if !report.is_clean() {
                    warn!(
                        failed = ?report.failed_ids(),
                        "Cleanup after failed initialization was incomplete"
                    );
                }
                return Err(err);
            }
        }

        info!(resources = self.instances.len(), "All resources ready");
        Ok(())
    }

    async fn initialize(instance: &ResourceInstance) -> Result<(), SimError> {
        instance.lifecycle.transition(LifecycleState::Initializing)?;

        match instance.resource.init().await {
            Ok(()) => {
                instance.lifecycle.transition(LifecycleState::Ready)?;
                debug!(resource_id = instance.id(), type_tag = instance.type_tag(), "Resource ready");
                Ok(())
            }
            Err(err) => {
                if let Err(transition) = instance.lifecycle.transition(LifecycleState::Failed) {
                    warn!(
                        resource_id = instance.id(),
                        error = %transition,
                        "Failed resource left in unexpected state"
                    );
                }
                Err(err)
            }
        }
    }

    /// Clean up every instance that is not yet destroyed, in reverse
    /// registration order.
    ///
    /// Failures are collected, never short-circuited; each failing instance
    /// still ends up `Destroyed`.
    #[instrument(skip(self), fields(resources = self.instances.len()))]
    pub async fn cleanup_all(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for instance in self.instances.iter().rev() {
            if instance.state().is_terminal() {
                continue;
            }
            if let Err(err) = instance.lifecycle.transition(LifecycleState::CleaningUp) {
                warn!(resource_id = instance.id(), error = %err, "Resource cannot be cleaned up");
                report.failures.push(SimError::cleanup_failed(instance.id(), err));
                continue;
            }

            report.attempted += 1;
            let result = instance.resource.cleanup().await;
            if let Err(transition) = instance.lifecycle.transition(LifecycleState::Destroyed) {
                warn!(
                    resource_id = instance.id(),
                    error = %transition,
                    "Resource changed state during cleanup"
                );
            }

            match result {
                Ok(()) => debug!(resource_id = instance.id(), "Resource destroyed"),
                Err(err) => {
                    warn!(resource_id = instance.id(), error = %err, "Resource cleanup failed");
                    report.failures.push(SimError::cleanup_failed(instance.id(), err));
                }
            }
        }

        info!(
            attempted = report.attempted,
            failed = report.failures.len(),
            "Cleanup complete"
        );
        report
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if no instances are registered.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// State of the instance with the given id.
    pub fn state(&self, id: &str) -> Option<LifecycleState> {
        self.instances.iter().find(|i| i.id() == id).map(ResourceInstance::state)
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(ResourceInstance::id)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("instances", &self.instances)
            .field("started", &self.started)
            .finish()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let leaked: Vec<&str> = self
            .instances
            .iter()
            .filter(|i| !i.state().is_terminal() && i.state() != LifecycleState::Uninitialized)
            .map(ResourceInstance::id)
            .collect();
        if !leaked.is_empty() {
            warn!(resources = ?leaked, "Orchestrator dropped without cleanup; storage may leak");
        }
    }
}
