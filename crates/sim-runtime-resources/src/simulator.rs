//! Simulator facade.
//!
//! This module provides [`Simulator`], which builds resource instances from a
//! resolved graph, hands them to the [`Orchestrator`], and keeps the client
//! handles program code looks up by id.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use sim_runtime_common::{ResourceEntry, SimError, SimulationFile, SimulatorConfig};
use sim_runtime_core::{
    CleanupReport, LifecycleState, Orchestrator, ResourceContext, ResourceInstance,
    StorageBackend, TraceContext, TraceMetadata, TraceRecord, backend_from_config,
};

use crate::bucket::{BUCKET_TYPE, Bucket, BucketClient, BucketProps};

/// Resource types the simulator can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Object storage.
    Bucket,
}

impl ResourceKind {
    /// Canonical type tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bucket => BUCKET_TYPE,
        }
    }
}

impl FromStr for ResourceKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" | "cloud.Bucket" | "wingsdk.cloud.Bucket" => Ok(Self::Bucket),
            other => Err(SimError::UnknownResourceType {
                type_tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client handle of one resource.
#[derive(Debug, Clone)]
pub enum ResourceHandle {
    /// Object storage client.
    Bucket(BucketClient),
}

/// A running simulation.
///
/// Owns its trace context and storage backend, so independent simulators in
/// one process share nothing.
pub struct Simulator {
    config: SimulatorConfig,
    trace: TraceContext,
    backend: Arc<dyn StorageBackend>,
    orchestrator: Orchestrator,
    handles: HashMap<String, ResourceHandle>,
}

impl Simulator {
    /// Create an empty simulator with the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is unusable.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimError> {
        let backend = backend_from_config(&config.storage);
        Self::with_backend(config, backend)
    }

    /// Create an empty simulator allocating storage from `backend`.
    pub fn with_backend(
        config: SimulatorConfig,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        debug!(backend = backend.name(), verbose = config.trace.verbose, "Creating simulator");

        Ok(Self {
            trace: TraceContext::new(config.trace.clone()),
            config,
            backend,
            orchestrator: Orchestrator::new(),
            handles: HashMap::new(),
        })
    }

    /// Create a simulator and register every resource of `file`.
    pub fn from_file(file: &SimulationFile) -> Result<Self, SimError> {
        file.validate()?;
        let mut simulator = Self::new(file.simulator.clone())?;
        for entry in &file.resources {
            simulator.add_resource(entry)?;
        }
        Ok(simulator)
    }

    /// Build the resource described by `entry` and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown, the props are invalid, the id
    /// is taken, or the simulator has already started.
    pub fn add_resource(&mut self, entry: &ResourceEntry) -> Result<(), SimError> {
        let kind: ResourceKind = entry.type_tag.parse()?;
        let metadata = entry.metadata.tracing.clone().map(TraceMetadata::from);
        let ctx = ResourceContext::new(
            entry.id.as_str(),
            kind.as_str(),
            metadata,
            &self.trace,
            Arc::clone(&self.backend),
        );

        let (instance, handle) = match kind {
            ResourceKind::Bucket => {
                let bucket = Bucket::new(BucketProps::from_value(&entry.props)?, ctx);
                let handle = ResourceHandle::Bucket(bucket.client());
                let instance =
                    ResourceInstance::new(kind.as_str(), bucket.lifecycle().clone(), Arc::new(bucket));
                (instance, handle)
            }
        };

        self.orchestrator.register(instance)?;
        self.handles.insert(entry.id.clone(), handle);
        Ok(())
    }

    /// Initialize every resource.
    ///
    /// If any resource fails, everything is cleaned up and the original error
    /// is returned.
    #[instrument(skip(self), fields(resources = self.orchestrator.len()))]
    pub async fn start(&mut self) -> Result<(), SimError> {
        self.orchestrator.initialize_all().await?;
        info!(backend = self.backend.name(), "Simulator started");
        Ok(())
    }

    /// Clean up every resource. Calling it again is a no-op.
    pub async fn stop(&self) -> CleanupReport {
        let report = self.orchestrator.cleanup_all().await;
        if !report.is_clean() {
            warn!(failed = ?report.failed_ids(), "Simulator stopped with cleanup failures");
        }
        report
    }

    /// Start, wait for `shutdown`, then stop.
    ///
    /// Once `start` succeeds, `stop` runs whether `shutdown` resolves with
    /// `Ok` or `Err`. A shutdown error is returned after teardown. Cleanup
    /// failures never turn into an error here; they are in the returned
    /// report.
    ///
    /// # Errors
    ///
    /// Returns the start error (everything is already cleaned up), or the
    /// shutdown error.
    pub async fn run_until<F, E>(&mut self, shutdown: F) -> Result<CleanupReport, E>
    where
        F: Future<Output = Result<(), E>>,
        E: From<SimError>,
    {
        self.start().await?;

        let outcome = shutdown.await;
        if outcome.is_err() {
            warn!("Shutdown signal failed; stopping simulator");
        }

        let report = self.stop().await;
        outcome.map(|()| report)
    }

    /// Look up a resource client by id.
    pub fn handle(&self, id: &str) -> Result<ResourceHandle, SimError> {
        self.handles
            .get(id)
            .cloned()
            .ok_or_else(|| SimError::ResourceNotFound {
                resource_id: id.to_string(),
            })
    }

    /// Look up a bucket client by id.
    pub fn bucket(&self, id: &str) -> Result<BucketClient, SimError> {
        let ResourceHandle::Bucket(client) = self.handle(id)?;
        Ok(client)
    }

    /// Registered resource ids, in registration order.
    pub fn resource_ids(&self) -> Vec<String> {
        self.orchestrator.ids().map(str::to_string).collect()
    }

    /// Lifecycle state of a resource.
    pub fn state(&self, id: &str) -> Option<LifecycleState> {
        self.orchestrator.state(id)
    }

    /// Snapshot of the recorded activities.
    pub fn traces(&self) -> Vec<TraceRecord> {
        self.trace.records()
    }

    /// The simulator's trace context.
    pub fn trace_context(&self) -> &TraceContext {
        &self.trace
    }

    /// The configuration the simulator was built with.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("backend", &self.backend.name())
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
