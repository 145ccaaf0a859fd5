//! Activity tracing.
//!
//! Every capability-client call runs inside [`TraceContext::with_trace`],
//! which records what ran, for whom, how long it took and how it ended. The
//! wrapper is transparent: the activity's result, error included, is returned
//! exactly as produced.
//!
//! Records are kept in a bounded in-memory buffer. When the context is
//! verbose they are also emitted as `tracing` events under the `sim_trace`
//! target.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tracing::{info, warn};

use sim_runtime_common::TraceConfig;

/// Correlation tags forwarded from the originating program construct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceMetadata(BTreeMap<String, String>);

impl TraceMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a tag.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for TraceMetadata {
    fn from(tags: BTreeMap<String, String>) -> Self {
        Self(tags)
    }
}

impl fmt::Display for TraceMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Description of one traced invocation.
#[derive(Debug, Clone)]
pub struct Activity {
    /// Id of the resource the activity ran against.
    pub source_id: String,

    /// Type tag of that resource.
    pub source_type: String,

    /// Human-readable message, e.g. `Put (key=a.txt).`
    pub message: String,

    /// Correlation tags, if the resource has any.
    pub metadata: Option<TraceMetadata>,
}

impl Activity {
    /// Create an activity with no source and no metadata.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            source_id: String::new(),
            source_type: String::new(),
            message: message.into(),
            metadata: None,
        }
    }

    /// Attribute the activity to a resource.
    #[must_use]
    pub fn with_source(mut self, id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.source_id = id.into();
        self.source_type = type_tag.into();
        self
    }

    /// Attach correlation tags.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<TraceMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// How a traced activity ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The activity returned `Ok`.
    Success,
    /// The activity returned `Err`; the error's display text.
    Failure {
        /// Rendered error.
        error: String,
    },
}

/// A finished activity.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    /// What ran.
    pub activity: Activity,

    /// Wall-clock start time.
    pub started_at: SystemTime,

    /// How long the activity took.
    pub duration: Duration,

    /// How it ended.
    pub outcome: ActivityOutcome,
}

impl TraceRecord {
    /// Returns `true` if the activity succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ActivityOutcome::Success)
    }
}

/// Shared activity recorder.
///
/// Cloning is cheap and shares the record buffer. Separate contexts never
/// share state, so each simulator can run with its own verbosity.
#[derive(Clone)]
pub struct TraceContext {
    inner: Arc<TraceInner>,
}

struct TraceInner {
    config: TraceConfig,
    records: Mutex<VecDeque<TraceRecord>>,
}

impl TraceContext {
    /// Create a context with the given configuration.
    pub fn new(config: TraceConfig) -> Self {
        Self {
            inner: Arc::new(TraceInner {
                config,
                records: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Whether finished records are emitted to the `tracing` subscriber.
    pub fn is_verbose(&self) -> bool {
        self.inner.config.verbose
    }

    /// Run `work` as `activity` and record its outcome.
    ///
    /// The result is returned unchanged. Concurrent activities are neither
    /// serialized nor reordered; their records land in completion order.
    pub async fn with_trace<T, E, F>(&self, activity: Activity, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let started_at = SystemTime::now();
        let start = Instant::now();

        let result = work.await;

        let outcome = match &result {
            Ok(_) => ActivityOutcome::Success,
            Err(e) => ActivityOutcome::Failure {
                error: e.to_string(),
            },
        };

        self.record(TraceRecord {
            activity,
            started_at,
            duration: start.elapsed(),
            outcome,
        });

        result
    }

    /// Snapshot of retained records, oldest first.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.inner.records.lock().iter().cloned().collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    /// Returns `true` if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.inner.records.lock().is_empty()
    }

    /// Drop all retained records.
    pub fn clear(&self) {
        self.inner.records.lock().clear();
    }

    fn record(&self, record: TraceRecord) {
        if self.inner.config.verbose {
            emit(&record);
        }

        let mut records = self.inner.records.lock();
        while records.len() >= self.inner.config.capacity.max(1) {
            records.pop_front();
        }
        records.push_back(record);
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new(TraceConfig::default())
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("verbose", &self.inner.config.verbose)
            .field("capacity", &self.inner.config.capacity)
            .field("records", &self.len())
            .finish()
    }
}

fn emit(record: &TraceRecord) {
    let activity = &record.activity;
    let metadata = activity
        .metadata
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    match &record.outcome {
        ActivityOutcome::Success => info!(
            target: "sim_trace",
            source_id = %activity.source_id,
            source_type = %activity.source_type,
            metadata = %metadata,
            duration_us = record.duration.as_micros(),
            "{}",
            activity.message
        ),
        ActivityOutcome::Failure { error } => warn!(
            target: "sim_trace",
            source_id = %activity.source_id,
            source_type = %activity.source_type,
            metadata = %metadata,
            duration_us = record.duration.as_micros(),
            error = %error,
            "{}",
            activity.message
        ),
    }
}

/// Scoped instrumentation for one resource.
///
/// Binds a [`TraceContext`] to a resource's id, type and metadata so the
/// resource only supplies a message per call.
#[derive(Debug, Clone)]
pub struct Traced {
    context: TraceContext,
    source_id: String,
    source_type: String,
    metadata: Option<TraceMetadata>,
}

impl Traced {
    /// Create a traced handle for a resource.
    pub fn new(
        context: TraceContext,
        source_id: impl Into<String>,
        source_type: impl Into<String>,
        metadata: Option<TraceMetadata>,
    ) -> Self {
        Self {
            context,
            source_id: source_id.into(),
            source_type: source_type.into(),
            metadata,
        }
    }

    /// Run `work` as an activity described by `message`.
    pub async fn trace<T, E, F>(&self, message: impl Into<String>, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let activity = Activity::new(message)
            .with_source(self.source_id.clone(), self.source_type.clone())
            .with_metadata(self.metadata.clone());
        self.context.with_trace(activity, work).await
    }

    /// The underlying context.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Correlation tags attached to every activity.
    pub fn metadata(&self) -> Option<&TraceMetadata> {
        self.metadata.as_ref()
    }
}
